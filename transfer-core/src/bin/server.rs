//! Transfer switch server binary
//!
//! Wires the bus client, producer, store, and registrar, then parks
//! until interrupted. Runs against the in-memory store unless an
//! external store gateway is wired in.

use std::error::Error;
use std::sync::Arc;
use switch_bus::{BusClient, BusProducer, ProducerConfig};
use transfer_core::{Config, MemoryStore, Registrar};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting transfer switch");

    let config = match std::env::var("SWITCH_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env(),
    };

    let client = Arc::new(BusClient::new(config.bus.to_bus_config()));
    client.connect().await?;

    let producer = Arc::new(BusProducer::new(client.clone(), ProducerConfig::default()));
    let store = Arc::new(MemoryStore::new());

    let registrar = Registrar::new(client.clone(), producer, store, config);
    let summary = registrar.register_all_handlers().await?;
    tracing::info!("{} consumers running", summary.consumers.len());

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down transfer switch");
    for consumer in summary.consumers {
        consumer.task.abort();
    }
    client.disconnect().await?;

    Ok(())
}
