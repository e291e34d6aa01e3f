//! Deterministic topic naming
//!
//! Topic names are the routing contract between the switch and every
//! downstream subsystem; they must be reproducible from (participant,
//! functionality, action) alone:
//!
//! - Per-participant: `topic-<participant>-<functionality>-<action>`
//! - General: `topic-<functionality>-<action>`

use std::fmt;

/// Functional area a topic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Functionality {
    /// Transfer lifecycle topics (prepare, fulfil, fan-in)
    Transfer,
    /// Per-participant position topics
    Position,
    /// Notification delivery topic
    Notification,
}

impl Functionality {
    /// Wire name used inside topic strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Functionality::Transfer => "transfer",
            Functionality::Position => "position",
            Functionality::Notification => "notification",
        }
    }
}

impl fmt::Display for Functionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action segment of a topic name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    /// Prepare phase input / position prepare output
    Prepare,
    /// Fulfil phase input
    Fulfil,
    /// Position commit output
    Commit,
    /// Position reject output
    Reject,
    /// Internal fan-in from the position subsystem
    Transfer,
    /// Notification output
    Notification,
}

impl TopicAction {
    /// Wire name used inside topic strings
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicAction::Prepare => "prepare",
            TopicAction::Fulfil => "fulfil",
            TopicAction::Commit => "commit",
            TopicAction::Reject => "reject",
            TopicAction::Transfer => "transfer",
            TopicAction::Notification => "notification",
        }
    }
}

impl fmt::Display for TopicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-qualified topic name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// General topic: `topic-<functionality>-<action>`
    pub fn general(functionality: Functionality, action: TopicAction) -> Self {
        Self(format!("topic-{}-{}", functionality, action))
    }

    /// Per-participant topic: `topic-<participant>-<functionality>-<action>`
    pub fn participant(
        participant: &str,
        functionality: Functionality,
        action: TopicAction,
    ) -> Self {
        Self(format!("topic-{}-{}-{}", participant, functionality, action))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JetStream stream name backing this topic
    ///
    /// Stream names may not contain dots; topic names are already
    /// dot-free, so the stream is the uppercased topic with `_`
    /// separators.
    pub fn stream_name(&self) -> String {
        self.0.replace('-', "_").to_uppercase()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
