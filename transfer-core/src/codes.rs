//! Stable wire error codes
//!
//! These codes are a published contract shared with every downstream
//! consumer; they must never be renumbered. 3106 covers both prepare
//! fingerprint mismatches and failed fulfilment checks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic internal error
pub const INTERNAL_ERROR: ErrorCode = ErrorCode {
    code: 2001,
    description: "Internal server error",
};

/// Generic validation error
pub const VALIDATION_ERROR: ErrorCode = ErrorCode {
    code: 3100,
    description: "Generic validation error",
};

/// Modified request (fingerprint or fulfilment mismatch)
pub const MODIFIED_REQUEST: ErrorCode = ErrorCode {
    code: 3106,
    description: "Modified request",
};

/// Transfer expired
pub const TRANSFER_EXPIRED: ErrorCode = ErrorCode {
    code: 3303,
    description: "Transfer expired",
};

/// One entry of the error-code table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Numeric wire code
    pub code: u32,
    /// Canonical description
    pub description: &'static str,
}

impl ErrorCode {
    /// Error information with the canonical description
    pub fn information(&self) -> ErrorInformation {
        ErrorInformation {
            error_code: self.code,
            error_description: self.description.to_string(),
            extension_list: None,
        }
    }

    /// Error information with `<canonical>: <detail>` description
    pub fn with_detail(&self, detail: &str) -> ErrorInformation {
        ErrorInformation {
            error_code: self.code,
            error_description: format!("{}: {}", self.description, detail),
            extension_list: None,
        }
    }
}

/// Failure payload carried in error envelopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInformation {
    /// Wire error code
    pub error_code: u32,

    /// Human-readable description
    pub error_description: String,

    /// Extension list copied verbatim from the request when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_list: Option<Value>,
}

impl ErrorInformation {
    /// Attach the request's extension list
    pub fn with_extension_list(mut self, extension_list: Option<Value>) -> Self {
        self.extension_list = extension_list;
        self
    }

    /// Wrap into the `{errorInformation: {...}}` payload shape
    pub fn into_payload(self) -> Value {
        serde_json::json!({ "errorInformation": self })
    }
}
