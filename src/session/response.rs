// In: src/session/response.rs

//! Response payloads returned from actions.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Reply to `health_check`.
pub const HEALTH_CHECK_RESPONSE: &[u8] = b"Flight Server is up and running!";
/// Reply to a successful `open`, `input_exhausted` or `close`.
pub const SUCCESS_RESPONSE: &[u8] = b"Success!";

/// One opaque result message of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub body: Vec<u8>,
}

impl ActionResult {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }
}

/// The structured outcome of a `compute` action.
///
/// Wire form: `{"status":"Success"}` or `{"status":"Fail","errorMessage":"..."}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status")]
pub enum ComputeStatus {
    Success,
    Fail {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ComputeStatus {
    pub fn fail(error: &BridgeError) -> Self {
        ComputeStatus::Fail {
            error_message: error.trace(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ComputeStatus::Success)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
