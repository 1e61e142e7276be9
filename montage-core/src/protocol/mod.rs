//! Worker commission protocol.
//!
//! Plain-data request/response envelopes, carried over a [`crate::sync::BiChannel`]
//! between execution contexts. Every request carries `{ action, rn, ... }`;
//! every response carries `{ action, rn, success, ... }`; `rn` is `None` for worker-originated notifications that have no
//! matching request (`cache-signals`).

pub mod client;
pub mod schema;

pub use client::CommissionClient;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Monotonically increasing per-service request number.
pub type Rn = u64;

/// Actions a montage or reader worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    SetupWorker,
    UpdateSettings,
    SetupInputMutex,
    SetupInputCache,
    GetSignals,
    MapChannels,
    SetFilters,
    SetInterruptions,
    ReleaseCache,
    CacheSignals,
    CacheSignalsFromUrl,
}

/// A request envelope posted to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRequest {
    pub action: Action,
    pub rn: Rn,
    #[serde(default)]
    pub props: Value,
}

/// A response envelope posted back to the client, or a notification when
/// `rn` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub action: Action,
    pub rn: Option<Rn>,
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommissionResponse {
    pub fn ok(action: Action, rn: Option<Rn>, payload: Value) -> Self {
        Self {
            action,
            rn,
            success: true,
            payload,
            error: None,
        }
    }

    pub fn fail(action: Action, rn: Option<Rn>, error: impl Into<String>) -> Self {
        Self {
            action,
            rn,
            success: false,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }
}
