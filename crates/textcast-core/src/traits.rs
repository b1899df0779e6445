//! Seams between the campaign engine and the outside world.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Provider statuses that count as "accepted for delivery".
pub const ACCEPTED_STATUSES: [&str; 2] = ["sent", "queued"];

/// What the provider reported back for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider status string, e.g. `queued`, `sent`, `failed`, `undelivered`.
    pub status: String,
    /// Provider message id, when one was assigned.
    pub id: Option<String>,
}

impl SendReceipt {
    pub fn new(status: impl Into<String>, id: Option<String>) -> Self {
        Self {
            status: status.into(),
            id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        ACCEPTED_STATUSES.contains(&self.status.as_str())
    }
}

/// Transport to a messaging provider.
///
/// `Ok(None)` and `Ok(Some(receipt))` with a non-accepted status are per-message
/// failures the caller recovers from. `Err` is fatal for the whole run.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, from: &str, body: &str) -> Result<Option<SendReceipt>>;
}
