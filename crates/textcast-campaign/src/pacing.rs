//! Send pacing. Kept separate from the dispatch loop so the strategy can
//! change without touching send logic.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Pacer: Send {
    /// Wait until the next send is allowed.
    async fn pace(&mut self);
}

/// Sleep a fixed interval between sends.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pace(&mut self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// No pacing at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

#[async_trait]
impl Pacer for Unpaced {
    async fn pace(&mut self) {}
}
