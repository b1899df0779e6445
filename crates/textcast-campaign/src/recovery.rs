//! Pending-set bookkeeping with a durable checkpoint.
//!
//! # Invariants
//! - `pending` is always a subset of the set the tracker was initialized from.
//! - With a checkpoint path configured, the file is rewritten in full before
//!   [`RecoveryTracker::mark_sent`] returns, so it never trails the in-memory set.

use std::path::{Path, PathBuf};
use textcast_core::error::Result;
use textcast_core::types::{Recipient, RecipientSet};

use crate::store;

pub struct RecoveryTracker {
    pending: RecipientSet,
    checkpoint: Option<PathBuf>,
}

impl RecoveryTracker {
    /// Start tracking a full copy of `recipients`. When `checkpoint` is set the
    /// baseline is written immediately.
    pub fn initialize(recipients: &RecipientSet, checkpoint: Option<&Path>) -> Result<Self> {
        let tracker = Self {
            pending: recipients.clone(),
            checkpoint: checkpoint.map(Path::to_path_buf),
        };
        tracker.persist()?;
        Ok(tracker)
    }

    /// Continue an interrupted run from its checkpoint file.
    pub fn resume(checkpoint: &Path) -> Result<Self> {
        let pending = store::load(checkpoint)?;
        tracing::info!("Resuming with {} pending recipients", pending.len());
        Self::initialize(&pending, Some(checkpoint))
    }

    /// Drop a confirmed recipient from the pending set and checkpoint.
    /// Returns `false` (and writes nothing) if it was not pending.
    pub fn mark_sent(&mut self, recipient: &Recipient) -> Result<bool> {
        if !self.pending.remove(recipient) {
            return Ok(false);
        }
        self.persist()?;
        tracing::debug!("Remaining {} recipients", self.pending.len());
        Ok(true)
    }

    pub fn pending(&self) -> &RecipientSet {
        &self.pending
    }

    pub fn is_enabled(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint.as_deref()
    }

    fn persist(&self) -> Result<()> {
        match &self.checkpoint {
            Some(path) => store::save(path, &self.pending),
            None => Ok(()),
        }
    }
}
