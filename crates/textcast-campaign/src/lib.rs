//! # Textcast Campaign
//!
//! The campaign engine: reconcile recipients, persist them, and send one
//! templated message to each through a [`Gateway`](textcast_core::Gateway).
//!
//! ## Architecture
//! ```text
//! identifiers.csv ─┐
//!                  ├─ merge ─→ RecipientSet ─→ store (recipients.csv)
//! contacts.csv ────┘                              │
//!                                                 ▼
//!                     Dispatcher ──send──→ Gateway
//!                      │    │
//!                      │    └─ Pacer (fixed delay between sends)
//!                      └─ RecoveryTracker ─→ checkpoint (recovery.csv)
//! ```

pub mod dispatch;
pub mod merge;
pub mod pacing;
pub mod recovery;
pub mod store;
pub mod template;

pub use dispatch::{CampaignQuote, Confirm, DispatchOptions, DispatchReport, Dispatcher};
pub use merge::{merge_files, merge_readers};
pub use pacing::{FixedDelay, Pacer, Unpaced};
pub use recovery::RecoveryTracker;
pub use template::MessageTemplate;
