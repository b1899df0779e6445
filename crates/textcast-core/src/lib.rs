//! # Textcast Core
//!
//! Types shared by every Textcast crate: the recipient model, settings,
//! the error enum, and the [`Gateway`](traits::Gateway) seam that channel
//! implementations plug into.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{LogLevel, Settings, SettingsSource, TwilioConfig, TwilioCredentials};
pub use error::{CampaignError, Result};
pub use traits::{Gateway, SendReceipt, ACCEPTED_STATUSES};
pub use types::{Recipient, RecipientSet};
