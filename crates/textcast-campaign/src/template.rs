//! Message templates with `{placeholder}` substitution.

use std::path::Path;
use textcast_core::error::{CampaignError, Result};
use textcast_core::types::Recipient;

pub const LINK: &str = "{link}";
pub const FIRST_NAME: &str = "{firstname}";
pub const LAST_NAME: &str = "{lastname}";
pub const EMAIL: &str = "{email}";
pub const UID: &str = "{uid}";
pub const PHONE_NUMBER: &str = "{phonenumber}";

/// Message body with placeholders. Unknown placeholders are left as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    text: String,
}

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CampaignError::from_io(path, e))?;
        Ok(Self::new(text))
    }

    /// Fill in `{link}`. Done once per campaign.
    pub fn with_link(&self, link: &str) -> Self {
        Self::new(substitute(&self.text, &[(LINK, link)]))
    }

    /// Body for one recipient.
    pub fn render(&self, recipient: &Recipient) -> String {
        substitute(
            &self.text,
            &[
                (FIRST_NAME, recipient.first_name()),
                (LAST_NAME, recipient.last_name()),
                (EMAIL, recipient.email()),
                (UID, recipient.uid()),
                (PHONE_NUMBER, recipient.phone_number()),
            ],
        )
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Single left-to-right pass, so substituted values are never rescanned.
fn substitute(text: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match pairs.iter().find(|(token, _)| tail.starts_with(token)) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &tail[token.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
