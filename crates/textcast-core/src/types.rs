//! Recipient data model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single message destination.
///
/// Field order matches the on-disk column order of the recipient store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "UID")]
    uid: String,
    #[serde(rename = "Phone Number")]
    phone_number: String,
}

impl Recipient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        uid: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            uid: uid.into(),
            phone_number: phone_number.into(),
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    /// Name of the first required field that is empty, if any.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.uid.is_empty() {
            Some("UID")
        } else if self.phone_number.is_empty() {
            Some("Phone Number")
        } else {
            None
        }
    }
}

/// Recipients unique by full-record equality.
///
/// Keeps insertion order alongside a hash index so iteration is reproducible,
/// but nothing downstream relies on that order.
#[derive(Debug, Clone, Default)]
pub struct RecipientSet {
    entries: Vec<Recipient>,
    index: HashSet<Recipient>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipient. Returns `false` if an equal record was already present.
    pub fn insert(&mut self, recipient: Recipient) -> bool {
        if self.index.contains(&recipient) {
            return false;
        }
        self.index.insert(recipient.clone());
        self.entries.push(recipient);
        true
    }

    /// Remove a recipient. Returns `false` if it was not present.
    pub fn remove(&mut self, recipient: &Recipient) -> bool {
        if !self.index.remove(recipient) {
            return false;
        }
        self.entries.retain(|r| r != recipient);
        true
    }

    pub fn contains(&self, recipient: &Recipient) -> bool {
        self.index.contains(recipient)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.entries.iter()
    }

    pub fn is_subset(&self, other: &RecipientSet) -> bool {
        self.index.is_subset(&other.index)
    }
}

/// Set equality; iteration order is ignored.
impl PartialEq for RecipientSet {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for RecipientSet {}

impl FromIterator<Recipient> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let mut set = Self::new();
        for recipient in iter {
            set.insert(recipient);
        }
        set
    }
}

impl Extend<Recipient> for RecipientSet {
    fn extend<I: IntoIterator<Item = Recipient>>(&mut self, iter: I) {
        for recipient in iter {
            self.insert(recipient);
        }
    }
}

impl<'a> IntoIterator for &'a RecipientSet {
    type Item = &'a Recipient;
    type IntoIter = std::slice::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for RecipientSet {
    type Item = Recipient;
    type IntoIter = std::vec::IntoIter<Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
