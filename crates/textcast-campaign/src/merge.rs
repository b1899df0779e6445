//! Recipient reconciliation.
//!
//! Joins an identifier export (email → names + UID) with a contact export
//! (email → names + phone number) into canonical [`Recipient`]s.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use textcast_core::error::{CampaignError, Result};
use textcast_core::types::{Recipient, RecipientSet};

use crate::store::read_rows;

const IDENTIFIER_COLUMNS: [&str; 4] = ["Email", "First Name", "Last Name", "UID"];
const CONTACT_COLUMNS: [&str; 4] = ["Email", "First Name", "Last Name", "Phone Number"];

/// Row of the identifier source. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct IdentifierRow {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "UID")]
    uid: String,
}

/// Row of the contact source. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct ContactRow {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Phone Number")]
    phone_number: String,
}

struct Identity {
    first_name: String,
    last_name: String,
    uid: String,
}

/// Merge two CSV files on disk.
pub fn merge_files(identifier_path: &Path, contact_path: &Path) -> Result<RecipientSet> {
    tracing::info!(
        "Parsing {} and {}",
        identifier_path.display(),
        contact_path.display()
    );
    let identifiers = reader_builder()
        .from_path(identifier_path)
        .map_err(|e| CampaignError::from_csv(identifier_path, e))?;
    let contacts = reader_builder()
        .from_path(contact_path)
        .map_err(|e| CampaignError::from_csv(contact_path, e))?;
    merge_csv(identifiers, contacts)
}

/// Merge two CSV streams.
pub fn merge_readers<I: Read, C: Read>(identifiers: I, contacts: C) -> Result<RecipientSet> {
    merge_csv(
        reader_builder().from_reader(identifiers),
        reader_builder().from_reader(contacts),
    )
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true);
    builder
}

fn merge_csv<I: Read, C: Read>(
    mut identifiers: csv::Reader<I>,
    mut contacts: csv::Reader<C>,
) -> Result<RecipientSet> {
    // Later rows overwrite earlier ones for the same email.
    let mut lookup: HashMap<String, Identity> = HashMap::new();
    for row in read_rows::<_, IdentifierRow>(&mut identifiers, &IDENTIFIER_COLUMNS)? {
        lookup.insert(
            row.email,
            Identity {
                first_name: row.first_name,
                last_name: row.last_name,
                uid: row.uid,
            },
        );
    }

    let mut recipients = RecipientSet::new();
    for row in read_rows::<_, ContactRow>(&mut contacts, &CONTACT_COLUMNS)? {
        let Some(identity) = lookup.get(&row.email) else {
            continue;
        };
        if let Some(recipient) = reconcile(identity, row) {
            recipients.insert(recipient);
        }
    }

    if recipients.is_empty() {
        tracing::warn!("No recipient was parsed");
    } else {
        tracing::info!("{} recipients have been parsed", recipients.len());
    }
    Ok(recipients)
}

fn reconcile(identity: &Identity, contact: ContactRow) -> Option<Recipient> {
    let first_name = prefer(&identity.first_name, contact.first_name);
    let last_name = prefer(&identity.last_name, contact.last_name);
    let email = contact.email;

    if first_name.is_empty() {
        tracing::debug!("Missing first name for {email}");
    }
    if last_name.is_empty() {
        tracing::debug!("Missing last name for {email}");
    }

    let recipient = Recipient::new(
        first_name,
        last_name,
        email,
        identity.uid.clone(),
        contact.phone_number,
    );
    if let Some(field) = recipient.missing_required_field() {
        tracing::error!("Missing {field} for {}. Skipping...", recipient.email());
        return None;
    }
    Some(recipient)
}

fn prefer(primary: &str, fallback: String) -> String {
    if primary.is_empty() {
        fallback
    } else {
        primary.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTIFIERS: &str = "\
Email,First Name,Last Name,UID,Position
a@x.com,John,Doe,1,Engineer
b@x.com,,,2,Sales
c@x.com,Carl,Cox,,Ops
d@x.com,Dana,Old,4,Ops
d@x.com,Dana,New,5,Ops
";

    const CONTACTS: &str = "\
Email,First Name,Last Name,Phone Number
a@x.com,,,+15551234567
b@x.com,Bea,Bell,+15550000002
c@x.com,Carl,Cox,+15550000003
d@x.com,,,+15550000004
e@x.com,Eve,Stranger,+15550000005
f@x.com,Fay,NoPhone,
";

    fn merged() -> RecipientSet {
        merge_readers(IDENTIFIERS.as_bytes(), CONTACTS.as_bytes()).unwrap()
    }

    #[test]
    fn test_identifier_names_win_and_contact_names_fill_gaps() {
        let set = merged();
        assert!(set.contains(&Recipient::new("John", "Doe", "a@x.com", "1", "+15551234567")));
        assert!(set.contains(&Recipient::new("Bea", "Bell", "b@x.com", "2", "+15550000002")));
    }

    #[test]
    fn test_later_identifier_row_wins() {
        let set = merged();
        assert!(set.contains(&Recipient::new("Dana", "New", "d@x.com", "5", "+15550000004")));
        assert!(!set.iter().any(|r| r.uid() == "4"));
    }

    #[test]
    fn test_unmatched_and_invalid_rows_are_dropped() {
        let set = merged();
        assert_eq!(set.len(), 3);
        assert!(!set.iter().any(|r| r.email() == "c@x.com"));
        assert!(!set.iter().any(|r| r.email() == "e@x.com"));
        assert!(!set.iter().any(|r| r.email() == "f@x.com"));
    }

    #[test]
    fn test_no_recipient_has_empty_required_fields() {
        let contacts = "Email,First Name,Last Name,Phone Number\na@x.com,,,\nb@x.com,,,\n";
        let ids = "Email,First Name,Last Name,UID\na@x.com,A,A,1\nb@x.com,B,B,\n";
        let set = merge_readers(ids.as_bytes(), contacts.as_bytes()).unwrap();
        assert!(set.is_empty());
        for r in &merged() {
            assert!(!r.uid().is_empty());
            assert!(!r.phone_number().is_empty());
        }
    }

    #[test]
    fn test_merge_is_deterministic() {
        assert_eq!(merged(), merged());
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let ids = "Email,First Name,Last Name\na@x.com,A,A\n";
        let contacts = "Email,First Name,Last Name,Phone Number\na@x.com,,,+1\n";
        assert!(matches!(
            merge_readers(ids.as_bytes(), contacts.as_bytes()),
            Err(CampaignError::Validation(ref msg)) if msg.contains("UID")
        ));
    }

    #[test]
    fn test_short_identifier_row_is_skipped() {
        let ids = "Email,First Name,Last Name,UID\na@x.com,A,A,1\nb@x.com,B,B\n";
        let contacts = "Email,First Name,Last Name,Phone Number\na@x.com,,,+1555\nb@x.com,B,B,+1666\n";
        let set = merge_readers(ids.as_bytes(), contacts.as_bytes()).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&Recipient::new("A", "A", "a@x.com", "1", "+1555")));
    }

    #[test]
    fn test_short_contact_row_is_skipped() {
        let ids = "Email,First Name,Last Name,UID\na@x.com,A,A,1\nb@x.com,B,B,2\n";
        let contacts = "Email,First Name,Last Name,Phone Number\na@x.com,,,+1555\nb@x.com,B\n";
        let set = merge_readers(ids.as_bytes(), contacts.as_bytes()).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.iter().all(|r| r.email() == "a@x.com"));
    }

    #[test]
    fn test_empty_sources_merge_to_nothing() {
        assert!(merge_readers("".as_bytes(), "".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = dir.path().join("contacts.csv");
        std::fs::write(&contacts, CONTACTS).unwrap();
        let err = merge_files(&dir.path().join("absent.csv"), &contacts).unwrap_err();
        assert!(err.is_not_found());
    }
}
