//! Flat-file recipient store.
//! Recipients are kept as CSV: human-readable and editable in a spreadsheet.
//! The same format doubles as the recovery checkpoint.

use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::path::Path;
use textcast_core::error::{CampaignError, Result};
use textcast_core::types::{Recipient, RecipientSet};

/// Column header, in on-disk order.
pub const HEADER: [&str; 5] = ["First Name", "Last Name", "Email", "UID", "Phone Number"];

/// Save recipients to `path`.
///
/// The file is written to a sibling temp file, synced, then renamed over
/// `path`, so readers only ever see the previous or the new snapshot.
pub fn save(path: &Path, recipients: &RecipientSet) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    // Temp files are created owner-only; keep the mode of the file being replaced.
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    write_to(&mut tmp, recipients)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CampaignError::Io(e.error))?;
    tracing::debug!("Saved {} recipients to {}", recipients.len(), path.display());
    Ok(())
}

/// Load recipients from `path`. A missing file yields [`CampaignError::NotFound`].
pub fn load(path: &Path) -> Result<RecipientSet> {
    let file = std::fs::File::open(path).map_err(|e| CampaignError::from_io(path, e))?;
    let recipients = read_from(file)?;
    if recipients.is_empty() {
        tracing::warn!("No recipients loaded from {}", path.display());
    } else {
        tracing::info!(
            "Loaded {} recipients from {}",
            recipients.len(),
            path.display()
        );
    }
    Ok(recipients)
}

/// Write the header and one row per recipient. The header is written even
/// when the set is empty.
pub fn write_to<W: Write>(writer: W, recipients: &RecipientSet) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADER)?;
    for recipient in recipients {
        wtr.serialize(recipient)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse recipients. Rows with an empty or missing UID or phone number are
/// skipped; a header without one of the [`HEADER`] columns is an error.
pub fn read_from<R: Read>(reader: R) -> Result<RecipientSet> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut recipients = RecipientSet::new();
    for recipient in read_rows::<_, Recipient>(&mut rdr, &HEADER)? {
        if let Some(field) = recipient.missing_required_field() {
            tracing::error!("Missing {field} for {}. Skipping...", recipient.email());
            continue;
        }
        recipients.insert(recipient);
    }
    Ok(recipients)
}

/// Deserialize every row of a headed CSV stream.
///
/// The header must name every column in `columns`. Rows shorter than the
/// header are padded with empty cells, so a truncated row reaches the
/// caller's field validation instead of failing the whole file. Input with
/// no header at all yields no rows.
pub(crate) fn read_rows<R: Read, T: DeserializeOwned>(
    rdr: &mut csv::Reader<R>,
    columns: &[&str],
) -> Result<Vec<T>> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(CampaignError::Validation(format!(
            "missing column(s): {}",
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let mut record = record?;
        while record.len() < headers.len() {
            record.push_field("");
        }
        rows.push(record.deserialize(Some(&headers))?);
    }
    Ok(rows)
}
