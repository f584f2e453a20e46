use thiserror::Error;
use tracing::debug;

use crate::core::reference::{ReferenceEntry, ReferenceTable};
use crate::utils::validation::check_reference_limit;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SAM header format: {0}")]
    InvalidFormat(String),

    #[error("Invalid substitution map: {0}")]
    InvalidMap(String),

    #[error("Invalid gene intervals: {0}")]
    InvalidGenes(String),

    #[error("{0}")]
    TooManyReferences(String),
}

/// Convert a noodles header into a `ReferenceTable`
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if a reference name is not UTF-8 or is
/// declared twice, or `ParseError::TooManyReferences` if the limit is exceeded.
pub fn header_to_table(header: &noodles::sam::Header) -> Result<ReferenceTable, ParseError> {
    let mut entries = Vec::with_capacity(header.reference_sequences().len());

    for (name, map) in header.reference_sequences() {
        if let Some(msg) = check_reference_limit(entries.len()) {
            return Err(ParseError::TooManyReferences(msg));
        }

        let bytes: &[u8] = name.as_ref();
        let name = std::str::from_utf8(bytes).map_err(|_| {
            ParseError::InvalidFormat(format!("reference name is not UTF-8: {name}"))
        })?;

        let length = map.length().get() as u64;
        entries.push(ReferenceEntry::new(name, length));
    }

    debug!(references = entries.len(), "Read reference dictionary");

    ReferenceTable::new(entries)
        .map_err(|name| ParseError::InvalidFormat(format!("duplicate reference name: {name}")))
}

/// Parse the `@SQ` lines of raw header text into a `ReferenceTable`
///
/// Lines other than `@SQ` are ignored. An `@SQ` line without both `SN` and
/// `LN` is an error, since skipping it would shift every later id.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if an `@SQ` line is missing required
/// fields or a name is duplicated, or `ParseError::TooManyReferences` if the
/// limit is exceeded.
pub fn parse_header_text(text: &str) -> Result<ReferenceTable, ParseError> {
    let mut entries = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if !line.starts_with("@SQ") {
            continue;
        }

        let mut name: Option<&str> = None;
        let mut length: Option<u64> = None;

        for field in line.split('\t').skip(1) {
            if let Some((tag, value)) = field.split_once(':') {
                match tag {
                    "SN" => name = Some(value),
                    "LN" => length = value.replace('_', "").parse().ok(),
                    _ => {}
                }
            }
        }

        let (Some(name), Some(length)) = (name, length) else {
            return Err(ParseError::InvalidFormat(format!(
                "line {}: @SQ requires SN and a numeric LN",
                line_no + 1
            )));
        };

        if let Some(msg) = check_reference_limit(entries.len()) {
            return Err(ParseError::TooManyReferences(msg));
        }

        entries.push(ReferenceEntry::new(name, length));
    }

    ReferenceTable::new(entries)
        .map_err(|name| ParseError::InvalidFormat(format!("duplicate reference name: {name}")))
}
