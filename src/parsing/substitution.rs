use indexmap::IndexMap;
use std::path::Path;

use crate::core::error::TransformError;
use crate::core::substitution::{SubstitutionMap, Target};
use crate::parsing::sam::ParseError;

/// Parse a substitution map file, picking the format from the extension
/// (`.json` for JSON, anything else as TSV)
///
/// # Errors
///
/// Returns `TransformError::Io` if the file cannot be read, or
/// `TransformError::InvalidMap` / `TransformError::AmbiguousTarget` for bad content.
pub fn parse_map_file(path: &Path) -> Result<SubstitutionMap, TransformError> {
    let content = std::fs::read_to_string(path).map_err(ParseError::Io)?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json_map(&content)
    } else {
        parse_tsv_map(&content)
    }
}

/// Parse a JSON object of `old -> new`, where `null` drops the reference
///
/// # Errors
///
/// Returns `TransformError::InvalidMap` if the text is not a JSON object of
/// strings/nulls, or the map-level errors of [`SubstitutionMap::new`].
pub fn parse_json_map(text: &str) -> Result<SubstitutionMap, TransformError> {
    let raw: IndexMap<String, Option<String>> = serde_json::from_str(text)
        .map_err(|e| ParseError::InvalidMap(format!("invalid JSON: {e}")))?;

    SubstitutionMap::new(raw.into_iter().map(|(old, new)| {
        let target = match new {
            Some(name) => Target::Rename(name),
            None => Target::Drop,
        };
        (old, target)
    }))
}

/// Parse tab-separated `old<TAB>new` lines.
///
/// A line with a single column, or with `*` or `.` as the second column,
/// drops the reference. Blank lines and `#` comments are skipped.
///
/// # Errors
///
/// Returns `TransformError::InvalidMap` for lines with more than two columns,
/// or the map-level errors of [`SubstitutionMap::new`].
pub fn parse_tsv_map(text: &str) -> Result<SubstitutionMap, TransformError> {
    let mut pairs = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let target = match fields.as_slice() {
            [_] | [_, "" | "*" | "."] => Target::Drop,
            [_, new] => Target::Rename((*new).to_string()),
            _ => {
                return Err(ParseError::InvalidMap(format!(
                    "line {}: expected 1 or 2 tab-separated columns, found {}",
                    line_no + 1,
                    fields.len()
                ))
                .into());
            }
        };

        if fields[0].is_empty() {
            return Err(
                ParseError::InvalidMap(format!("line {}: empty source name", line_no + 1)).into(),
            );
        }
        pairs.push((fields[0].to_string(), target));
    }

    SubstitutionMap::new(pairs)
}

/// Build a map from command-line `OLD=NEW` renames and `OLD` drops
///
/// # Errors
///
/// Returns `TransformError::InvalidMap` for a rename without `=`, or the
/// map-level errors of [`SubstitutionMap::new`].
pub fn parse_cli_pairs(renames: &[String], drops: &[String]) -> Result<SubstitutionMap, TransformError> {
    let mut pairs = Vec::with_capacity(renames.len() + drops.len());

    for pair in renames {
        let Some((old, new)) = pair.split_once('=') else {
            return Err(ParseError::InvalidMap(format!("expected OLD=NEW, got '{pair}'")).into());
        };
        pairs.push((old.to_string(), Target::Rename(new.to_string())));
    }
    for old in drops {
        pairs.push((old.clone(), Target::Drop));
    }

    SubstitutionMap::new(pairs)
}
