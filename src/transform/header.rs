//! Header rewriting: apply a substitution map to a reference dictionary.
//!
//! Renaming works on the parsed [`ReferenceTable`], never on header text, so
//! `chr1` in a map cannot touch `chr11` or `chr1_random`.

use bstr::BString;
use noodles::sam;
use noodles::sam::header::record::value::{map::ReferenceSequence, Map};
use indexmap::IndexMap;
use tracing::debug;

use crate::core::error::{Result, TransformError};
use crate::core::reference::{ReferenceEntry, ReferenceTable};
use crate::core::substitution::{SubstitutionMap, Target};
use crate::core::types::CoveragePolicy;

/// Result of rewriting a reference dictionary.
///
/// Holds the new table and where every old id ended up, which is all a
/// record stream needs to remap `reference_id` and `mate_reference_id`.
#[derive(Debug, Clone)]
pub struct HeaderRewrite {
    table: ReferenceTable,
    id_map: Vec<Option<usize>>,
}

impl HeaderRewrite {
    /// The rewritten reference table
    #[must_use]
    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// New id of an old reference, or `None` if it was dropped or unknown
    #[must_use]
    pub fn new_id(&self, old_id: usize) -> Option<usize> {
        self.id_map.get(old_id).copied().flatten()
    }

    /// Number of references in the table the rewrite was computed from
    #[must_use]
    pub fn old_len(&self) -> usize {
        self.id_map.len()
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.id_map.iter().filter(|id| id.is_none()).count()
    }
}

/// Apply `substitution` to `table`.
///
/// Renamed entries keep their length and relative order; dropped entries are
/// removed and later ids shift down. With `CoveragePolicy::RequireAll` every
/// entry must map to a new name.
///
/// # Errors
///
/// Returns `TransformError::NoEffectiveChange` when no map entry names a
/// header reference or the resulting table equals the input, and
/// `TransformError::IncompleteRenameMap` when a required entry is not renamed.
pub fn rewrite(
    table: &ReferenceTable,
    substitution: &SubstitutionMap,
    policy: CoveragePolicy,
) -> Result<HeaderRewrite> {
    if !table.iter().any(|(_, e)| substitution.get(&e.name).is_some()) {
        return Err(TransformError::NoEffectiveChange);
    }

    let mut entries = Vec::with_capacity(table.len());
    let mut id_map = Vec::with_capacity(table.len());
    let mut uncovered = Vec::new();

    for (_, entry) in table.iter() {
        match (substitution.get(&entry.name), policy) {
            (Some(Target::Rename(new_name)), _) => {
                id_map.push(Some(entries.len()));
                entries.push(ReferenceEntry::new(new_name.clone(), entry.length));
            }
            (Some(Target::Drop) | None, CoveragePolicy::RequireAll) => {
                uncovered.push(entry.name.clone());
                id_map.push(None);
            }
            (Some(Target::Drop), CoveragePolicy::DropUncovered) => {
                id_map.push(None);
            }
            (None, CoveragePolicy::DropUncovered) => {
                debug!(reference = %entry.name, "Reference not in substitution map, dropping");
                id_map.push(None);
            }
        }
    }

    if !uncovered.is_empty() {
        return Err(TransformError::IncompleteRenameMap { uncovered });
    }

    for (source, _) in substitution.iter() {
        if !table.contains(source) {
            debug!(reference = %source, "Substitution map entry matches no header reference");
        }
    }

    let table_out = ReferenceTable::new(entries).map_err(|name| {
        TransformError::InvalidHeader(format!("duplicate reference name after rewrite: {name}"))
    })?;

    if table_out == *table {
        return Err(TransformError::NoEffectiveChange);
    }

    Ok(HeaderRewrite {
        table: table_out,
        id_map,
    })
}

/// Build the output header: the input header with its `@SQ` lines renamed or
/// removed according to `rewrite`. Every other header line, and every other
/// field of a kept `@SQ` line, is carried over unchanged.
///
/// # Errors
///
/// Returns `TransformError::InvalidHeader` if `header` is not the header the
/// rewrite was computed from.
pub fn apply_to_header(header: &sam::Header, rewrite: &HeaderRewrite) -> Result<sam::Header> {
    let old = header.reference_sequences();
    if old.len() != rewrite.old_len() {
        return Err(TransformError::InvalidHeader(format!(
            "header declares {} references, rewrite expects {}",
            old.len(),
            rewrite.old_len()
        )));
    }

    let mut reference_sequences: IndexMap<BString, Map<ReferenceSequence>> =
        IndexMap::with_capacity(rewrite.table().len());

    for (old_id, (_, map)) in old.iter().enumerate() {
        if let Some(new_id) = rewrite.new_id(old_id) {
            let Some(entry) = rewrite.table().get(new_id) else {
                return Err(TransformError::InvalidHeader(format!(
                    "rewrite maps reference {old_id} to missing id {new_id}"
                )));
            };
            reference_sequences.insert(BString::from(entry.name.as_str()), map.clone());
        }
    }

    let mut out = header.clone();
    *out.reference_sequences_mut() = reference_sequences;
    Ok(out)
}
