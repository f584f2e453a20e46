//! Record streams that remap reference ids after a header rewrite.
//!
//! [`filter_rename`] keeps only records placed on a reference the map keeps;
//! [`rename_all`] keeps every record. Both preserve input order and touch no
//! field other than `reference_sequence_id` and `mate_reference_sequence_id`.

use std::io;

use noodles::sam::alignment::RecordBuf;

use crate::core::error::{Result, TransformError};
use crate::core::reference::ReferenceTable;
use crate::core::substitution::SubstitutionMap;
use crate::core::types::{CoveragePolicy, StreamCounts};
use crate::transform::header::{self, HeaderRewrite};

/// What happens to a record whose own reference was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPolicy {
    /// Omit it, and omit records with no reference at all
    Filter,
    /// Every reference survives, so every record is emitted
    RenameAll,
}

/// Iterator adapter applying a [`HeaderRewrite`] to a record stream
pub struct FilterRename<I> {
    records: I,
    rewrite: HeaderRewrite,
    policy: RecordPolicy,
    counts: StreamCounts,
}

impl<I> FilterRename<I>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
{
    pub fn new(records: I, rewrite: HeaderRewrite, policy: RecordPolicy) -> Self {
        Self {
            records,
            rewrite,
            policy,
            counts: StreamCounts::default(),
        }
    }

    #[must_use]
    pub fn rewrite(&self) -> &HeaderRewrite {
        &self.rewrite
    }

    /// Records consumed and emitted so far
    #[must_use]
    pub fn counts(&self) -> StreamCounts {
        self.counts
    }

    fn remap(&self, mut record: RecordBuf) -> Result<Option<RecordBuf>> {
        match record.reference_sequence_id() {
            Some(old_id) => {
                self.check_declared(&record, old_id)?;
                match self.rewrite.new_id(old_id) {
                    Some(new_id) => *record.reference_sequence_id_mut() = Some(new_id),
                    None if self.policy == RecordPolicy::Filter => return Ok(None),
                    None => return Err(self.missing(&record, old_id)),
                }
            }
            None if self.policy == RecordPolicy::Filter => return Ok(None),
            None => {}
        }

        // The mate never decides inclusion; a dropped mate reference becomes unset.
        if let Some(old_id) = record.mate_reference_sequence_id() {
            self.check_declared(&record, old_id)?;
            let new_id = self.rewrite.new_id(old_id);
            if new_id.is_none() && self.policy == RecordPolicy::RenameAll {
                return Err(self.missing(&record, old_id));
            }
            *record.mate_reference_sequence_id_mut() = new_id;
        }

        Ok(Some(record))
    }

    fn check_declared(&self, record: &RecordBuf, id: usize) -> Result<()> {
        if id >= self.rewrite.old_len() {
            return Err(self.missing(record, id));
        }
        Ok(())
    }

    fn missing(&self, record: &RecordBuf, id: usize) -> TransformError {
        TransformError::MissingReference {
            record: record_name(record),
            id,
            declared: self.rewrite.old_len(),
        }
    }
}

impl<I> Iterator for FilterRename<I>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
{
    type Item = Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            self.counts.records_in += 1;

            match self.remap(record) {
                Ok(Some(record)) => {
                    self.counts.records_out += 1;
                    return Some(Ok(record));
                }
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Keep records whose reference the map renames, dropping the rest.
///
/// References absent from `substitution` are dropped like explicit drops.
///
/// # Errors
///
/// Returns the header rewrite errors (`NoEffectiveChange`) before any record is read.
pub fn filter_rename<I>(
    records: I,
    old_table: &ReferenceTable,
    substitution: &SubstitutionMap,
) -> Result<FilterRename<I::IntoIter>>
where
    I: IntoIterator<Item = io::Result<RecordBuf>>,
{
    let rewrite = header::rewrite(old_table, substitution, CoveragePolicy::DropUncovered)?;
    Ok(FilterRename::new(
        records.into_iter(),
        rewrite,
        RecordPolicy::Filter,
    ))
}

/// Rename every reference; no record is dropped.
///
/// # Errors
///
/// Returns `IncompleteRenameMap` if a reference has no new name, or
/// `NoEffectiveChange`, before any record is read.
pub fn rename_all<I>(
    records: I,
    old_table: &ReferenceTable,
    substitution: &SubstitutionMap,
) -> Result<FilterRename<I::IntoIter>>
where
    I: IntoIterator<Item = io::Result<RecordBuf>>,
{
    let rewrite = header::rewrite(old_table, substitution, CoveragePolicy::RequireAll)?;
    Ok(FilterRename::new(
        records.into_iter(),
        rewrite,
        RecordPolicy::RenameAll,
    ))
}

pub(crate) fn record_name(record: &RecordBuf) -> String {
    record
        .name()
        .map_or_else(|| "*".to_string(), |n| n.to_string())
}
