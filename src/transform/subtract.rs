//! Set difference of two alignment record streams.
//!
//! The exclude side is read once into an [`ExclusionSet`] of fixed-width
//! [`IdentityKey`]s; the input side is then streamed and every record whose
//! key is absent is emitted unchanged. Memory is proportional to the number
//! of distinct keys on the exclude side, never to the input.

use std::collections::HashSet;
use std::io;

use noodles::sam::alignment::RecordBuf;
use tracing::{debug, info};

use crate::core::error::{Result, TransformError};
use crate::core::reference::ReferenceTable;
use crate::core::types::StreamCounts;
use crate::transform::filter::record_name;
use crate::transform::identity::{IdentityKey, RecordIdentity};

/// How one exclude-side reference id maps into the input's id space
#[derive(Debug, Clone, PartialEq, Eq)]
enum Translation {
    /// Same name (and length) declared by the input under this id
    Input(usize),
    /// The input does not declare this reference; its records match nothing
    Absent,
    /// The tables disagree in a way that makes comparison meaningless
    Conflict(String),
}

/// Exclude-side reference ids resolved by name into the input's id space
#[derive(Debug, Clone)]
pub struct ReferenceTranslation {
    ids: Vec<Translation>,
}

impl ReferenceTranslation {
    /// Resolve every reference of `exclude` against `input`.
    ///
    /// Conflicts are recorded, not raised: they only matter if an exclude
    /// record actually cites the reference.
    #[must_use]
    pub fn new(exclude: &ReferenceTable, input: &ReferenceTable) -> Self {
        let ids = exclude
            .iter()
            .map(|(id, entry)| match input.id_of(&entry.name) {
                Some(input_id) => {
                    let input_length = input.get(input_id).map_or(0, |e| e.length);
                    if input_length == entry.length {
                        Translation::Input(input_id)
                    } else {
                        Translation::Conflict(format!(
                            "'{}' has length {} in the exclude file but {} in the input",
                            entry.name, entry.length, input_length
                        ))
                    }
                }
                None => match input.name(id) {
                    Some(other) => Translation::Conflict(format!(
                        "reference id {id} is '{}' in the exclude file but '{other}' in the input",
                        entry.name
                    )),
                    None => Translation::Absent,
                },
            })
            .collect();

        Self { ids }
    }

    /// Input id for an exclude id, `Ok(None)` if the input lacks the reference
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleReferenceTables` for a conflicting reference, or
    /// `MissingReference` for an id the exclude header does not declare.
    fn resolve(&self, record: &RecordBuf, id: usize) -> Result<Option<usize>> {
        match self.ids.get(id) {
            Some(Translation::Input(input_id)) => Ok(Some(*input_id)),
            Some(Translation::Absent) => Ok(None),
            Some(Translation::Conflict(msg)) => {
                Err(TransformError::IncompatibleReferenceTables(msg.clone()))
            }
            None => Err(TransformError::MissingReference {
                record: record_name(record),
                id,
                declared: self.ids.len(),
            }),
        }
    }
}

/// Identity keys of every record in the exclude file
#[derive(Debug, Default)]
pub struct ExclusionSet {
    keys: HashSet<IdentityKey>,
    records: u64,
    unmatchable: u64,
}

impl ExclusionSet {
    /// Consume `records` (the exclude side) completely.
    ///
    /// # Errors
    ///
    /// Returns read errors, `IncompatibleReferenceTables` if a mapped record
    /// cites a conflicting reference, or `MissingReference`.
    pub fn build<I, F>(
        records: I,
        exclude_table: &ReferenceTable,
        input_table: &ReferenceTable,
        identity: &F,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = io::Result<RecordBuf>>,
        F: RecordIdentity + ?Sized,
    {
        let translation = ReferenceTranslation::new(exclude_table, input_table);
        let mut set = Self::default();

        for result in records {
            let record = result?;
            set.records += 1;

            let reference = match record.reference_sequence_id() {
                // Unmapped records are keyed without placement, so their
                // reference id is irrelevant.
                Some(_) if record.flags().is_unmapped() => None,
                Some(id) => match translation.resolve(&record, id)? {
                    Some(input_id) => Some(input_id),
                    None => {
                        set.unmatchable += 1;
                        continue;
                    }
                },
                None => None,
            };

            set.keys.insert(identity.key(&record, reference));
        }

        debug!(
            records = set.records,
            keys = set.keys.len(),
            unmatchable = set.unmatchable,
            "Built exclusion set"
        );

        Ok(set)
    }

    #[must_use]
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of distinct keys held
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Records read from the exclude side
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Exclude records on references the input does not declare
    #[must_use]
    pub fn unmatchable(&self) -> u64 {
        self.unmatchable
    }
}

/// Iterator over input records absent from an [`ExclusionSet`]
pub struct Subtract<I, F> {
    records: I,
    exclusion: ExclusionSet,
    identity: F,
    declared: usize,
    counts: StreamCounts,
}

impl<I, F> Subtract<I, F>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
    F: RecordIdentity,
{
    pub fn new(records: I, exclusion: ExclusionSet, identity: F, input_table: &ReferenceTable) -> Self {
        Self {
            records,
            exclusion,
            identity,
            declared: input_table.len(),
            counts: StreamCounts::default(),
        }
    }

    #[must_use]
    pub fn exclusion(&self) -> &ExclusionSet {
        &self.exclusion
    }

    #[must_use]
    pub fn counts(&self) -> StreamCounts {
        self.counts
    }

    fn keep(&self, record: &RecordBuf) -> Result<bool> {
        let reference = record.reference_sequence_id();
        if let Some(id) = reference {
            if id >= self.declared {
                return Err(TransformError::MissingReference {
                    record: record_name(record),
                    id,
                    declared: self.declared,
                });
            }
        }
        Ok(!self.exclusion.contains(&self.identity.key(record, reference)))
    }
}

impl<I, F> Iterator for Subtract<I, F>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
    F: RecordIdentity,
{
    type Item = Result<RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            self.counts.records_in += 1;

            match self.keep(&record) {
                Ok(true) => {
                    self.counts.records_out += 1;
                    return Some(Ok(record));
                }
                Ok(false) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Records of `input` whose identity does not occur in `exclude`.
///
/// `exclude` is consumed completely before this returns, so every
/// table-compatibility error surfaces before the first input record is read.
///
/// # Errors
///
/// Returns the errors of [`ExclusionSet::build`].
pub fn subtract<I, J, F>(
    input: I,
    input_table: &ReferenceTable,
    exclude: J,
    exclude_table: &ReferenceTable,
    identity: F,
) -> Result<Subtract<I::IntoIter, F>>
where
    I: IntoIterator<Item = io::Result<RecordBuf>>,
    J: IntoIterator<Item = io::Result<RecordBuf>>,
    F: RecordIdentity,
{
    let exclusion = ExclusionSet::build(exclude, exclude_table, input_table, &identity)?;
    info!(
        exclude_records = exclusion.records(),
        exclusion_keys = exclusion.len(),
        "Loaded exclusion set"
    );
    Ok(Subtract::new(
        input.into_iter(),
        exclusion,
        identity,
        input_table,
    ))
}
