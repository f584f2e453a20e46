use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single reference sequence declared by an alignment header (`@SQ` line)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Sequence name (SN tag in SAM)
    pub name: String,

    /// Sequence length (LN tag in SAM)
    pub length: u64,
}

impl ReferenceEntry {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Ordered reference dictionary of an alignment file.
///
/// The id of an entry is its position in the table, so ids are dense and
/// zero-based. Names are unique. A table is never mutated once built:
/// renaming or filtering produces a new table.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl PartialEq for ReferenceTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for ReferenceTable {}

impl ReferenceTable {
    /// Build a table from entries in declaration order.
    ///
    /// Returns the first duplicated name as the error.
    pub fn new(entries: Vec<ReferenceEntry>) -> Result<Self, String> {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (id, entry) in entries.iter().enumerate() {
            if by_name.insert(entry.name.clone(), id).is_some() {
                return Err(entry.name.clone());
            }
        }
        Ok(Self { entries, by_name })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&ReferenceEntry> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn name(&self, id: usize) -> Option<&str> {
        self.entries.get(id).map(|e| e.name.as_str())
    }

    /// Look up the id of a reference by exact name
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ReferenceEntry)> {
        self.entries.iter().enumerate()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }
}
