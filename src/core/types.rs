use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How the header rewriter treats references the substitution map does not mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoveragePolicy {
    /// Every reference must be renamed; anything else is an `IncompleteRenameMap` error
    RequireAll,
    /// References without an entry are dropped together with their records
    DropUncovered,
}

/// When to build a BAI next to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPolicy {
    /// Index the output; fail if it is not coordinate-sorted
    Always,
    /// Index the output when its header declares `SO:coordinate`
    #[default]
    IfSorted,
    /// Never write an index
    Never,
}

/// Which record fields decide whether two records are the same read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityMode {
    /// Query name, flags, reference and position
    #[default]
    NameFlagsPosition,
    /// As above, plus bases and base qualities
    WithSequence,
}

impl std::fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameFlagsPosition => write!(f, "name+flags+position"),
            Self::WithSequence => write!(f, "name+flags+position+sequence"),
        }
    }
}

/// Options shared by the file-level operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub index: IndexPolicy,
    pub identity: IdentityMode,
}

/// Record counts observed while streaming one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCounts {
    pub records_in: u64,
    pub records_out: u64,
}

impl StreamCounts {
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.records_in - self.records_out
    }
}

/// What a file-level operation did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSummary {
    pub operation: String,
    pub input: String,
    pub output: String,
    pub records_in: u64,
    pub records_out: u64,
    pub records_dropped: u64,
    pub references_in: usize,
    pub references_out: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion_keys: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// Number of records placed on one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCount {
    pub name: String,
    pub length: u64,
    pub mapped: u64,
    pub unmapped: u64,
}

/// Per-reference record counts of an alignment file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCounts {
    pub references: Vec<ReferenceCount>,
    /// Records without a reference id
    pub unplaced_unmapped: u64,
}

impl ReferenceCounts {
    /// Total number of records, placed or not
    #[must_use]
    pub fn total(&self) -> u64 {
        self.references
            .iter()
            .map(|r| r.mapped + r.unmapped)
            .sum::<u64>()
            + self.unplaced_unmapped
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ReferenceCount> {
        self.references.iter().find(|r| r.name == name)
    }
}

/// Reads counted per gene, with per-reference sums of the gene counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneCounts {
    pub genes: IndexMap<String, u64>,
    pub references: IndexMap<String, u64>,
}

impl GeneCounts {
    /// Sum over all genes; a read counted for two genes counts twice
    #[must_use]
    pub fn total(&self) -> u64 {
        self.references.values().sum()
    }

    #[must_use]
    pub fn get(&self, gene: &str) -> Option<u64> {
        self.genes.get(gene).copied()
    }

    /// One flat table: every gene, then `_total`, then `_<reference>` for
    /// each counted reference
    #[must_use]
    pub fn to_flat(&self) -> IndexMap<String, u64> {
        let mut flat = self.genes.clone();
        flat.insert("_total".to_string(), self.total());
        for (reference, count) in &self.references {
            flat.insert(format!("_{reference}"), *count);
        }
        flat
    }
}
