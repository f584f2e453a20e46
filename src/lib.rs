//! # bam-transform
//!
//! A library for rewriting BAM files without changing their records.
//!
//! Pipelines often need the same alignments under a different reference
//! naming convention (`chr1` vs `1`), restricted to a few references, or with
//! the reads of another file taken out. Doing that by editing header text is
//! fragile: `chr1` is a prefix of `chr11`, and every record cites its
//! reference by numeric id, so the header and the records must change
//! together.
//!
//! `bam-transform` parses the header into a [`ReferenceTable`], rewrites the
//! table, and streams records through an adapter that remaps only the two
//! reference-id fields of each record.
//!
//! ## Features
//!
//! - **Rename**: every reference renamed, every record kept
//! - **Filter**: only records on references the map renames are kept
//! - **Subtract**: records of one file removed from another, memory bounded
//!   by the smaller side
//! - **Gene counts**: reads per gene through the index, multimappers
//!   counted once per query name
//! - **Atomic outputs**: staged next to the destination, indexed, then renamed
//! - **Build units**: optional stamp files to skip work whose inputs are unchanged
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use bam_transform::{SubstitutionMap, TransformOptions};
//! use bam_transform::ops::filter_and_rename;
//!
//! let map = SubstitutionMap::renames([("chr2", "sha")]).unwrap();
//! let summary = filter_and_rename(
//!     Path::new("in.bam"),
//!     Path::new("chr2.bam"),
//!     &map,
//!     &TransformOptions::default(),
//! )
//! .unwrap();
//!
//! println!("kept {} of {} records", summary.records_out, summary.records_in);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Reference tables, substitution maps, errors and shared types
//! - [`transform`]: Header rewriting and the record streams
//! - [`container`]: BAM reading, staged writing and indexing
//! - [`counting`]: Genome chunking and per-gene read counting
//! - [`ops`]: File-level operations
//! - [`job`]: Build units and invalidation policies
//! - [`parsing`]: Header and substitution map parsers
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod container;
pub mod core;
pub mod counting;
pub mod job;
pub mod ops;
pub mod parsing;
pub mod transform;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::error::{Result, TransformError};
pub use crate::core::genes::{GeneInterval, GeneModel};
pub use crate::core::reference::{ReferenceEntry, ReferenceTable};
pub use crate::core::substitution::{SubstitutionMap, Target};
pub use crate::core::types::*;
pub use crate::transform::identity::{IdentityKey, RecordIdentity};
