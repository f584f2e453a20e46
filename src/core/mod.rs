//! Core data types shared by every operation.
//!
//! - [`ReferenceTable`](reference::ReferenceTable): ordered `(id, name, length)` reference dictionary
//! - [`SubstitutionMap`](substitution::SubstitutionMap): old name → new name or drop
//! - [`TransformError`](error::TransformError): every failure an operation can report
//! - [`GeneModel`](genes::GeneModel): gene intervals per reference for read counting
//! - [`types`]: policies, options and summaries
//!
//! ## Reference naming
//!
//! Names are compared exactly. `chr1`, `1` and `chr01` are different
//! references unless a substitution map says otherwise, and a map entry for
//! `chr1` never affects `chr11`.

pub mod error;
pub mod genes;
pub mod reference;
pub mod substitution;
pub mod types;
