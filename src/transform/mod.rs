//! The alignment transformation engine.
//!
//! - [`header`]: Rewrite a reference dictionary through a substitution map
//! - [`filter`]: Remap (and optionally filter) a record stream after a rewrite
//! - [`identity`]: Fixed-width record identity used for set operations
//! - [`subtract`]: Emit the records of one stream that are absent from another
//!
//! Every stage works on iterators of `noodles` records and preserves input
//! order. None of them touches files; see [`crate::ops`] for that.
//!
//! ## Example
//!
//! ```rust
//! use bam_transform::core::substitution::SubstitutionMap;
//! use bam_transform::parsing::sam::parse_header_text;
//! use bam_transform::transform::filter::filter_rename;
//! use noodles::sam::alignment::RecordBuf;
//!
//! let table = parse_header_text("@SQ\tSN:chr1\tLN:1575\n@SQ\tSN:chr2\tLN:1584\n").unwrap();
//! let map = SubstitutionMap::renames(vec![("chr2", "sha")]).unwrap();
//!
//! let records: Vec<std::io::Result<RecordBuf>> = Vec::new();
//! let stream = filter_rename(records, &table, &map).unwrap();
//! assert_eq!(stream.rewrite().table().names(), vec!["sha"]);
//! ```

pub mod filter;
pub mod header;
pub mod identity;
pub mod subtract;
