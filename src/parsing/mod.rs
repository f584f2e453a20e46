//! Parsers for reference dictionaries and substitution maps.
//!
//! This module provides parsers for:
//!
//! - **SAM/BAM headers**: Build a [`ReferenceTable`](crate::core::reference::ReferenceTable)
//!   from the `@SQ` lines of a `noodles` header or of raw header text
//! - **Substitution maps**: JSON objects, two-column TSV files and `OLD=NEW` pairs
//! - **Gene intervals**: `gene<TAB>reference<TAB>start<TAB>end` files for read counting
//!
//! ## Example
//!
//! ```rust
//! use bam_transform::parsing::sam::parse_header_text;
//! use bam_transform::parsing::substitution::parse_json_map;
//!
//! let header = "@SQ\tSN:chr1\tLN:1575\n@SQ\tSN:chr2\tLN:1584\n";
//! let table = parse_header_text(header).unwrap();
//! assert_eq!(table.names(), vec!["chr1", "chr2"]);
//!
//! let map = parse_json_map(r#"{"chr1": "shu", "chr2": null}"#).unwrap();
//! assert_eq!(map.len(), 2);
//! ```
//!
//! ## Substitution map formats
//!
//! | Format | Rename | Drop |
//! |--------|--------|------|
//! | JSON   | `"chr1": "shu"` | `"chr1": null` |
//! | TSV    | `chr1<TAB>shu` | `chr1`, `chr1<TAB>*` or `chr1<TAB>.` |
//! | CLI    | `--map chr1=shu` | `--drop chr1` |

pub mod genes;
pub mod sam;
pub mod substitution;

pub use sam::ParseError;
