use thiserror::Error;

use crate::parsing::ParseError;

/// Errors raised by the rename, filter and subtraction operations.
///
/// All of them are detected before the output of the failing call is
/// committed to its final location.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The substitution map did not change any reference in the header
    #[error("No replacement happened: no reference in the header was changed by the substitution map")]
    NoEffectiveChange,

    /// Two source references would end up with the same name
    #[error("Ambiguous substitution target '{target}': claimed by both '{first}' and '{second}'")]
    AmbiguousTarget {
        target: String,
        first: String,
        second: String,
    },

    /// Full-rename mode requires every header reference to be renamed
    #[error("Incomplete rename map: no new name for {}", .uncovered.join(", "))]
    IncompleteRenameMap { uncovered: Vec<String> },

    /// Subtraction inputs disagree on a reference that the exclude side uses
    #[error("Incompatible reference tables: {0}")]
    IncompatibleReferenceTables(String),

    #[error("Invalid substitution map: {0}")]
    InvalidMap(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid gene intervals: {0}")]
    InvalidGeneIntervals(String),

    /// A record cites a reference id its own header does not declare
    #[error("Record '{record}' cites reference id {id}, but the header declares only {declared} references")]
    MissingReference {
        record: String,
        id: usize,
        declared: usize,
    },
}

impl From<ParseError> for TransformError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Io(e) => TransformError::Io(e),
            ParseError::InvalidMap(msg) => TransformError::InvalidMap(msg),
            ParseError::InvalidGenes(msg) => TransformError::InvalidGeneIntervals(msg),
            ParseError::InvalidFormat(msg) => {
                TransformError::InvalidHeader(msg)
            }
            ParseError::TooManyReferences(msg) => TransformError::InvalidHeader(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
