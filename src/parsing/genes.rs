use std::path::Path;

use tracing::debug;

use crate::core::error::TransformError;
use crate::core::genes::{GeneInterval, GeneModel};
use crate::parsing::sam::ParseError;

/// Parse a gene interval file
///
/// # Errors
///
/// Returns `TransformError::Io` if the file cannot be read, or
/// `TransformError::InvalidGeneIntervals` for malformed lines.
pub fn parse_gene_file(path: &Path) -> Result<GeneModel, TransformError> {
    let content = std::fs::read_to_string(path).map_err(ParseError::Io)?;
    let model = parse_gene_tsv(&content)?;
    debug!(
        path = %path.display(),
        genes = model.gene_count(),
        "Loaded gene intervals"
    );
    Ok(model)
}

/// Parse tab-separated `gene<TAB>reference<TAB>start<TAB>end` lines.
///
/// Coordinates are 0-based, end exclusive (as in BED). A gene may span
/// several lines, one per exon. Blank lines and `#` comments are skipped.
///
/// # Errors
///
/// Returns `TransformError::InvalidGeneIntervals` for lines without exactly four
/// columns, non-numeric coordinates or empty intervals.
pub fn parse_gene_tsv(text: &str) -> Result<GeneModel, TransformError> {
    let mut intervals = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let [gene, reference, start, end] = fields.as_slice() else {
            return Err(ParseError::InvalidGenes(format!(
                "line {}: expected gene, reference, start and end, found {} columns",
                line_no + 1,
                fields.len()
            ))
            .into());
        };

        let coordinate = |value: &str| {
            value.parse::<usize>().map_err(|_| {
                ParseError::InvalidGenes(format!(
                    "line {}: invalid coordinate '{value}'",
                    line_no + 1
                ))
            })
        };
        intervals.push(GeneInterval::new(
            *gene,
            *reference,
            coordinate(*start)?,
            coordinate(*end)?,
        ));
    }

    GeneModel::new(intervals).map_err(TransformError::InvalidGeneIntervals)
}
