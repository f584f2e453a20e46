//! File-level operations.
//!
//! Each function opens its inputs, runs one transform stream into a staged
//! output, builds the index and commits. Errors detected from the headers
//! alone (an ineffective or incomplete map, incompatible tables) are raised
//! before the output is even staged.

use std::path::Path;

use tracing::{debug, info};

use crate::container::{open_for_read, open_indexed, StagedOutput};
use crate::core::error::{Result, TransformError};
use crate::core::genes::GeneModel;
use crate::core::substitution::SubstitutionMap;
use crate::core::types::{
    GeneCounts, ReferenceCount, ReferenceCounts, StreamCounts, TransformOptions,
    TransformSummary,
};
use crate::counting::{chunk_reference, ChunkCounter, CountedRead, CHUNK_SIZE};
use crate::transform::filter::{filter_rename, record_name, rename_all, RecordPolicy};
use crate::transform::header::apply_to_header;
use crate::transform::subtract::subtract;

/// Rename every reference of `input` and write the result to `output`.
///
/// # Errors
///
/// Returns `IncompleteRenameMap` if the map does not rename every reference,
/// `NoEffectiveChange` if it changes nothing, or I/O and decode errors. No
/// file is created at `output` on error.
pub fn rename_references(
    input: &Path,
    output: &Path,
    substitution: &SubstitutionMap,
    options: &TransformOptions,
) -> Result<TransformSummary> {
    rewrite_file(input, output, substitution, RecordPolicy::RenameAll, options)
}

/// Keep only records on references the map renames, renaming them.
///
/// # Errors
///
/// Returns `NoEffectiveChange` if the map changes nothing, or I/O and decode
/// errors. No file is created at `output` on error.
pub fn filter_and_rename(
    input: &Path,
    output: &Path,
    substitution: &SubstitutionMap,
    options: &TransformOptions,
) -> Result<TransformSummary> {
    rewrite_file(input, output, substitution, RecordPolicy::Filter, options)
}

fn rewrite_file(
    input: &Path,
    output: &Path,
    substitution: &SubstitutionMap,
    policy: RecordPolicy,
    options: &TransformOptions,
) -> Result<TransformSummary> {
    let operation = match policy {
        RecordPolicy::RenameAll => "rename",
        RecordPolicy::Filter => "filter",
    };
    info!(
        operation,
        input = %input.display(),
        output = %output.display(),
        entries = substitution.len(),
        "Starting"
    );

    let mut source = open_for_read(input)?;
    let header_in = source.header().clone();
    let table_in = source.table().clone();

    let mut stream = match policy {
        RecordPolicy::RenameAll => rename_all(source.records(), &table_in, substitution)?,
        RecordPolicy::Filter => filter_rename(source.records(), &table_in, substitution)?,
    };
    let header_out = apply_to_header(&header_in, stream.rewrite())?;
    let references_out = stream.rewrite().table().len();

    let staged = StagedOutput::new(output)?;
    staged.write_all(&header_out, &mut stream)?;
    let counts = stream.counts();
    let index = staged.commit(&header_out, options.index)?;

    let summary = summarize(
        operation,
        input,
        output,
        counts,
        table_in.len(),
        references_out,
        index.as_deref(),
    );
    log_summary(&summary);
    Ok(summary)
}

/// Write the records of `input` that do not occur in `exclude` to `output`.
///
/// The output header is the input header unchanged.
///
/// # Errors
///
/// Returns `IncompatibleReferenceTables` if an exclude record's reference
/// cannot be matched to the input by name and length, or I/O and decode
/// errors. No file is created at `output` on error.
pub fn subtract_files(
    input: &Path,
    exclude: &Path,
    output: &Path,
    options: &TransformOptions,
) -> Result<TransformSummary> {
    info!(
        operation = "subtract",
        input = %input.display(),
        exclude = %exclude.display(),
        output = %output.display(),
        identity = %options.identity,
        "Starting"
    );

    let mut exclude_source = open_for_read(exclude)?;
    let exclude_table = exclude_source.table().clone();

    let mut source = open_for_read(input)?;
    let header = source.header().clone();
    let table = source.table().clone();

    let mut stream = subtract(
        source.records(),
        &table,
        exclude_source.records(),
        &exclude_table,
        options.identity,
    )?;
    let exclusion_keys = stream.exclusion().len();

    let staged = StagedOutput::new(output)?;
    staged.write_all(&header, &mut stream)?;
    let counts = stream.counts();
    let index = staged.commit(&header, options.index)?;

    let mut summary = summarize(
        "subtract",
        input,
        output,
        counts,
        table.len(),
        table.len(),
        index.as_deref(),
    );
    summary.exclusion_keys = Some(exclusion_keys);
    log_summary(&summary);
    Ok(summary)
}

/// Count the records of `path` per reference.
///
/// Records flagged unmapped but placed on a reference (typically the
/// unmapped mate of a mapped read) count towards that reference's
/// `unmapped`; records with no reference count as unplaced.
///
/// # Errors
///
/// Returns I/O and decode errors, or `MissingReference` if a record cites an
/// undeclared reference id.
pub fn count_references(path: &Path) -> Result<ReferenceCounts> {
    let mut source = open_for_read(path)?;
    let table = source.table().clone();

    let mut references: Vec<ReferenceCount> = table
        .entries()
        .iter()
        .map(|e| ReferenceCount {
            name: e.name.clone(),
            length: e.length,
            mapped: 0,
            unmapped: 0,
        })
        .collect();
    let mut unplaced_unmapped = 0u64;

    for result in source.records() {
        let record = result?;
        let Some(id) = record.reference_sequence_id() else {
            unplaced_unmapped += 1;
            continue;
        };

        let declared = references.len();
        let count = references
            .get_mut(id)
            .ok_or_else(|| TransformError::MissingReference {
                record: record_name(&record),
                id,
                declared,
            })?;
        if record.flags().is_unmapped() {
            count.unmapped += 1;
        } else {
            count.mapped += 1;
        }
    }

    let counts = ReferenceCounts {
        references,
        unplaced_unmapped,
    };
    info!(
        path = %path.display(),
        records = counts.total(),
        references = counts.references.len(),
        "Counted records"
    );
    Ok(counts)
}

/// Count the reads of an indexed BAM per gene, ignoring strand.
///
/// Every reference of `genes` is walked in chunks through the index (`index`,
/// or `<path>.bai` when `None`). Every gene of `genes` appears in the result,
/// with 0 when nothing hit it.
///
/// # Errors
///
/// Returns `InvalidGeneIntervals` if `genes` names a reference the BAM header
/// does not declare, or I/O and decode errors (including a missing index).
pub fn count_gene_reads(path: &Path, index: Option<&Path>, genes: &GeneModel) -> Result<GeneCounts> {
    info!(
        path = %path.display(),
        genes = genes.gene_count(),
        "Counting reads per gene"
    );

    let mut source = open_indexed(path, index)?;
    let table = source.table().clone();
    let mut counts = GeneCounts::default();

    for (reference, reference_genes) in genes.references() {
        let length = table
            .id_of(reference)
            .and_then(|id| table.get(id))
            .map(|entry| usize::try_from(entry.length).unwrap_or(usize::MAX))
            .ok_or_else(|| {
                TransformError::InvalidGeneIntervals(format!(
                    "reference '{reference}' is not declared by {}",
                    path.display()
                ))
            })?;

        for gene in reference_genes.gene_ids() {
            counts.genes.entry(gene.clone()).or_insert(0);
        }

        let mut reference_total = 0u64;
        for chunk in chunk_reference(reference_genes, length, CHUNK_SIZE) {
            let mut counter = ChunkCounter::new(reference_genes, chunk);
            for result in source.query(reference, chunk.start, chunk.stop.min(length))? {
                if let Some(read) = CountedRead::from_record(&result?)? {
                    counter.add(&read);
                }
            }

            for (gene, n) in reference_genes.gene_ids().iter().zip(counter.finish()) {
                *counts.genes.entry(gene.clone()).or_insert(0) += n;
                reference_total += n;
            }
        }

        debug!(reference, reads = reference_total, "Counted reference");
        *counts.references.entry(reference.to_string()).or_insert(0) += reference_total;
    }

    info!(
        path = %path.display(),
        total = counts.total(),
        "Counted reads per gene"
    );
    Ok(counts)
}

fn summarize(
    operation: &str,
    input: &Path,
    output: &Path,
    counts: StreamCounts,
    references_in: usize,
    references_out: usize,
    index: Option<&Path>,
) -> TransformSummary {
    TransformSummary {
        operation: operation.to_string(),
        input: input.display().to_string(),
        output: output.display().to_string(),
        records_in: counts.records_in,
        records_out: counts.records_out,
        records_dropped: counts.dropped(),
        references_in,
        references_out,
        exclusion_keys: None,
        index: index.map(|p| p.display().to_string()),
    }
}

fn log_summary(summary: &TransformSummary) {
    info!(
        operation = %summary.operation,
        records_in = summary.records_in,
        records_out = summary.records_out,
        records_dropped = summary.records_dropped,
        references_out = summary.references_out,
        indexed = summary.index.is_some(),
        "Finished"
    );
}
