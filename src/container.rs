//! BAM container I/O: streaming and indexed reading, staged writing and BAI
//! indexing.
//!
//! This is the only module that opens alignment files. Everything else sees
//! a header, a [`ReferenceTable`] and an iterator of records.
//!
//! ## Staging
//!
//! Output is written to a hidden temporary file next to the destination and
//! indexed there. Only when the whole pass and the index succeeded are the
//! BAM and its `.bai` renamed into place, so a failed call never leaves a
//! partial file at the path the caller asked for.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use noodles::bam;
use noodles::bam::bai;
use noodles::bgzf;
use noodles::core::{Position, Region};
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::csi::binning_index::Indexer;
use noodles::sam;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::Record as _;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::error::{Result, TransformError};
use crate::core::reference::ReferenceTable;
use crate::core::types::IndexPolicy;
use crate::parsing::sam::header_to_table;

const STAGING_PREFIX: &str = ".bam-transform-";

/// An open BAM file: its header, reference table and record stream
pub struct AlignmentSource<R> {
    reader: bam::io::Reader<R>,
    header: sam::Header,
    table: ReferenceTable,
}

impl<R: Read> AlignmentSource<R> {
    #[must_use]
    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    #[must_use]
    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Decoded records in file order
    pub fn records(&mut self) -> impl Iterator<Item = io::Result<RecordBuf>> + '_ {
        self.reader.record_bufs(&self.header)
    }
}

/// Open a BAM file for streaming and read its header
///
/// # Errors
///
/// Returns `TransformError::Io` if the file cannot be opened or its header
/// cannot be decoded, or `TransformError::InvalidHeader` if the reference
/// dictionary is unusable.
pub fn open_for_read(path: &Path) -> Result<AlignmentSource<impl Read>> {
    let mut reader = File::open(path).map(bam::io::Reader::new)?;
    let header = reader.read_header()?;
    let table = header_to_table(&header)?;

    debug!(
        path = %path.display(),
        references = table.len(),
        "Opened alignment file"
    );

    Ok(AlignmentSource {
        reader,
        header,
        table,
    })
}

/// A BAM file opened with its index for random access
pub struct IndexedSource {
    reader: bam::io::IndexedReader<bgzf::Reader<File>>,
    header: sam::Header,
    table: ReferenceTable,
}

impl IndexedSource {
    #[must_use]
    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    #[must_use]
    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Records overlapping `[start, end)` (0-based) of `reference`
    ///
    /// # Errors
    ///
    /// Returns `TransformError::Io` if the interval is empty, the reference is
    /// not in the header, or the index cannot be read.
    pub fn query(
        &mut self,
        reference: &str,
        start: usize,
        end: usize,
    ) -> Result<impl Iterator<Item = io::Result<bam::Record>> + '_> {
        let interval = match (Position::new(start + 1), Position::new(end)) {
            (Some(first), Some(last)) if first <= last => first..=last,
            _ => {
                return Err(TransformError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("empty query interval {start}-{end} on {reference}"),
                )));
            }
        };

        let region = Region::new(reference, interval);
        Ok(self.reader.query(&self.header, &region)?)
    }
}

/// Open a BAM file together with its BAI
///
/// Without an explicit `index` path the index is read from `<path>.bai`.
///
/// # Errors
///
/// Returns `TransformError::Io` if the file or its index cannot be read, or
/// `TransformError::InvalidHeader` if the reference dictionary is unusable.
pub fn open_indexed(path: &Path, index: Option<&Path>) -> Result<IndexedSource> {
    let builder = match index {
        Some(index) => bam::io::indexed_reader::Builder::default().set_index(bai::read(index)?),
        None => bam::io::indexed_reader::Builder::default(),
    };
    let mut reader = builder.build_from_path(path)?;
    let header = reader.read_header()?;
    let table = header_to_table(&header)?;

    debug!(
        path = %path.display(),
        references = table.len(),
        "Opened indexed alignment file"
    );

    Ok(IndexedSource {
        reader,
        header,
        table,
    })
}

/// Companion index path: `out.bam` → `out.bam.bai`
#[must_use]
pub fn index_path_for(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".bai");
    PathBuf::from(s)
}

/// Whether the header declares `SO:coordinate`
#[must_use]
pub fn is_coordinate_sorted(header: &sam::Header) -> bool {
    header
        .header()
        .and_then(|hd| hd.other_fields().get(&header_tag::SORT_ORDER))
        .is_some_and(|so| so == "coordinate")
}

/// Build a BAI for `path` and write it to `<path>.bai`
///
/// # Errors
///
/// Returns `TransformError::Io` if the BAM cannot be read or is not
/// coordinate-sorted, or the index cannot be written.
pub fn build_index(path: &Path) -> Result<PathBuf> {
    let index_path = index_path_for(path);
    write_index(path, &index_path)?;
    Ok(index_path)
}

type AlignmentContext = (Option<usize>, Option<Position>, Option<Position>);

fn alignment_context(record: &bam::Record) -> io::Result<AlignmentContext> {
    Ok((
        record.reference_sequence_id().transpose()?,
        record.alignment_start().transpose()?,
        record.alignment_end().transpose()?,
    ))
}

/// One pass over `bam_path`, feeding each record's chunk to the binning indexer
fn write_index(bam_path: &Path, index_path: &Path) -> Result<()> {
    let mut reader = File::open(bam_path).map(bam::io::Reader::new)?;
    let header = reader.read_header()?;

    let mut indexer = Indexer::default();
    let mut record = bam::Record::default();
    let mut start_position = reader.get_ref().virtual_position();

    while reader.read_record(&mut record)? != 0 {
        let end_position = reader.get_ref().virtual_position();
        let chunk = Chunk::new(start_position, end_position);

        let context = match alignment_context(&record)? {
            (Some(id), Some(start), Some(end)) => {
                Some((id, start, end, !record.flags().is_unmapped()))
            }
            _ => None,
        };
        indexer.add_record(context, chunk)?;

        start_position = end_position;
    }

    let index = indexer.build(header.reference_sequences().len());
    let mut writer = File::create(index_path).map(bai::io::Writer::new)?;
    writer.write_index(&index)?;
    Ok(())
}

/// An output BAM that becomes visible only on [`StagedOutput::commit`]
pub struct StagedOutput {
    destination: PathBuf,
    staged: NamedTempFile,
}

impl StagedOutput {
    /// Reserve a staging file in the destination's directory, creating the
    /// directory first if needed
    ///
    /// # Errors
    ///
    /// Returns `TransformError::Io` if the directory cannot be created or is
    /// not writable.
    pub fn new(destination: &Path) -> Result<Self> {
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".bam")
            .tempfile_in(&dir)?;

        debug!(
            destination = %destination.display(),
            staged = %staged.path().display(),
            "Staging output"
        );

        Ok(Self {
            destination: destination.to_path_buf(),
            staged,
        })
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Write `header` and every record of `records` to the staging file.
    ///
    /// Stops at the first error; the staging file is then discarded when
    /// `self` is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `records` or by encoding.
    pub fn write_all<I>(&self, header: &sam::Header, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<RecordBuf>>,
    {
        let file = self.staged.as_file().try_clone()?;
        let mut writer = bam::io::Writer::new(file);
        writer.write_header(header)?;

        let mut written = 0u64;
        for result in records {
            let record = result?;
            writer.write_alignment_record(header, &record)?;
            written += 1;
        }

        let mut bgzf_writer = writer.into_inner();
        bgzf_writer.try_finish()?;

        Ok(written)
    }

    /// Index the staged file (per `policy`) and move both into place.
    ///
    /// Returns the index path if one was written. A stale index left at the
    /// destination by an earlier run is removed when no new one is written.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::InvalidHeader` if `policy` is `Always` and the
    /// output is not coordinate-sorted, or `TransformError::Io` if indexing
    /// or renaming fails. The destination BAM is untouched in both cases.
    pub fn commit(self, header: &sam::Header, policy: IndexPolicy) -> Result<Option<PathBuf>> {
        let sorted = is_coordinate_sorted(header);
        let index_path = index_path_for(&self.destination);

        let staged_index = match (policy, sorted) {
            (IndexPolicy::Never, _) => None,
            (IndexPolicy::Always, false) => {
                return Err(TransformError::InvalidHeader(
                    "cannot index output: header does not declare SO:coordinate".to_string(),
                ));
            }
            (IndexPolicy::IfSorted, false) => {
                warn!(
                    output = %self.destination.display(),
                    "Output is not coordinate-sorted, skipping index"
                );
                None
            }
            (IndexPolicy::Always | IndexPolicy::IfSorted, true) => {
                let dir = self.staged.path().parent().unwrap_or(Path::new("."));
                let staged_index = tempfile::Builder::new()
                    .prefix(STAGING_PREFIX)
                    .suffix(".bai")
                    .tempfile_in(dir)?;
                write_index(self.staged.path(), staged_index.path())?;
                Some(staged_index)
            }
        };

        // The index goes first so the new BAM never sits next to an old index.
        let index = match staged_index {
            Some(staged_index) => {
                staged_index
                    .persist(&index_path)
                    .map_err(|e| TransformError::Io(e.error))?;
                Some(index_path)
            }
            None => {
                if index_path.exists() {
                    warn!(index = %index_path.display(), "Removing stale index");
                    std::fs::remove_file(&index_path)?;
                }
                None
            }
        };

        if let Err(e) = self.staged.persist(&self.destination) {
            if let Some(index) = &index {
                let _ = std::fs::remove_file(index);
            }
            return Err(TransformError::Io(e.error));
        }

        Ok(index)
    }
}
