//! Unstranded gene read counting over an indexed BAM.
//!
//! Each reference with genes is cut into chunks of about [`CHUNK_SIZE`]
//! bases whose boundaries never fall inside a gene interval. A chunk is
//! fetched through the index and every aligned block is counted in the chunk
//! where it starts.
//!
//! Within a chunk a read counts once per gene it hits, however many of its
//! blocks land in that gene. Reads with `NH` above 1 are counted once per
//! distinct query name instead, so a multimapper placed twice in one gene
//! counts once.

use std::collections::{HashMap, HashSet};
use std::io;

use noodles::bam;
use noodles::sam::alignment::record::cigar::op::{Kind, Op};
use noodles::sam::alignment::record::data::field::Tag;

use crate::core::genes::ReferenceGenes;

/// Target chunk length in bases
pub const CHUNK_SIZE: usize = 1_000_000;

/// `[start, stop)` of one reference, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomeChunk {
    pub start: usize,
    pub stop: usize,
}

/// Cut `[0, length)` into chunks of at least `size` bases.
///
/// A boundary that would fall inside a gene interval is pushed one base past
/// the interval's end, repeatedly, so no interval is split. The last chunk
/// may reach past `length`.
#[must_use]
pub fn chunk_reference(genes: &ReferenceGenes, length: usize, size: usize) -> Vec<GenomeChunk> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < length {
        let mut stop = start + size;
        while let Some(end) = genes.covering_end(stop) {
            stop = end + 1;
        }
        chunks.push(GenomeChunk { start, stop });
        start = stop;
    }

    chunks
}

/// Reference blocks `[start, end)` covered by aligned bases (`M`, `=`, `X`).
///
/// Deletions and skipped regions separate blocks; insertions, clips and
/// padding do not move along the reference.
///
/// # Errors
///
/// Returns the first CIGAR decoding error.
pub fn aligned_blocks<I>(alignment_start: usize, ops: I) -> io::Result<Vec<(usize, usize)>>
where
    I: IntoIterator<Item = io::Result<Op>>,
{
    let mut position = alignment_start;
    let mut blocks = Vec::new();

    for op in ops {
        let op = op?;
        let len = op.len();
        match op.kind() {
            Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                if len > 0 {
                    blocks.push((position, position + len));
                }
                position += len;
            }
            Kind::Deletion | Kind::Skip => position += len,
            Kind::Insertion | Kind::SoftClip | Kind::HardClip | Kind::Pad => {}
        }
    }

    Ok(blocks)
}

/// The parts of an alignment that counting looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedRead {
    pub name: Vec<u8>,
    /// `NH`, or 1 when the tag is absent
    pub hits: i64,
    pub blocks: Vec<(usize, usize)>,
}

impl CountedRead {
    /// Extract from a BAM record; `None` when it has no alignment start
    ///
    /// # Errors
    ///
    /// Returns decoding errors of the position, CIGAR or data fields.
    pub fn from_record(record: &bam::Record) -> io::Result<Option<Self>> {
        let Some(start) = record.alignment_start().transpose()? else {
            return Ok(None);
        };

        let blocks = aligned_blocks(usize::from(start) - 1, record.cigar().iter())?;
        let hits = match record.data().get(&Tag::ALIGNMENT_HIT_COUNT).transpose()? {
            Some(value) => value.as_int().unwrap_or(1),
            None => 1,
        };
        let name = record.name().map(|n| n.to_vec()).unwrap_or_default();

        Ok(Some(Self { name, hits, blocks }))
    }
}

/// Gene counts for the reads of one chunk
pub struct ChunkCounter<'g> {
    genes: &'g ReferenceGenes,
    chunk: GenomeChunk,
    unique: Vec<u64>,
    multimappers: HashMap<usize, HashSet<Vec<u8>>>,
    seen: HashSet<usize>,
}

impl<'g> ChunkCounter<'g> {
    #[must_use]
    pub fn new(genes: &'g ReferenceGenes, chunk: GenomeChunk) -> Self {
        Self {
            genes,
            chunk,
            unique: vec![0; genes.gene_ids().len()],
            multimappers: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub fn add(&mut self, read: &CountedRead) {
        let genes = self.genes;
        self.seen.clear();

        for &(start, end) in &read.blocks {
            if start < self.chunk.start || start >= self.chunk.stop {
                continue;
            }
            for gene in genes.overlapping(start, end) {
                if read.hits == 1 {
                    self.seen.insert(gene);
                } else {
                    self.multimappers
                        .entry(gene)
                        .or_default()
                        .insert(read.name.clone());
                }
            }
        }

        for &gene in &self.seen {
            self.unique[gene] += 1;
        }
    }

    /// Counts indexed by gene number
    #[must_use]
    pub fn finish(self) -> Vec<u64> {
        let mut counts = self.unique;
        for (gene, names) in self.multimappers {
            counts[gene] += names.len() as u64;
        }
        counts
    }
}
