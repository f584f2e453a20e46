//! Gene intervals grouped per reference, with an overlap lookup.
//!
//! Coordinates are 0-based and half-open: `[start, end)`.

use indexmap::IndexMap;

/// One interval (typically an exon) of a gene on a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneInterval {
    pub gene: String,
    pub reference: String,
    pub start: usize,
    pub end: usize,
}

impl GeneInterval {
    pub fn new(
        gene: impl Into<String>,
        reference: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            gene: gene.into(),
            reference: reference.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    gene: usize,
}

/// The genes of one reference
///
/// Spans are sorted by start; with the longest span length this bounds the
/// slice an overlap query scans.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGenes {
    gene_ids: Vec<String>,
    spans: Vec<Span>,
    longest: usize,
}

impl ReferenceGenes {
    /// Gene ids in first-seen order; gene numbers index into this
    #[must_use]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    #[must_use]
    pub fn interval_count(&self) -> usize {
        self.spans.len()
    }

    fn spans_overlapping(&self, start: usize, end: usize) -> impl Iterator<Item = &Span> + '_ {
        let first = self
            .spans
            .partition_point(|s| s.start.saturating_add(self.longest) <= start);
        let last = self.spans.partition_point(|s| s.start < end);
        self.spans[first.min(last)..last]
            .iter()
            .filter(move |s| s.end > start)
    }

    /// Gene numbers with an interval overlapping `[start, end)`.
    ///
    /// A gene with several overlapping intervals is reported once per interval.
    pub fn overlapping(&self, start: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        self.spans_overlapping(start, end).map(|s| s.gene)
    }

    /// End of the furthest-reaching interval containing `position`
    #[must_use]
    pub fn covering_end(&self, position: usize) -> Option<usize> {
        self.spans_overlapping(position, position + 1)
            .map(|s| s.end)
            .max()
    }
}

/// Gene intervals of a whole genome, in file order of their references
#[derive(Debug, Clone, Default)]
pub struct GeneModel {
    references: IndexMap<String, ReferenceGenes>,
}

impl GeneModel {
    /// Group `intervals` per reference and build the lookup
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty or inverted interval.
    pub fn new(intervals: impl IntoIterator<Item = GeneInterval>) -> Result<Self, String> {
        let mut references: IndexMap<String, (ReferenceGenes, IndexMap<String, usize>)> =
            IndexMap::new();

        for interval in intervals {
            if interval.start >= interval.end {
                return Err(format!(
                    "empty interval {}-{} for gene '{}' on '{}'",
                    interval.start, interval.end, interval.gene, interval.reference
                ));
            }

            let (genes, numbers) = references.entry(interval.reference).or_default();
            let gene = match numbers.get(&interval.gene) {
                Some(&n) => n,
                None => {
                    let n = genes.gene_ids.len();
                    genes.gene_ids.push(interval.gene.clone());
                    numbers.insert(interval.gene, n);
                    n
                }
            };
            genes.longest = genes.longest.max(interval.end - interval.start);
            genes.spans.push(Span {
                start: interval.start,
                end: interval.end,
                gene,
            });
        }

        let references = references
            .into_iter()
            .map(|(name, (mut genes, _))| {
                genes.spans.sort_by_key(|s| (s.start, s.end));
                (name, genes)
            })
            .collect();

        Ok(Self { references })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&ReferenceGenes> {
        self.references.get(reference)
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &ReferenceGenes)> {
        self.references.iter().map(|(name, genes)| (name.as_str(), genes))
    }

    /// Number of distinct (reference, gene) pairs
    #[must_use]
    pub fn gene_count(&self) -> usize {
        self.references.values().map(|g| g.gene_ids.len()).sum()
    }
}
