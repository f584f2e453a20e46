//! Command-line interface for bam-transform.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **rename**: Rename every reference in the header and records
//! - **filter**: Keep records on the listed references, renaming them
//! - **subtract**: Remove the records of one file from another
//! - **stats**: Count records per reference
//! - **count**: Count reads per gene through the index
//!
//! ## Usage
//!
//! ```text
//! # Rename with inline pairs
//! bam-transform rename in.bam out.bam --map chr1=1 --map chr2=2
//!
//! # Keep only chr2, renamed, using a JSON map ({"chr2": "sha"})
//! bam-transform filter in.bam out.bam --map-file keep.json
//!
//! # Records of full.bam that are not in subset.bam
//! bam-transform subtract full.bam subset.bam rest.bam
//!
//! # Reads per gene, with _total and _<reference> sums
//! bam-transform --format tsv count in.bam --genes genes.tsv
//!
//! # Skip the work when out.bam is current, JSON report
//! bam-transform rename in.bam out.bam -m map.tsv --stamp --format json
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::container::{index_path_for, is_coordinate_sorted, open_for_read};
use crate::core::substitution::SubstitutionMap;
use crate::core::types::{IndexPolicy, TransformSummary};
use crate::job::{AlwaysRun, BuildUnit, InvalidationPolicy, Outcome, StampPolicy};
use crate::parsing::substitution::{parse_cli_pairs, parse_map_file};

pub mod count;
pub mod filter;
pub mod rename;
pub mod stats;
pub mod subtract;

#[derive(Parser)]
#[command(name = "bam-transform")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Rename, filter and subtract the records of BAM files")]
#[command(
    long_about = "bam-transform rewrites coordinate-sorted BAM files without touching record contents.\n\nIt can:\n- Rename reference sequences consistently in the header and every record\n- Keep only the records on selected references, renaming those references\n- Remove from one file every record that also occurs in another\n- Count reads per gene through the BAI index\n\nOutputs are written atomically and re-indexed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename every reference sequence
    Rename(rename::RenameArgs),

    /// Keep only records on mapped references, renaming them
    Filter(filter::FilterArgs),

    /// Remove the records of one file from another
    Subtract(subtract::SubtractArgs),

    /// Count records per reference sequence
    Stats(stats::StatsArgs),

    /// Count reads per gene in an indexed BAM
    Count(count::CountArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Where the substitution map comes from
#[derive(Args, Debug)]
pub struct MapArgs {
    /// Substitution map file: JSON object (`null` drops) or two-column TSV
    #[arg(short = 'm', long)]
    pub map_file: Option<PathBuf>,

    /// Rename OLD to NEW (repeatable)
    #[arg(long = "map", value_name = "OLD=NEW")]
    pub map: Vec<String>,

    /// Drop reference OLD and its records (repeatable)
    #[arg(long = "drop", value_name = "OLD")]
    pub drop: Vec<String>,
}

impl MapArgs {
    /// Merge the map file and inline pairs into one map
    pub fn load(&self) -> anyhow::Result<SubstitutionMap> {
        let inline = parse_cli_pairs(&self.map, &self.drop)?;
        let map = match &self.map_file {
            Some(path) => {
                let file = parse_map_file(path)?;
                SubstitutionMap::new(
                    file.iter()
                        .chain(inline.iter())
                        .map(|(source, target)| (source.to_string(), target.clone())),
                )?
            }
            None => inline,
        };

        if map.is_empty() {
            anyhow::bail!("No substitutions given: use --map-file, --map or --drop");
        }
        Ok(map)
    }
}

/// Output handling shared by the commands that write a BAM
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// When to write a BAI index next to the output
    #[arg(long, value_enum, default_value = "if-sorted")]
    pub index: IndexPolicy,

    /// Skip the work if the output's stamp file shows it is up to date
    #[arg(long)]
    pub stamp: bool,
}

impl OutputArgs {
    /// The build unit for an operation writing `output` from `inputs`
    ///
    /// The output takes the first input's header, so its sort order decides
    /// whether the index is one of the declared outputs.
    pub fn unit(&self, name: &str, inputs: &[&Path], output: &Path) -> anyhow::Result<BuildUnit> {
        let unit = inputs
            .iter()
            .fold(BuildUnit::new(name), |unit, input| unit.input(*input))
            .output(output);

        let indexed = match (self.index, inputs.first()) {
            (IndexPolicy::Never, _) | (_, None) => false,
            (IndexPolicy::Always, _) => true,
            (IndexPolicy::IfSorted, Some(source)) => {
                is_coordinate_sorted(open_for_read(source)?.header())
            }
        };

        Ok(if indexed {
            unit.output(index_path_for(output))
        } else {
            unit
        })
    }

    pub fn policy(&self) -> Box<dyn InvalidationPolicy> {
        if self.stamp {
            Box::new(StampPolicy)
        } else {
            Box::new(AlwaysRun)
        }
    }
}

/// Print the result of a file-level operation
pub fn print_outcome(outcome: &Outcome<TransformSummary>, output: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match (outcome, format) {
        (Outcome::UpToDate, OutputFormat::Json) => {
            let json = serde_json::json!({
                "output": output.display().to_string(),
                "up_to_date": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        (Outcome::UpToDate, _) => {
            println!("{} is up to date", output.display());
        }
        (Outcome::Built(summary), OutputFormat::Text) => print_text_summary(summary),
        (Outcome::Built(summary), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        (Outcome::Built(summary), OutputFormat::Tsv) => print_tsv_summary(summary),
    }
    Ok(())
}

fn print_text_summary(summary: &TransformSummary) {
    println!("{} finished", summary.operation);
    println!("{}", "=".repeat(60));
    println!("  Input:  {}", summary.input);
    println!("  Output: {}", summary.output);
    println!(
        "  References: {} -> {}",
        summary.references_in, summary.references_out
    );
    println!("  Records read:    {}", summary.records_in);
    println!("  Records written: {}", summary.records_out);
    println!("  Records dropped: {}", summary.records_dropped);
    if let Some(keys) = summary.exclusion_keys {
        println!("  Exclusion keys:  {keys}");
    }
    match &summary.index {
        Some(index) => println!("  Index: {index}"),
        None => println!("  Index: not written"),
    }
}

fn print_tsv_summary(summary: &TransformSummary) {
    println!("operation\tinput\toutput\trecords_in\trecords_out\trecords_dropped\treferences_in\treferences_out\tindex");
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        summary.operation,
        summary.input,
        summary.output,
        summary.records_in,
        summary.records_out,
        summary.records_dropped,
        summary.references_in,
        summary.references_out,
        summary.index.as_deref().unwrap_or("-"),
    );
}
