use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::types::GeneCounts;
use crate::ops::count_gene_reads;
use crate::parsing::genes::parse_gene_file;

#[derive(Args)]
pub struct CountArgs {
    /// Coordinate-sorted, indexed BAM file
    #[arg(required = true)]
    pub input: PathBuf,

    /// Gene intervals: gene<TAB>reference<TAB>start<TAB>end, 0-based, end exclusive
    #[arg(short, long, required = true)]
    pub genes: PathBuf,

    /// BAI index (default: <input>.bai)
    #[arg(long)]
    pub index: Option<PathBuf>,
}

pub fn run(args: CountArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let genes = parse_gene_file(&args.genes)?;
    if genes.is_empty() {
        anyhow::bail!("No gene intervals in {}", args.genes.display());
    }
    if verbose {
        eprintln!(
            "Counting {} genes on {} references",
            genes.gene_count(),
            genes.references().count()
        );
    }

    let counts = count_gene_reads(&args.input, args.index.as_deref(), &genes)?;

    match format {
        OutputFormat::Text => print_text_counts(&args, &counts),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&counts.to_flat())?);
        }
        OutputFormat::Tsv => {
            println!("gene\tcount");
            for (gene, count) in counts.to_flat() {
                println!("{gene}\t{count}");
            }
        }
    }

    Ok(())
}

fn print_text_counts(args: &CountArgs, counts: &GeneCounts) {
    println!("Gene Read Counts");
    println!("{}", "=".repeat(60));
    println!("\nFile: {}", args.input.display());
    println!("  Genes: {}", counts.genes.len());
    println!("  Total: {}", counts.total());
    for (reference, count) in &counts.references {
        println!("  {reference}: {count}");
    }

    println!("\n{:<32} {:>12}", "Gene", "Reads");
    for (gene, count) in &counts.genes {
        println!("{gene:<32} {count:>12}");
    }
}
