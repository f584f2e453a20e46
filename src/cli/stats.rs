use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::types::{ReferenceCount, ReferenceCounts};
use crate::ops::count_references;

#[derive(Args)]
pub struct StatsArgs {
    /// Input BAM file
    #[arg(required = true)]
    pub input: PathBuf,

    /// Also list references without records
    #[arg(long)]
    pub all: bool,
}

pub fn run(args: StatsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let counts = count_references(&args.input)?;

    if verbose {
        eprintln!(
            "{}: {} references, {} records",
            args.input.display(),
            counts.references.len(),
            counts.total()
        );
    }

    match format {
        OutputFormat::Text => print_text_stats(&args, &counts),
        OutputFormat::Json => print_json_stats(&args, &counts)?,
        OutputFormat::Tsv => print_tsv_stats(&args, &counts),
    }

    Ok(())
}

/// References to report: all of them with `--all`, else those with records
fn listed(all: bool, counts: &ReferenceCounts) -> impl Iterator<Item = &ReferenceCount> {
    counts
        .references
        .iter()
        .filter(move |r| all || r.mapped + r.unmapped > 0)
}

fn print_text_stats(args: &StatsArgs, counts: &ReferenceCounts) {
    println!("Reference Statistics");
    println!("{}", "=".repeat(60));
    println!("\nFile: {}", args.input.display());
    println!("  References declared: {}", counts.references.len());
    println!("  Total records: {}", counts.total());
    println!("  Unplaced unmapped: {}", counts.unplaced_unmapped);

    println!("\n{:<24} {:>12} {:>12} {:>12}", "Reference", "Length", "Mapped", "Unmapped");
    for r in listed(args.all, counts) {
        println!(
            "{:<24} {:>12} {:>12} {:>12}",
            r.name, r.length, r.mapped, r.unmapped
        );
    }
}

fn print_json_stats(args: &StatsArgs, counts: &ReferenceCounts) -> anyhow::Result<()> {
    let references: Vec<_> = listed(args.all, counts).collect();
    let output = serde_json::json!({
        "input": args.input.display().to_string(),
        "total": counts.total(),
        "unplaced_unmapped": counts.unplaced_unmapped,
        "references": references,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_stats(args: &StatsArgs, counts: &ReferenceCounts) {
    println!("reference\tlength\tmapped\tunmapped");
    for r in listed(args.all, counts) {
        println!("{}\t{}\t{}\t{}", r.name, r.length, r.mapped, r.unmapped);
    }
    println!("*\t0\t0\t{}", counts.unplaced_unmapped);
}
