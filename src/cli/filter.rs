use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_outcome, MapArgs, OutputArgs, OutputFormat};
use crate::core::types::TransformOptions;
use crate::ops::filter_and_rename;

#[derive(Args)]
pub struct FilterArgs {
    /// Input BAM file; records on references the map does not rename are dropped
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output BAM file
    #[arg(required = true)]
    pub output: PathBuf,

    #[command(flatten)]
    pub map: MapArgs,

    #[command(flatten)]
    pub out: OutputArgs,
}

pub fn run(args: FilterArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let substitution = args.map.load()?;
    if verbose {
        let kept = substitution
            .iter()
            .filter(|(_, target)| target.new_name().is_some())
            .count();
        eprintln!(
            "Keeping {kept} references, dropping every other reference and its records"
        );
    }

    let options = TransformOptions {
        index: args.out.index,
        ..TransformOptions::default()
    };

    let unit = args
        .out
        .unit("filter", &[args.input.as_path()], &args.output)?
        .param("map", &substitution)?
        .param("options", &options)?;

    let outcome = unit.run(&*args.out.policy(), || {
        filter_and_rename(&args.input, &args.output, &substitution, &options)
    })?;

    print_outcome(&outcome, &args.output, format)
}
