use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_outcome, MapArgs, OutputArgs, OutputFormat};
use crate::core::types::TransformOptions;
use crate::ops::rename_references;

#[derive(Args)]
pub struct RenameArgs {
    /// Input BAM file
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

pub fn run(args: RenameArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let substitution = args.map.load()?;
    if verbose {
        eprintln!("Loaded {} substitutions", substitution.len());
    }

    let options = TransformOptions {
        index: args.out.index,
        ..TransformOptions::default()
    };

    let unit = args
        .out
        .unit("rename", &[args.input.as_path()], &args.output)?
        .param("map", &substitution)?
        .param("options", &options)?;

    let outcome = unit.run(&*args.out.policy(), || {
        rename_references(&args.input, &args.output, &substitution, &options)
    })?;

    print_outcome(&outcome, &args.output, format)
}
