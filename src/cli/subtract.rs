use std::path::PathBuf;

use clap::Args;

use crate::cli::{print_outcome, OutputArgs, OutputFormat};
use crate::core::types::{IdentityMode, TransformOptions};
use crate::ops::subtract_files;

#[derive(Args)]
pub struct SubtractArgs {
    /// BAM file to remove records from
    #[arg(required = true)]
    pub input: PathBuf,

    /// BAM file whose records are removed
    #[arg(required = true)]
    pub exclude: PathBuf,

    /// Output BAM file
    #[arg(required = true)]
    pub output: PathBuf,

    /// Record fields that decide whether two records are the same
    #[arg(long, value_enum, default_value = "name-flags-position")]
    pub identity: IdentityMode,

    #[command(flatten)]
    pub out: OutputArgs,
}

pub fn run(args: SubtractArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let options = TransformOptions {
        index: args.out.index,
        identity: args.identity,
    };
    if verbose {
        eprintln!("Record identity: {}", options.identity);
    }

    let unit = args
        .out
        .unit(
            "subtract",
            &[args.input.as_path(), args.exclude.as_path()],
            &args.output,
        )?
        .param("options", &options)?;

    let outcome = unit.run(&*args.out.policy(), || {
        subtract_files(&args.input, &args.exclude, &args.output, &options)
    })?;

    print_outcome(&outcome, &args.output, format)
}
