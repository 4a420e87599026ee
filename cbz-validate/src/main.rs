#![deny(clippy::pedantic)]

use anyhow::Result;
use camino::Utf8PathBuf;
use cbz_tools::{
    batch::{Batch, Outcome},
    external::{self, UNRAR},
    inputs,
    logging::{self, Verbosity},
};
use clap::Parser;
use cli_table::{print_stdout, WithTitle};

use crate::validator::Validator;

mod report;
mod validator;

static INPUT_EXTENSIONS: [&str; 6] = ["cbr", "cbz", "cb7", "pdf", "rar", "zip"];

/// Checks that comic archives carry the right extension and can be read
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, directories, or glob patterns to validate
    #[clap(required = true)]
    inputs: Vec<String>,
    /// Look for inputs in sub directories too
    #[clap(long, short, action)]
    recursive: bool,
    /// Decode every page, slower but catches broken images
    #[clap(long, action)]
    deep: bool,
    /// Rename mislabeled files to the extension matching their content, existing files are never replaced
    #[clap(long, action)]
    fix: bool,
    /// Test rar archives with `unrar t`
    #[clap(long, action)]
    test_rar: bool,
    /// Path to the unrar binary
    #[clap(long, env = "CBZ_UNRAR")]
    unrar: Option<Utf8PathBuf>,
    #[command(flatten)]
    verbosity: Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbosity);

    let inputs = inputs::collect(&args.inputs, &INPUT_EXTENSIONS, args.recursive)?;

    let unrar = if args.test_rar {
        let unrar = UNRAR.clone().maybe_at(args.unrar);
        external::require([&unrar])?;
        Some(unrar)
    } else {
        None
    };

    let validator = Validator {
        deep: args.deep,
        fix: args.fix,
        unrar,
    };

    let mut rows = Vec::with_capacity(inputs.len());
    let report = Batch::new()
        .hide_progress(args.verbosity.is_quiet())
        .run(&inputs, |input| {
            let row = validator.validate(input);
            let outcome = if row.is_ok() {
                Ok(Outcome::Done(row.summary()))
            } else {
                Err(row.summary())
            };
            rows.push(row);
            outcome
        });

    print_stdout(rows.with_title())?;
    report.into_result()?;

    Ok(())
}
