#![deny(clippy::pedantic)]

use anyhow::Result;
use camino::Utf8PathBuf;
use cbz::junk::JunkFilter;
use cbz_tools::{
    batch::Batch,
    inputs,
    logging::{self, Verbosity},
    output::{OutputLayout, CLEANED_DIR},
};
use clap::Parser;

use crate::cleaner::Cleaner;

mod cleaner;

static INPUT_EXTENSIONS: [&str; 2] = ["cbz", "zip"];

/// Removes metadata junk (__MACOSX, .DS_Store, Thumbs.db...) from cbz archives
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, directories, or glob patterns to clean
    #[clap(required = true)]
    inputs: Vec<String>,
    /// Output directory, defaults to a `cleaned` directory next to each input
    #[clap(long, short, conflicts_with = "in_place")]
    outdir: Option<Utf8PathBuf>,
    /// Replace existing output files
    #[clap(long, action)]
    overwrite: bool,
    /// Look for inputs in sub directories too
    #[clap(long, short, action)]
    recursive: bool,
    /// Rewrite the archives in place instead of writing a cleaned copy
    #[clap(long, action)]
    in_place: bool,
    /// Also remove the entries matching this glob, can be repeated
    #[clap(long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,
    /// Also remove ComicInfo.xml
    #[clap(long, action)]
    comicinfo: bool,
    /// Only list the junk, nothing is written
    #[clap(long, action)]
    dry_run: bool,
    #[command(flatten)]
    verbosity: Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbosity);

    let filter = JunkFilter::new()
        .with_patterns(&args.excludes)?
        .remove_comic_info(args.comicinfo);

    let inputs = inputs::collect(&args.inputs, &INPUT_EXTENSIONS, args.recursive)?;

    let cleaner = Cleaner {
        layout: OutputLayout::new(args.outdir, CLEANED_DIR).overwrite(args.overwrite),
        filter,
        in_place: args.in_place,
        dry_run: args.dry_run,
    };

    Batch::new()
        .hide_progress(args.verbosity.is_quiet())
        .run(&inputs, |input| cleaner.clean(input))
        .into_result()?;

    Ok(())
}
