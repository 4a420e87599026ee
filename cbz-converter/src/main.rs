#![deny(clippy::pedantic)]

use anyhow::Result;
use camino::Utf8PathBuf;
use cbz::{
    junk::JunkFilter,
    signature::{detect, ArchiveKind},
};
use cbz_tools::{
    batch::Batch,
    external::{self, PDFIMAGES, UNRAR},
    inputs,
    logging::{self, Verbosity},
    output::{OutputLayout, CONVERTED_DIR},
};
use clap::Parser;
use tracing::debug;

use crate::convert::{Converter, PdfExtractor};

mod convert;
mod pdf;

static INPUT_EXTENSIONS: [&str; 6] = ["cbr", "cbz", "cb7", "pdf", "rar", "zip"];

/// Converts cbr and pdf files (and mislabeled archives) to cbz
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, directories, or glob patterns to convert
    #[clap(required = true)]
    inputs: Vec<String>,
    /// Output directory, defaults to a `converted` directory next to each input
    #[clap(long, short)]
    outdir: Option<Utf8PathBuf>,
    /// Replace existing output files
    #[clap(long, action)]
    overwrite: bool,
    /// Look for inputs in sub directories too
    #[clap(long, short, action)]
    recursive: bool,
    /// Drop metadata junk (__MACOSX, .DS_Store, Thumbs.db...) while converting
    #[clap(long, action)]
    clean: bool,
    /// How images are extracted from pdf files
    #[clap(long, value_enum, default_value_t = PdfExtractor::Native)]
    pdf_extractor: PdfExtractor,
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

    let converter = Converter {
        layout: OutputLayout::new(args.outdir, CONVERTED_DIR).overwrite(args.overwrite),
        filter: args.clean.then(JunkFilter::new),
        pdf_extractor: args.pdf_extractor,
        unrar: UNRAR.clone().maybe_at(args.unrar),
        pdfimages: PDFIMAGES.clone(),
    };

    // Fail before touching anything when a required program is missing
    let kinds = inputs
        .iter()
        .filter_map(|input| detect(input).ok())
        .collect::<Vec<_>>();
    let mut required = Vec::new();
    if kinds.contains(&ArchiveKind::Rar) {
        required.push(&converter.unrar);
    }
    if converter.pdf_extractor == PdfExtractor::Pdfimages && kinds.contains(&ArchiveKind::Pdf) {
        required.push(&converter.pdfimages);
    }
    external::require(required)?;
    debug!("all dependencies found");

    Batch::new()
        .hide_progress(args.verbosity.is_quiet())
        .run(&inputs, |input| converter.convert(input))
        .into_result()?;

    Ok(())
}
