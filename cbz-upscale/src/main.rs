#![deny(clippy::pedantic)]

use anyhow::{bail, Result};
use camino::Utf8PathBuf;
use cbz::{
    image::PageFormat,
    signature::{detect, ArchiveKind},
};
use cbz_tools::{
    batch::Batch,
    external::{self, UNRAR},
    inputs,
    logging::{self, Verbosity},
    output::{OutputLayout, UPSCALED_DIR},
};
use clap::Parser;
use tracing::{debug, info};

use crate::{
    realesrgan::{cache_dir, Model, RealEsrgan, UpscaleOptions},
    upscaler::Upscaler,
};

mod download;
mod realesrgan;
mod upscaler;

static INPUT_EXTENSIONS: [&str; 4] = ["cbz", "zip", "cbr", "rar"];

/// Upscales the pages of comic archives with Real-ESRGAN
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, directories, or glob patterns to upscale
    #[clap(required = true)]
    inputs: Vec<String>,
    /// Output directory, defaults to an `upscaled` directory next to each input
    #[clap(long, short)]
    outdir: Option<Utf8PathBuf>,
    /// Replace existing output files
    #[clap(long, action)]
    overwrite: bool,
    /// Look for inputs in sub directories too
    #[clap(long, short, action)]
    recursive: bool,
    /// Real-ESRGAN model
    #[clap(long, short, value_enum, default_value_t = Model::RealesrganX4plusAnime)]
    model: Model,
    /// Upscale ratio, the x4plus models only support 4
    #[clap(long, short, default_value_t = 4, value_parser = clap::value_parser!(u8).range(2..=4))]
    scale: u8,
    /// Format of the upscaled pages
    #[clap(long, short, value_enum, default_value_t = PageFormat::Jpg)]
    format: PageFormat,
    /// Scale the upscaled pages down to this height, in pixels
    #[clap(long, value_name = "PX")]
    max_height: Option<u32>,
    /// GPU device(s) to use, e.g. `0` or `0,1`
    #[clap(long, value_name = "ID")]
    gpu: Option<String>,
    /// Tile size, smaller tiles use less GPU memory
    #[clap(long, value_name = "SIZE")]
    tile: Option<u32>,
    /// Path to the realesrgan-ncnn-vulkan binary
    #[clap(long, env = "REALESRGAN_PATH")]
    realesrgan: Option<Utf8PathBuf>,
    /// Download Real-ESRGAN when it can't be found
    #[clap(long, action)]
    download: bool,
    /// Path to the unrar binary
    #[clap(long, env = "CBZ_UNRAR")]
    unrar: Option<Utf8PathBuf>,
    #[command(flatten)]
    verbosity: Verbosity,
}

fn locate_realesrgan(explicit: Option<Utf8PathBuf>, download: bool) -> Result<RealEsrgan> {
    let cache = cache_dir();

    if let Some(realesrgan) = RealEsrgan::resolve(explicit, cache.as_deref()) {
        external::require([realesrgan.tool()])?;
        return Ok(realesrgan);
    }

    match cache {
        Some(cache) if download => {
            info!("Real-ESRGAN not found, downloading it to {cache}");
            Ok(RealEsrgan::from_binary(download::install(&cache)?))
        }
        Some(cache) => bail!(
            "realesrgan-ncnn-vulkan not found in PATH or in {cache}, pass its path with --realesrgan or fetch it with --download"
        ),
        None => bail!("realesrgan-ncnn-vulkan not found in PATH, pass its path with --realesrgan"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbosity);

    if !args.model.supports_scale(args.scale) {
        bail!("{} only supports a x4 upscale", args.model);
    }

    let inputs = inputs::collect(&args.inputs, &INPUT_EXTENSIONS, args.recursive)?;

    let realesrgan = locate_realesrgan(args.realesrgan, args.download)?;
    let unrar = UNRAR.clone().maybe_at(args.unrar);
    if inputs
        .iter()
        .any(|input| matches!(detect(input), Ok(ArchiveKind::Rar)))
    {
        external::require([&unrar])?;
    }
    debug!("all dependencies found");

    let upscaler = Upscaler {
        layout: OutputLayout::new(args.outdir, UPSCALED_DIR).overwrite(args.overwrite),
        realesrgan,
        options: UpscaleOptions {
            model: args.model,
            scale: args.scale,
            format: args.format,
            gpu: args.gpu,
            tile: args.tile,
        },
        unrar,
        max_height: args.max_height,
    };

    Batch::new()
        .hide_progress(args.verbosity.is_quiet())
        .run(&inputs, |input| upscaler.upscale(input))
        .into_result()?;

    Ok(())
}
