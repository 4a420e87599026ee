//! Real-ESRGAN ncnn Vulkan invocation and binary lookup.

use std::{fmt::Display, fs};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use cbz::image::PageFormat;
use cbz_tools::external::{Tool, REALESRGAN};
use clap::ValueEnum;
use tracing::debug;

/// Directory, relative to the home directory, where downloaded binaries are kept
pub static CACHE_DIR: &str = ".cbz-tools/realesrgan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Model {
    #[value(name = "realesrgan-x4plus")]
    RealesrganX4plus,
    #[value(name = "realesrgan-x4plus-anime")]
    RealesrganX4plusAnime,
    #[value(name = "realesr-animevideov3")]
    RealesrAnimevideov3,
}

impl Model {
    pub fn name(self) -> &'static str {
        match self {
            Self::RealesrganX4plus => "realesrgan-x4plus",
            Self::RealesrganX4plusAnime => "realesrgan-x4plus-anime",
            Self::RealesrAnimevideov3 => "realesr-animevideov3",
        }
    }

    /// The x4plus models only ship weights for a x4 upscale
    pub fn supports_scale(self, scale: u8) -> bool {
        match self {
            Self::RealesrganX4plus | Self::RealesrganX4plusAnime => scale == 4,
            Self::RealesrAnimevideov3 => (2..=4).contains(&scale),
        }
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleOptions {
    pub model: Model,
    pub scale: u8,
    pub format: PageFormat,
    pub gpu: Option<String>,
    pub tile: Option<u32>,
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self {
            model: Model::RealesrganX4plusAnime,
            scale: 4,
            format: PageFormat::Jpg,
            gpu: None,
            tile: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealEsrgan {
    tool: Tool,
    models_dir: Option<Utf8PathBuf>,
}

impl RealEsrgan {
    /// Uses `binary`, along with the `models` directory sitting next to it when there is one
    pub fn from_binary(binary: Utf8PathBuf) -> Self {
        let models_dir = binary
            .parent()
            .map(|dir| dir.join("models"))
            .filter(|dir| dir.is_dir());

        Self {
            tool: REALESRGAN.clone().at(binary),
            models_dir,
        }
    }

    /// Looks for the binary: `explicit` first, then `PATH`, then the `cache` directory
    pub fn resolve(explicit: Option<Utf8PathBuf>, cache: Option<&Utf8Path>) -> Option<Self> {
        if let Some(binary) = explicit {
            return Some(Self::from_binary(binary));
        }

        if let Ok(binary) = REALESRGAN.locate() {
            return Some(Self::from_binary(binary));
        }

        cache.and_then(find_binary).map(Self::from_binary)
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn args(&self, input: &Utf8Path, output: &Utf8Path, options: &UpscaleOptions) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            input.to_string(),
            "-o".to_string(),
            output.to_string(),
            "-n".to_string(),
            options.model.name().to_string(),
            "-s".to_string(),
            options.scale.to_string(),
            "-f".to_string(),
            options.format.extension().to_string(),
        ];
        if let Some(models_dir) = &self.models_dir {
            args.extend(["-m".to_string(), models_dir.to_string()]);
        }
        if let Some(gpu) = &options.gpu {
            args.extend(["-g".to_string(), gpu.clone()]);
        }
        if let Some(tile) = options.tile {
            args.extend(["-t".to_string(), tile.to_string()]);
        }

        args
    }

    /// Upscales every image of the `input` directory into the `output` directory
    pub fn upscale(&self, input: &Utf8Path, output: &Utf8Path, options: &UpscaleOptions) -> Result<()> {
        self.tool.run(self.args(input, output, options))?;
        Ok(())
    }
}

/// `~/.cbz-tools/realesrgan`
pub fn cache_dir() -> Option<Utf8PathBuf> {
    let home = home::home_dir()?;
    Utf8PathBuf::from_path_buf(home)
        .ok()
        .map(|home| home.join(CACHE_DIR))
}

pub fn binary_name() -> String {
    if cfg!(windows) {
        format!("{}.exe", REALESRGAN.program())
    } else {
        REALESRGAN.program().to_string()
    }
}

/// Searches `dir` and its sub directories for the Real-ESRGAN binary
pub fn find_binary(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let name = binary_name();
    let mut pending = vec![dir.to_owned()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.is_dir() {
                pending.push(path);
            } else if path.file_name() == Some(name.as_str()) {
                debug!("found {path}");
                return Some(path);
            }
        }
    }

    None
}
