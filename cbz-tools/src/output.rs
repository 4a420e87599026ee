use std::{fs, io::Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{Error, Result};

pub const CONVERTED_DIR: &str = "converted";
pub const CLEANED_DIR: &str = "cleaned";
pub const UPSCALED_DIR: &str = "upscaled";

/// Directories produced by the tools, never scanned for inputs
pub static OUTPUT_DIR_NAMES: [&str; 3] = [CONVERTED_DIR, CLEANED_DIR, UPSCALED_DIR];

/// Where a tool writes its results: `--outdir` when provided, a `default_dir` next to each input otherwise
#[derive(Debug, Clone)]
pub struct OutputLayout {
    outdir: Option<Utf8PathBuf>,
    default_dir: &'static str,
    overwrite: bool,
}

impl OutputLayout {
    #[must_use]
    pub fn new(outdir: Option<Utf8PathBuf>, default_dir: &'static str) -> Self {
        Self {
            outdir,
            default_dir,
            overwrite: false,
        }
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn dir_for(&self, input: &Utf8Path) -> Utf8PathBuf {
        match &self.outdir {
            Some(outdir) => outdir.clone(),
            None => input
                .parent()
                .unwrap_or_else(|| Utf8Path::new(""))
                .join(self.default_dir),
        }
    }

    /// Creates the output directory and returns `<dir>/<input stem>.<extension>`.
    /// Returns `None` when the file already exists and overwriting is disabled.
    ///
    /// ## Errors
    ///
    /// Fails if the input has no file name or if the directory can't be created
    pub fn target(&self, input: &Utf8Path, extension: &str) -> Result<Option<Utf8PathBuf>> {
        let dir = self.dir_for(input);
        let target = dir.join(output_file_name(input, extension)?);

        if target.exists() && !self.overwrite {
            warn!("{target} already exists, use --overwrite to replace it");
            return Ok(None);
        }

        fs::create_dir_all(&dir)?;
        debug!("output path {target}");

        Ok(Some(target))
    }
}

/// `<input stem>.<extension>`, sanitized so it can be written on any file system
///
/// ## Errors
///
/// Fails if the input has no file stem
pub fn output_file_name(input: &Utf8Path, extension: &str) -> Result<String> {
    let Some(stem) = input.file_stem().filter(|stem| !stem.is_empty()) else {
        return Err(Error::NoFileName {
            path: input.to_owned(),
        });
    };

    Ok(sanitize_filename::sanitize(format!("{stem}.{extension}")))
}

/// Replaces the content of `path` with `bytes`, keeping its permissions. The file is swapped in one go so a
/// failure never leaves a half written file behind
///
/// ## Errors
///
/// Fails if `path` doesn't exist, or if the temporary file can't be written or renamed over `path`
pub fn replace_file(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|dir| !dir.as_str().is_empty());
    let permissions = fs::metadata(path)?.permissions();
    let mut tmp = NamedTempFile::new_in(dir.unwrap_or_else(|| Utf8Path::new(".")))?;
    tmp.write_all(bytes)?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|err| Error::IO(err.error))?;

    Ok(())
}
