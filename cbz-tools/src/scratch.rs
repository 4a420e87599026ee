use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use crate::{Error, Result};

/// Temporary working directory, removed with all its content on drop
#[derive(Debug)]
pub struct ScratchDir {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl ScratchDir {
    /// Creates a directory named `<prefix><random>` in the system temporary directory
    ///
    /// ## Errors
    ///
    /// Fails if the directory can't be created or if its path isn't valid utf-8
    pub fn new(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = Utf8Path::from_path(dir.path())
            .map(Utf8Path::to_owned)
            .ok_or_else(|| Error::NonUtf8Path(dir.path().display().to_string()))?;

        Ok(Self { _dir: dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let scratch = ScratchDir::new("cbz-tools-").unwrap();
        let path = scratch.path().to_owned();
        assert!(path.is_dir());
        assert!(path.file_name().unwrap().starts_with("cbz-tools-"));

        drop(scratch);
        assert!(!path.exists());
    }
}
