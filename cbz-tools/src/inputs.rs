use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use cbz::naming::natural_cmp;
use glob::glob;
use tracing::{debug, warn};

use crate::{output::OUTPUT_DIR_NAMES, Error, Result};

/// Resolves the files to process from a list of paths, directories and glob patterns.
///
/// Directories are scanned for files whose extension is in `extensions` (recursively if `recursive` is set),
/// the tools' own output directories are skipped during the scan.
/// The returned list is sorted in reading order and doesn't contain duplicates.
///
/// ## Errors
///
/// Fails if a glob pattern is invalid, a directory can't be read, or if nothing matches
pub fn collect(
    sources: &[impl AsRef<str>],
    extensions: &[&str],
    recursive: bool,
) -> Result<Vec<Utf8PathBuf>> {
    let mut inputs = Vec::new();

    for source in sources {
        let source = source.as_ref();
        let path = Utf8Path::new(source);

        if path.is_dir() {
            scan_dir(path, extensions, recursive, &mut inputs)?;
        } else if path.is_file() {
            if has_extension(path, extensions) {
                inputs.push(path.to_owned());
            } else {
                warn!("skipping {path}, expected one of: {}", extensions.join(", "));
            }
        } else {
            for entry in glob(source)? {
                let entry = entry?;
                let Ok(entry) = Utf8PathBuf::from_path_buf(entry) else {
                    warn!("skipping a path that isn't valid utf-8");
                    continue;
                };
                if entry.is_file() && has_extension(&entry, extensions) {
                    inputs.push(entry);
                }
            }
        }
    }

    inputs.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
    inputs.dedup();

    if inputs.is_empty() {
        let sources = sources.iter().map(AsRef::as_ref).collect::<Vec<_>>();
        return Err(Error::NoInputs(sources.join(" ")));
    }

    debug!("found {} input files", inputs.len());

    Ok(inputs)
}

fn scan_dir(
    dir: &Utf8Path,
    extensions: &[&str],
    recursive: bool,
    inputs: &mut Vec<Utf8PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = Utf8PathBuf::from_path_buf(entry?.path())
            .map_err(|path| Error::NonUtf8Path(path.display().to_string()))?;

        if path.is_dir() {
            let is_output_dir = path
                .file_name()
                .is_some_and(|name| OUTPUT_DIR_NAMES.contains(&name));
            if recursive && !is_output_dir {
                scan_dir(&path, extensions, recursive, inputs)?;
            }
        } else if has_extension(&path, extensions) {
            inputs.push(path);
        }
    }

    Ok(())
}

fn has_extension(path: &Utf8Path, extensions: &[&str]) -> bool {
    path.extension().is_some_and(|extension| {
        extensions
            .iter()
            .any(|expected| expected.eq_ignore_ascii_case(extension))
    })
}
