//! Thin wrapper over the `unrar` command line, rar archives are never decoded in process.

use camino::Utf8Path;
use tracing::debug;

use crate::{external::Tool, Result};

/// `unrar x` overwriting without prompt, trailing separator so unrar treats `dest` as a directory
#[must_use]
pub fn extract_args(input: &Utf8Path, dest: &Utf8Path) -> Vec<String> {
    vec![
        "x".to_string(),
        "-o+".to_string(),
        "-y".to_string(),
        "-idq".to_string(),
        input.to_string(),
        format!("{dest}/"),
    ]
}

/// `unrar t`, checks the archive integrity without extracting anything
#[must_use]
pub fn test_args(input: &Utf8Path) -> Vec<String> {
    vec!["t".to_string(), "-idq".to_string(), input.to_string()]
}

/// Extracts the whole archive into `dest`, keeping its directory structure
///
/// ## Errors
///
/// Fails if unrar is missing or can't extract the archive
pub fn extract(unrar: &Tool, input: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    debug!("extracting {input} to {dest}");
    unrar.run(extract_args(input, dest))?;
    Ok(())
}

/// ## Errors
///
/// Fails if unrar is missing or reports a damaged archive
pub fn test(unrar: &Tool, input: &Utf8Path) -> Result<()> {
    unrar.run(test_args(input))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_targets_a_directory() {
        assert_eq!(
            extract_args(Utf8Path::new("in/Volume 1.cbr"), Utf8Path::new("/tmp/x")),
            ["x", "-o+", "-y", "-idq", "in/Volume 1.cbr", "/tmp/x/"]
        );
    }

    #[test]
    fn test_mode() {
        assert_eq!(
            test_args(Utf8Path::new("Volume 1.cbr")),
            ["t", "-idq", "Volume 1.cbr"]
        );
    }

    #[test]
    fn missing_unrar_is_reported() {
        let unrar = Tool::new("unrar", "unrar").at("/nope/unrar");
        let err = test(&unrar, Utf8Path::new("Volume 1.cbr")).unwrap_err();
        assert!(err.to_string().contains("/nope/unrar"));
    }
}
