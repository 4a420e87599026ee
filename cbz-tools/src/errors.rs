use std::{io, process::ExitStatus};

use camino::Utf8PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("{program} not found, install the {package} package or put {program} in your PATH")]
    MissingTool {
        program: String,
        package: &'static str,
    },

    #[error("missing dependencies: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("{program} couldn't be started: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} failed ({status}): {stderr}")]
    ToolFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{0} is not a valid utf-8 path")]
    NonUtf8Path(String),

    #[error("no input file found matching {0}")]
    NoInputs(String),

    #[error("{path} has no usable file name")]
    NoFileName { path: Utf8PathBuf },

    #[error("{failed} of {total} files failed")]
    BatchFailed { failed: usize, total: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
