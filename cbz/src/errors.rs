use std::{io, result};

use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Cbz file size couldn't be converted")]
    CbzFileSizeConversion,

    #[error("Cbz is too large, it can contain a maximum of {0} files")]
    CbzTooLarge(usize),

    #[error("Cbz file insertion's extension not provided")]
    CbzInsertionNoExtension,

    #[error("Cbz file insertion: no bytes set")]
    CbzInsertionNoBytes,

    #[error("Entry {name} is corrupted: {source}")]
    CorruptEntry { name: String, source: io::Error },

    #[error("{0} is not a valid utf-8 path")]
    NonUtf8Path(String),
}

pub type Result<T, E = Error> = result::Result<T, E>;
