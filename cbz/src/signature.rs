//! File type detection from leading magic bytes.
//!
//! Comic archives are routinely mislabeled (a `.cbr` that is really a zip, a `.cbz` packed with
//! rar), so the extension is only ever used to know what the file *claims* to be.

use std::{
    fmt::Display,
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

use camino::Utf8Path;

use crate::Result;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED: &[u8] = b"PK\x07\x08";
const RAR4: &[u8] = b"Rar!\x1A\x07\x00";
const RAR5: &[u8] = b"Rar!\x1A\x07\x01\x00";
const SEVEN_ZIP: &[u8] = b"7z\xBC\xAF\x27\x1C";
const PDF: &[u8] = b"%PDF-";

/// Longest signature we look for
pub static SNIFF_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZip,
    Pdf,
    Unknown,
}

impl ArchiveKind {
    /// The comic extension a file of this kind should carry
    #[must_use]
    pub fn comic_extension(self) -> Option<ComicExtension> {
        match self {
            Self::Zip => Some(ComicExtension::Cbz),
            Self::Rar => Some(ComicExtension::Cbr),
            Self::SevenZip => Some(ComicExtension::Cb7),
            Self::Pdf => Some(ComicExtension::Pdf),
            Self::Unknown => None,
        }
    }
}

impl Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Zip => "zip",
                Self::Rar => "rar",
                Self::SevenZip => "7z",
                Self::Pdf => "pdf",
                Self::Unknown => "unknown",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComicExtension {
    Cbz,
    Cbr,
    Cb7,
    Pdf,
}

impl ComicExtension {
    /// Reads the extension of `path`, `zip`, `rar` and `7z` are treated as their comic counterparts
    #[must_use]
    pub fn from_path(path: impl AsRef<Utf8Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_ascii_lowercase();
        match extension.as_str() {
            "cbz" | "zip" => Some(Self::Cbz),
            "cbr" | "rar" => Some(Self::Cbr),
            "cb7" | "7z" => Some(Self::Cb7),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    #[must_use]
    pub fn expected_kind(self) -> ArchiveKind {
        match self {
            Self::Cbz => ArchiveKind::Zip,
            Self::Cbr => ArchiveKind::Rar,
            Self::Cb7 => ArchiveKind::SevenZip,
            Self::Pdf => ArchiveKind::Pdf,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cbz => "cbz",
            Self::Cbr => "cbr",
            Self::Cb7 => "cb7",
            Self::Pdf => "pdf",
        }
    }
}

impl Display for ComicExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[must_use]
pub fn sniff(bytes: &[u8]) -> ArchiveKind {
    if [ZIP_LOCAL_HEADER, ZIP_EMPTY_ARCHIVE, ZIP_SPANNED]
        .iter()
        .any(|magic| bytes.starts_with(magic))
    {
        ArchiveKind::Zip
    } else if bytes.starts_with(RAR4) || bytes.starts_with(RAR5) {
        ArchiveKind::Rar
    } else if bytes.starts_with(SEVEN_ZIP) {
        ArchiveKind::SevenZip
    } else if bytes.starts_with(PDF) {
        ArchiveKind::Pdf
    } else {
        ArchiveKind::Unknown
    }
}

/// Detects the kind of the file located at `path` from its first bytes
///
/// ## Errors
///
/// Fails if the file can't be opened or read
pub fn detect(path: impl AsRef<Path>) -> Result<ArchiveKind> {
    let mut file = File::open(path)?;
    let mut head = [0; SNIFF_LEN];
    let mut filled = 0;

    // A single read may return less than asked even when more bytes are available
    while filled < SNIFF_LEN {
        match file.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(sniff(&head[..filled]))
}
