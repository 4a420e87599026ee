use std::fmt::Display;

use camino::{Utf8Path, Utf8PathBuf};
use cbz::signature::ArchiveKind;
use cli_table::Table;

fn display_optional_value<Value>(value: &Option<Value>) -> impl Display
where
    Value: Display,
{
    match value {
        None => String::from("-"),
        Some(value) => format!("{value}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The extension doesn't match the signature
    Mislabeled,
    Corrupt,
    /// No page at all
    Empty,
    /// Some pages can't be decoded
    BadPages,
    Unknown,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Ok => "ok",
                Self::Mislabeled => "mislabeled",
                Self::Corrupt => "corrupt",
                Self::Empty => "empty",
                Self::BadPages => "bad-pages",
                Self::Unknown => "unknown",
            }
        )
    }
}

#[derive(Debug, Clone, Table)]
pub struct Row {
    #[table(title = "File")]
    pub file: Utf8PathBuf,
    #[table(title = "Kind", display_fn = "display_optional_value")]
    pub kind: Option<ArchiveKind>,
    #[table(title = "Status")]
    pub status: Status,
    #[table(title = "Details", display_fn = "display_optional_value")]
    pub details: Option<String>,
}

impl Row {
    pub fn new(file: &Utf8Path, kind: Option<ArchiveKind>, status: Status) -> Self {
        Self {
            file: file.to_owned(),
            kind,
            status,
            details: None,
        }
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// One line description used in the logs
    pub fn summary(&self) -> String {
        match &self.details {
            Some(details) => format!("{}, {details}", self.status),
            None => self.status.to_string(),
        }
    }
}
