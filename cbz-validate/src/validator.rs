use std::fs;

use anyhow::{bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cbz::{
    signature::{detect, ArchiveKind, ComicExtension},
    verify::verify,
    CbzReader,
};
use cbz_tools::{external::Tool, unrar};
use tracing::debug;

use crate::report::{Row, Status};

#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// Decode every page of zip archives
    pub deep: bool,
    /// Rename mislabeled files
    pub fix: bool,
    /// Rar archives are tested with unrar when set
    pub unrar: Option<Tool>,
}

impl Validator {
    /// Checks a single file, problems are reported in the returned row and never as errors
    pub fn validate(&self, input: &Utf8Path) -> Row {
        let kind = match detect(input) {
            Ok(kind) => kind,
            Err(err) => {
                return Row::new(input, None, Status::Corrupt).details(format!("can't be read: {err}"))
            }
        };
        debug!("{input} is a {kind} file");

        let Some(expected) = kind.comic_extension() else {
            return Row::new(input, Some(kind), Status::Unknown).details("unrecognized signature");
        };

        if let Some((status, details)) = self.check_content(input, kind) {
            return Row::new(input, Some(kind), status).details(details);
        }

        if ComicExtension::from_path(input) == Some(expected) {
            return Row::new(input, Some(kind), Status::Ok);
        }

        let claimed = input.extension().unwrap_or("no");
        if !self.fix {
            return Row::new(input, Some(kind), Status::Mislabeled)
                .details(format!("{claimed} extension on a {kind} file, should be {expected}"));
        }

        match fix_extension(input, expected) {
            Ok(renamed) => Row::new(input, Some(kind), Status::Ok).details(format!("renamed to {renamed}")),
            Err(err) => Row::new(input, Some(kind), Status::Mislabeled).details(format!("{err:#}")),
        }
    }

    fn check_content(&self, input: &Utf8Path, kind: ArchiveKind) -> Option<(Status, String)> {
        match kind {
            ArchiveKind::Zip => {
                let mut reader = match CbzReader::from_path(input) {
                    Ok(reader) => reader,
                    Err(err) => return Some((Status::Corrupt, format!("can't be opened: {err}"))),
                };
                let health = match verify(&mut reader, self.deep) {
                    Ok(health) => health,
                    Err(err) => return Some((Status::Corrupt, err.to_string())),
                };
                debug!("{input}: {health:?}");

                if health.pages == 0 {
                    Some((Status::Empty, "no page found".to_string()))
                } else if !health.bad_pages.is_empty() {
                    Some((
                        Status::BadPages,
                        format!(
                            "{} of {} pages can't be decoded: {}",
                            health.bad_pages.len(),
                            health.pages,
                            health.bad_pages.join(", ")
                        ),
                    ))
                } else {
                    None
                }
            }
            ArchiveKind::Rar => {
                let unrar = self.unrar.as_ref()?;
                unrar::test(unrar, input)
                    .err()
                    .map(|err| (Status::Corrupt, err.to_string()))
            }
            ArchiveKind::SevenZip | ArchiveKind::Pdf | ArchiveKind::Unknown => None,
        }
    }
}

/// Renames `input` to carry `extension`, an existing file is never replaced
fn fix_extension(input: &Utf8Path, extension: ComicExtension) -> Result<Utf8PathBuf> {
    let target = input.with_extension(extension.as_str());
    if target.exists() {
        bail!("can't rename to {target}, the file already exists");
    }

    fs::rename(input, &target)?;
    Ok(target)
}
