use std::io::{Read, Seek, Write};

use tracing::debug;

use crate::{junk::JunkFilter, CbzReader, CbzWriter, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: usize,
    /// Removed entry names, in archive order
    pub removed: Vec<String>,
}

impl CleanReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Lists the junk entries of the archive, in archive order, without touching it
///
/// ## Errors
///
/// Fails if the central directory entries can't be read
pub fn junk_names<R: Read + Seek>(
    reader: &mut CbzReader<R>,
    filter: &JunkFilter,
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for index in 0..reader.len() {
        let file = reader.by_index_raw(index)?;
        if filter.is_junk(file.name()) {
            names.push(file.name().to_string());
        }
    }

    Ok(names)
}

/// Copies every entry that isn't junk from `reader` to `writer`, entries are copied raw so nothing gets recompressed
///
/// ## Errors
///
/// Fails if an entry can't be read or written
pub fn clean<R, W>(
    reader: &mut CbzReader<R>,
    writer: &mut CbzWriter<W>,
    filter: &JunkFilter,
) -> Result<CleanReport>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut report = CleanReport::default();

    for index in 0..reader.len() {
        let file = reader.by_index_raw(index)?;
        if filter.is_junk(file.name()) {
            debug!("removing {}", file.name());
            report.removed.push(file.name().to_string());
            continue;
        }

        writer.raw_copy(file)?;
        report.kept += 1;
    }

    Ok(report)
}
