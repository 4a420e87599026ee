use std::io::{self, Read, Seek};

use tracing::{debug, warn};

use crate::{
    image::{is_page_name, Image},
    junk::JunkFilter,
    CbzReader, Error, Result,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Health {
    pub entries: usize,
    pub pages: usize,
    pub junk: usize,
    /// Pages that couldn't be decoded, only filled by a deep verification
    pub bad_pages: Vec<String>,
}

/// Reads every entry of the archive to the end so the zip checksums get verified.
/// A `deep` verification also decodes every page.
///
/// ## Errors
///
/// Fails on the first entry that can't be decompressed or whose checksum doesn't match
pub fn verify<R: Read + Seek>(reader: &mut CbzReader<R>, deep: bool) -> Result<Health> {
    let filter = JunkFilter::new();
    let mut health = Health::default();

    for index in 0..reader.len() {
        let mut file = reader.by_index(index)?;
        let name = file.name().to_string();
        health.entries += 1;

        if file.is_dir() {
            continue;
        }

        let is_page = is_page_name(&name);
        if filter.is_junk(&name) {
            health.junk += 1;
        } else if is_page {
            health.pages += 1;
        }

        if deep && is_page && !filter.is_junk(&name) {
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .map_err(|source| Error::CorruptEntry {
                    name: name.clone(),
                    source,
                })?;
            if let Err(err) = Image::from_bytes(&bytes) {
                warn!("{name} can't be decoded: {err}");
                health.bad_pages.push(name.clone());
            }
        } else {
            io::copy(&mut file, &mut io::sink()).map_err(|source| Error::CorruptEntry {
                name: name.clone(),
                source,
            })?;
        }
        debug!("{name} verified");
    }

    Ok(health)
}
