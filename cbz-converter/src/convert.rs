use std::{fs, io::Cursor};

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use cbz::{
    clean::clean,
    junk::JunkFilter,
    signature::{detect, ArchiveKind, ComicExtension},
    CbzRead, CbzReader, CbzWrite, CbzWriter, CbzWriterInsertionBuilder,
};
use cbz_tools::{batch::Outcome, external::Tool, output::OutputLayout, scratch::ScratchDir, unrar};
use clap::ValueEnum;
use tracing::{debug, warn};

use crate::pdf;

static SCRATCH_PREFIX: &str = "cbz-converter-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PdfExtractor {
    /// Read the embedded jpegs directly, falls back to pdfimages when none is found
    Native,
    /// Always use poppler's pdfimages
    Pdfimages,
}

/// The archive kinds that can be turned into a cbz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Zip,
    Rar,
    Pdf,
}

#[derive(Debug, Clone)]
pub struct Converter {
    pub layout: OutputLayout,
    /// Junk is dropped while converting when set
    pub filter: Option<JunkFilter>,
    pub pdf_extractor: PdfExtractor,
    pub unrar: Tool,
    pub pdfimages: Tool,
}

impl Converter {
    pub fn convert(&self, input: &Utf8Path) -> Result<Outcome> {
        let kind = detect(input).with_context(|| format!("reading {input}"))?;
        debug!("{input} is a {kind} archive");

        let source = match kind {
            ArchiveKind::Zip => Source::Zip,
            ArchiveKind::Rar => Source::Rar,
            ArchiveKind::Pdf => Source::Pdf,
            ArchiveKind::SevenZip => bail!("unsupported archive, 7z must be extracted manually"),
            ArchiveKind::Unknown => bail!("unsupported archive, unrecognized file signature"),
        };

        let is_cbz = input
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case(ComicExtension::Cbz.as_str()));
        if source == Source::Zip && is_cbz && self.filter.is_none() {
            return Ok(Outcome::Skipped("already a cbz".to_string()));
        }

        let Some(target) = self.layout.target(input, ComicExtension::Cbz.as_str())? else {
            return Ok(Outcome::Skipped("output already exists".to_string()));
        };

        let mut writer = CbzWriter::default();
        match source {
            Source::Zip => {
                if self.filter.is_none() {
                    if CbzReader::from_path(input)?.page_names().is_empty() {
                        bail!("no page found, nothing written");
                    }
                    fs::copy(input, &target)?;
                    return Ok(Outcome::Done(format!("renamed zip archive to {target}")));
                }
                self.pack_zip(input, &mut writer)?;
            }
            Source::Rar => self.pack_rar(input, &mut writer)?,
            Source::Pdf => self.pack_pdf(input, &mut writer)?,
        }

        let pages = write_checked(writer, &target)?;
        Ok(Outcome::Done(format!("{pages} pages written to {target}")))
    }

    fn pack_zip(&self, input: &Utf8Path, writer: &mut CbzWriter<Cursor<Vec<u8>>>) -> Result<()> {
        let filter = self.filter.clone().unwrap_or_default();
        let mut reader = CbzReader::from_path(input)?;
        let report = clean(&mut reader, writer, &filter)?;
        if !report.is_clean() {
            debug!("dropped {}", report.removed.join(", "));
        }
        Ok(())
    }

    fn pack_rar(&self, input: &Utf8Path, writer: &mut CbzWriter<Cursor<Vec<u8>>>) -> Result<()> {
        let dir = ScratchDir::new(SCRATCH_PREFIX)?;
        unrar::extract(&self.unrar, input, dir.path())?;
        let inserted = writer.pack_dir(dir.path(), self.filter.as_ref())?;
        debug!("packed {inserted} files");
        Ok(())
    }

    fn pack_pdf(&self, input: &Utf8Path, writer: &mut CbzWriter<Cursor<Vec<u8>>>) -> Result<()> {
        if self.pdf_extractor == PdfExtractor::Native {
            match pdf::extract_jpegs(input) {
                Ok(jpegs) if !jpegs.is_empty() => {
                    for jpeg in jpegs {
                        let insertion = CbzWriterInsertionBuilder::from_extension("jpg")
                            .set_bytes(jpeg)
                            .build()?;
                        writer.insert(insertion)?;
                    }
                    return Ok(());
                }
                Ok(_) => warn!("no embedded jpeg in {input}, falling back to pdfimages"),
                Err(err) => warn!("{input} can't be read natively ({err}), falling back to pdfimages"),
            }
        }

        let dir = ScratchDir::new(SCRATCH_PREFIX)?;
        pdf::extract_with_pdfimages(&self.pdfimages, input, dir.path())?;
        writer.pack_dir(dir.path(), self.filter.as_ref())?;
        Ok(())
    }
}

/// Refuses to write an archive without pages, returns the amount of pages written
fn write_checked(mut writer: CbzWriter<Cursor<Vec<u8>>>, target: &Utf8Path) -> Result<usize> {
    let finished = writer.finish()?;
    let pages = CbzReader::from_bytes_slice(finished.as_ref())?
        .page_names()
        .len();
    if pages == 0 {
        bail!("no page found, nothing written");
    }

    finished.write_to_path(target)?;
    Ok(pages)
}
