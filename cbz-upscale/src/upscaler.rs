use std::{
    fs,
    io::{Read, Seek, Write},
};

use anyhow::{anyhow, bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cbz::{
    image::{is_page_name, Image, PageFormat},
    junk::JunkFilter,
    naming::{natural_cmp, sort_natural},
    signature::{detect, ArchiveKind, ComicExtension},
    CbzRead, CbzReader, CbzWrite, CbzWriter, COUNTER_SIZE,
};
use cbz_tools::{batch::Outcome, external::Tool, output::OutputLayout, scratch::ScratchDir, unrar};
use image::ImageFormat;
use tracing::{debug, warn};

use crate::realesrgan::{RealEsrgan, UpscaleOptions};

static SCRATCH_PREFIX: &str = "cbz-upscale-";

/// Pages written to disk, ready for Real-ESRGAN
#[derive(Debug, Default)]
struct Staged {
    pages: usize,
    /// Entries that are neither pages nor junk, e.g. `ComicInfo.xml`
    extras: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone)]
pub struct Upscaler {
    pub layout: OutputLayout,
    pub realesrgan: RealEsrgan,
    pub options: UpscaleOptions,
    pub unrar: Tool,
    /// Upscaled pages taller than this are scaled down
    pub max_height: Option<u32>,
}

impl Upscaler {
    pub fn upscale(&self, input: &Utf8Path) -> Result<Outcome> {
        let kind = detect(input).with_context(|| format!("reading {input}"))?;
        if !matches!(kind, ArchiveKind::Zip | ArchiveKind::Rar) {
            bail!("{input} is a {kind} file, only zip and rar archives can be upscaled");
        }

        let Some(target) = self.layout.target(input, ComicExtension::Cbz.as_str())? else {
            return Ok(Outcome::Skipped("output already exists".to_string()));
        };

        let scratch = ScratchDir::new(SCRATCH_PREFIX)?;
        let pages_dir = scratch.path().join("in");
        let upscaled_dir = scratch.path().join("out");
        fs::create_dir_all(&pages_dir)?;
        fs::create_dir_all(&upscaled_dir)?;

        let staged = if kind == ArchiveKind::Rar {
            self.stage_rar(input, scratch.path(), &pages_dir)?
        } else {
            stage(&mut CbzReader::from_path(input)?, &pages_dir)?
        };
        if staged.pages == 0 {
            bail!("no page found");
        }
        debug!("{} pages staged in {pages_dir}", staged.pages);

        self.realesrgan.upscale(&pages_dir, &upscaled_dir, &self.options)?;

        let mut writer = CbzWriter::default();
        match self.max_height {
            Some(max_height) => pack_resized(&upscaled_dir, max_height, &mut writer)?,
            None => {
                writer.pack_dir(&upscaled_dir, None)?;
            }
        }

        let upscaled = writer.size();
        if upscaled == 0 {
            bail!("Real-ESRGAN didn't produce any page");
        }
        if upscaled < staged.pages {
            warn!("{input}: only {upscaled} of {} pages were upscaled", staged.pages);
        }

        for (name, bytes) in &staged.extras {
            writer.insert_named(name.as_str(), bytes)?;
        }
        writer.finish()?.write_to_path(&target)?;

        Ok(Outcome::Done(format!(
            "{upscaled} pages upscaled x{} with {}, written to {target}",
            self.options.scale, self.options.model
        )))
    }

    /// Rar archives are extracted with unrar then staged from the extracted files
    fn stage_rar(&self, input: &Utf8Path, scratch: &Utf8Path, pages_dir: &Utf8Path) -> Result<Staged> {
        let raw_dir = scratch.join("raw");
        fs::create_dir_all(&raw_dir)?;
        unrar::extract(&self.unrar, input, &raw_dir)?;

        stage_dir(&raw_dir, pages_dir)
    }
}

impl Staged {
    /// Writes a page to `dir` as `<counter>.<ext>`, anything else is kept aside.
    /// Pages Real-ESRGAN can't read are converted to png.
    fn add(&mut self, dir: &Utf8Path, name: String, bytes: &[u8]) -> Result<()> {
        if !is_page_name(&name) {
            debug!("keeping {name} aside");
            self.extras.push((name, bytes.to_vec()));
            return Ok(());
        }

        self.pages += 1;
        let stem = format!("{:0width$}", self.pages, width = COUNTER_SIZE);
        let extension = Utf8Path::new(&name)
            .extension()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if PageFormat::is_supported_extension(&extension) {
            fs::write(dir.join(format!("{stem}.{extension}")), bytes)?;
        } else {
            debug!("converting {name} to png");
            let png = Image::from_bytes(bytes)
                .with_context(|| format!("decoding {name}"))?
                .encode(ImageFormat::Png)?;
            fs::write(dir.join(format!("{stem}.png")), png)?;
        }

        Ok(())
    }
}

/// Writes the pages of the archive to `dir` as `00001.<ext>`, `00002.<ext>`... in reading order
fn stage<R: Read + Seek>(reader: &mut CbzReader<R>, dir: &Utf8Path) -> Result<Staged> {
    let filter = JunkFilter::new();
    let mut staged = Staged::default();

    reader.try_for_each(|file| -> Result<()> {
        let mut file = file?;
        let name = file.name().to_string();
        if file.is_dir() || filter.is_junk(&name) {
            return Ok(());
        }

        let bytes = file.to_bytes()?;
        staged.add(dir, name, &bytes)
    })?;

    Ok(staged)
}

/// Same as `stage` for the files extracted under `root`, named after their path relative to `root`
fn stage_dir(root: &Utf8Path, dir: &Utf8Path) -> Result<Staged> {
    let filter = JunkFilter::new();
    let mut staged = Staged::default();

    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| natural_cmp(a, b));

    for (name, path) in files {
        if filter.is_junk(&name) {
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("reading {path}"))?;
        staged.add(dir, name, &bytes)?;
    }

    Ok(staged)
}

fn collect_files(
    root: &Utf8Path,
    dir: &Utf8Path,
    files: &mut Vec<(String, Utf8PathBuf)>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = Utf8PathBuf::from_path_buf(entry?.path())
            .map_err(|path| anyhow!("{} is not a valid utf-8 path", path.display()))?;
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let name = relative
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, path));
        }
    }

    Ok(())
}

/// Packs the pages of `dir` in reading order, scaled down to `max_height`
fn pack_resized<W: Write + Seek>(
    dir: &Utf8Path,
    max_height: u32,
    writer: &mut CbzWriter<W>,
) -> Result<()> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = Utf8PathBuf::from_path_buf(entry?.path())
            .map_err(|path| anyhow!("{} is not a valid utf-8 path", path.display()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    sort_natural(&mut paths);

    for path in paths {
        let stem = path.file_stem().unwrap_or_default();
        Image::open(&path)
            .with_context(|| format!("decoding {path}"))?
            .fit_height(max_height)
            .insert_into_cbz_writer(&mut *writer, stem)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use cbz::junk::COMIC_INFO;
    use cbz_tools::output::UPSCALED_DIR;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn tempdir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();
        (dir, root)
    }

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 10])))
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    fn archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = CbzWriter::default();
        for (name, bytes) in entries {
            writer.insert_named(*name, bytes).unwrap();
        }
        writer.finish().unwrap().as_ref().to_vec()
    }

    fn sorted_files(dir: &Utf8Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        sort_natural(&mut names);
        names
    }

    #[test]
    fn pages_are_flattened_in_reading_order() {
        let (_dir, root) = tempdir();
        let bytes = archive(&[
            ("chapter 1/page10.jpg", encoded(2, 2, ImageFormat::Jpeg)),
            ("chapter 1/page2.JPG", encoded(2, 2, ImageFormat::Jpeg)),
            ("chapter 1/page3.bmp", encoded(2, 2, ImageFormat::Bmp)),
            ("__MACOSX/chapter 1/._page2.JPG", b"resource fork".to_vec()),
            (COMIC_INFO, b"<ComicInfo/>".to_vec()),
        ]);

        let staged = stage(&mut CbzReader::from_bytes_slice(&bytes).unwrap(), &root).unwrap();

        assert_eq!(staged.pages, 3);
        assert_eq!(staged.extras, [(COMIC_INFO.to_string(), b"<ComicInfo/>".to_vec())]);
        assert_eq!(sorted_files(&root), ["00001.jpg", "00002.png", "00003.jpg"]);
        assert_eq!(
            Image::open(root.join("00002.png")).unwrap().format(),
            Some(ImageFormat::Png)
        );
    }

    #[test]
    fn extracted_files_are_staged_in_reading_order() {
        let (_dir, root) = tempdir();
        let raw = root.join("raw");
        let pages = root.join("in");
        fs::create_dir_all(raw.join("chapter 1")).unwrap();
        fs::create_dir_all(&pages).unwrap();
        fs::write(raw.join("chapter 1/page10.jpg"), encoded(2, 2, ImageFormat::Jpeg)).unwrap();
        fs::write(raw.join("chapter 1/page9.bmp"), encoded(2, 2, ImageFormat::Bmp)).unwrap();
        fs::write(raw.join("chapter 1/Thumbs.db"), b"junk").unwrap();
        fs::write(raw.join(COMIC_INFO), b"<ComicInfo/>").unwrap();

        let staged = stage_dir(&raw, &pages).unwrap();

        assert_eq!(staged.pages, 2);
        assert_eq!(staged.extras, [(COMIC_INFO.to_string(), b"<ComicInfo/>".to_vec())]);
        assert_eq!(sorted_files(&pages), ["00001.png", "00002.jpg"]);
    }

    #[test]
    fn resized_pages_keep_their_order() {
        let (_dir, root) = tempdir();
        fs::write(root.join("00002.png"), encoded(10, 40, ImageFormat::Png)).unwrap();
        fs::write(root.join("00001.png"), encoded(10, 20, ImageFormat::Png)).unwrap();

        let mut writer = CbzWriter::default();
        pack_resized(&root, 20, &mut writer).unwrap();
        let finished = writer.finish().unwrap();

        let mut reader = CbzReader::from_bytes_slice(finished.as_ref()).unwrap();
        assert_eq!(reader.sorted_names(), ["00001.png", "00002.png"]);
        let page = reader.read_by_name("00002.png").unwrap().to_bytes().unwrap();
        assert_eq!(Image::from_bytes(&page).unwrap().dimensions(), (5, 20));
    }

    #[cfg(unix)]
    mod pipeline {
        use std::os::unix::fs::PermissionsExt;

        use super::*;

        /// Stands in for Real-ESRGAN by copying the input pages to the output directory
        fn fake_realesrgan(dir: &Utf8Path) -> RealEsrgan {
            let binary = dir.join("realesrgan-ncnn-vulkan");
            fs::write(
                &binary,
                "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  case $1 in\n    -i) input=$2; shift ;;\n    -o) output=$2; shift ;;\n  esac\n  shift\ndone\ncp \"$input\"/* \"$output\"/\n",
            )
            .unwrap();
            fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
            RealEsrgan::from_binary(binary)
        }

        fn upscaler(root: &Utf8Path, max_height: Option<u32>) -> Upscaler {
            Upscaler {
                layout: OutputLayout::new(None, UPSCALED_DIR),
                realesrgan: fake_realesrgan(root),
                options: UpscaleOptions::default(),
                unrar: Tool::new("unrar", "unrar").at("/nope/unrar"),
                max_height,
            }
        }

        #[test]
        fn upscaled_archive_is_written() {
            let (_dir, root) = tempdir();
            let input = root.join("Volume 1.cbz");
            fs::write(
                &input,
                archive(&[
                    ("002.png", encoded(4, 8, ImageFormat::Png)),
                    ("001.png", encoded(4, 8, ImageFormat::Png)),
                    (COMIC_INFO, b"<ComicInfo/>".to_vec()),
                    ("Thumbs.db", b"junk".to_vec()),
                ]),
            )
            .unwrap();

            let outcome = upscaler(&root, Some(4)).upscale(&input).unwrap();
            assert!(matches!(outcome, Outcome::Done(_)));

            let mut reader = CbzReader::from_path(root.join("upscaled/Volume 1.cbz")).unwrap();
            assert_eq!(reader.sorted_names(), ["00001.png", "00002.png", COMIC_INFO]);
            let page = reader.read_by_name("00001.png").unwrap().to_bytes().unwrap();
            assert_eq!(Image::from_bytes(&page).unwrap().dimensions(), (2, 4));
        }

        #[test]
        fn archives_without_pages_fail() {
            let (_dir, root) = tempdir();
            let input = root.join("Volume 1.cbz");
            fs::write(&input, archive(&[(COMIC_INFO, b"<ComicInfo/>".to_vec())])).unwrap();

            assert!(upscaler(&root, None).upscale(&input).is_err());
            assert!(!root.join("upscaled/Volume 1.cbz").exists());
        }

        #[test]
        fn pdf_is_rejected() {
            let (_dir, root) = tempdir();
            let input = root.join("Volume 1.cbz");
            fs::write(&input, b"%PDF-1.4").unwrap();

            let err = upscaler(&root, None).upscale(&input).unwrap_err();
            assert!(err.to_string().contains("only zip and rar"));
        }
    }
}
