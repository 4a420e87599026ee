use std::{
    fmt::Display,
    io::{BufRead, Cursor, Seek},
    path::Path,
};

use camino::Utf8Path;
use image::{imageops::FilterType, io::Reader as ImageReader, DynamicImage, ImageFormat};
use tracing::debug;

use crate::{CbzWrite, CbzWriterInsertionBuilder, Result};

static PAGE_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "avif",
];

/// Tells if an archive entry looks like a page, based on its extension only
#[must_use]
pub fn is_page_name(name: &str) -> bool {
    let path = Utf8Path::new(name);
    if name.ends_with('/')
        || path
            .file_name()
            .map_or(true, |file_name| file_name.starts_with("._"))
    {
        return false;
    }

    path.extension().is_some_and(|extension| {
        PAGE_EXTENSIONS
            .iter()
            .any(|page_extension| page_extension.eq_ignore_ascii_case(extension))
    })
}

/// Output formats an upscaler or a converter can be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum PageFormat {
    Jpg,
    Png,
    Webp,
}

impl PageFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Tells if an extension is readable as-is by tools only supporting these formats
    #[must_use]
    pub fn is_supported_extension(extension: &str) -> bool {
        ["jpg", "jpeg", "png", "webp"]
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(extension))
    }
}

impl Display for PageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, PartialEq)]
pub struct Image {
    dynamic_image: DynamicImage,
    format: Option<ImageFormat>,
}

impl Image {
    /// ## Errors
    ///
    /// Fails if the image can't be open or decoded
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = ImageReader::open(&path)?.with_guessed_format()?;
        let format = reader.format();
        Ok(Self {
            dynamic_image: reader.decode()?,
            format,
        })
    }

    /// ## Errors
    ///
    /// Fails if the image format can't be guessed or the image can't be decoded
    pub fn from_reader(reader: impl BufRead + Seek) -> Result<Self> {
        let reader = ImageReader::new(reader).with_guessed_format()?;
        let format = reader.format();
        Ok(Self {
            dynamic_image: reader.decode()?,
            format,
        })
    }

    /// ## Errors
    ///
    /// Fails if the image format can't be guessed or the image can't be decoded
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Format used when encoding, formats we can't encode fall back to png
    #[must_use]
    pub fn output_format(&self) -> ImageFormat {
        match self.format {
            Some(
                format @ (ImageFormat::Jpeg
                | ImageFormat::Png
                | ImageFormat::Gif
                | ImageFormat::Bmp
                | ImageFormat::Tiff),
            ) => format,
            _ => ImageFormat::Png,
        }
    }

    /// Extension matching `output_format`
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.output_format()
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("png")
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.dynamic_image.width(), self.dynamic_image.height())
    }

    /// Downscales the image so it is at most `max_height` pixels tall, smaller images are left untouched
    #[must_use]
    pub fn fit_height(self, max_height: u32) -> Self {
        let (width, height) = self.dimensions();
        if height <= max_height || max_height == 0 {
            return self;
        }

        let new_width = (u64::from(width) * u64::from(max_height) / u64::from(height)).max(1);
        let new_width = u32::try_from(new_width).unwrap_or(u32::MAX);
        debug!("resizing {width}x{height} to {new_width}x{max_height}");

        Self {
            dynamic_image: self
                .dynamic_image
                .resize_exact(new_width, max_height, FilterType::Lanczos3),
            format: self.format,
        }
    }

    /// Encodes the image in `output_format`
    ///
    /// ## Errors
    ///
    /// Fails if the image can't be encoded
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.encode(self.output_format())
    }

    /// ## Errors
    ///
    /// Fails if the image can't be encoded in `format`
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.dynamic_image.write_to(&mut out, format)?;
        Ok(out.into_inner())
    }

    /// Inserts the image in the archive as `<name>.<extension>`
    ///
    /// ## Errors
    ///
    /// Fails if the image can't be encoded or if the archive is full
    pub fn insert_into_cbz_writer(
        self,
        cbz_writer: &mut impl CbzWrite,
        name: impl AsRef<str>,
    ) -> Result<()> {
        let bytes = self.to_bytes()?;
        let insertion = CbzWriterInsertionBuilder::from_extension(self.extension())
            .set_bytes(bytes)
            .build_custom_str(name.as_ref())?;
        cbz_writer.insert_custom_str(insertion)?;
        debug!("inserted page into zip");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::{CbzRead, CbzReader, CbzWriter};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn page_names() {
        assert!(is_page_name("001.jpg"));
        assert!(is_page_name("chapter 1/002.JPEG"));
        assert!(is_page_name("cover.webp"));
        assert!(!is_page_name("ComicInfo.xml"));
        assert!(!is_page_name("__MACOSX/._001.jpg"));
        assert!(!is_page_name("images.jpg/"));
        assert!(!is_page_name("jpg"));
    }

    #[test]
    fn fit_height_keeps_ratio_and_never_upscales() {
        let img = Image::from_bytes(&sample_png(40, 100)).unwrap();
        assert_eq!(img.format(), Some(ImageFormat::Png));
        let img = img.fit_height(50);
        assert_eq!(img.dimensions(), (20, 50));
        let img = img.fit_height(500);
        assert_eq!(img.dimensions(), (20, 50));
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(Image::from_bytes(b"definitely not a picture").is_err());
    }

    #[test]
    fn inserted_image_keeps_its_format() {
        let mut writer = CbzWriter::default();
        Image::from_bytes(&sample_png(4, 4))
            .unwrap()
            .insert_into_cbz_writer(&mut writer, "00001")
            .unwrap();
        let finished = writer.finish().unwrap();

        let reader = CbzReader::from_bytes_slice(finished.as_ref()).unwrap();
        assert_eq!(reader.file_names(), ["00001.png"]);
    }

    #[test]
    fn encode_converts_between_formats() {
        let bmp = Image::from_bytes(&sample_png(3, 3))
            .unwrap()
            .encode(ImageFormat::Bmp)
            .unwrap();
        let img = Image::from_bytes(&bmp).unwrap();
        assert_eq!(img.format(), Some(ImageFormat::Bmp));

        let png = img.encode(ImageFormat::Png).unwrap();
        assert_eq!(Image::from_bytes(&png).unwrap().format(), Some(ImageFormat::Png));
    }

    #[test]
    fn supported_extensions() {
        assert!(PageFormat::is_supported_extension("JPEG"));
        assert!(!PageFormat::is_supported_extension("gif"));
        assert_eq!(PageFormat::Webp.to_string(), "webp");
    }
}
