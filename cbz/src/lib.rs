#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::{
    borrow::Cow,
    fs::{self, File},
    io::{self, Cursor, Read, Seek, Write},
    ops::{Deref, DerefMut},
    path::Path,
    result,
};

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, trace};
use zip::{read::ZipFile, write::FileOptions, ZipArchive, ZipWriter};

pub use crate::errors::{Error, Result};
use crate::{image::is_page_name, junk::JunkFilter, naming::sort_natural};

pub mod clean;
pub mod errors;
pub mod image;
pub mod junk;
pub mod naming;
pub mod signature;
pub mod verify;

/// We artificially limit the amount of accepted files to 65535 files per Cbz
/// First as it'd be rather impractical for the user to read such enormous Cbz
/// Also, this size has been chosen as it was the limit of the very first zip format
pub static MAX_FILE_NUMBER: usize = u16::MAX as usize;

/// The length of 65535 used to name the inserted file with a proper padding
pub static COUNTER_SIZE: usize = 5;

pub trait Cbz {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait CbzRead: Cbz {
    fn file_names(&self) -> Vec<&str>;

    /// Lookup the file by `name` in Cbz and returns a `CbzFile`
    ///
    /// ## Errors
    ///
    /// Fails if the entry doesn't exist or can't be read
    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>>;

    /// All the entry names, in reading order
    fn sorted_names(&self) -> Vec<String> {
        let mut file_names = self
            .file_names()
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();
        sort_natural(&mut file_names);
        file_names
    }

    /// The entries that look like pages, in reading order
    fn page_names(&self) -> Vec<String> {
        self.sorted_names()
            .into_iter()
            .filter(|name| is_page_name(name))
            .collect()
    }

    /// Iterate over files present in the Cbz, in reading order.
    /// If the closure returns an error, this error is returned immediately.
    ///
    /// ## Errors
    ///
    /// Returns an error immediately if the provided closure returns an error
    fn try_for_each<F, E>(&mut self, mut f: F) -> result::Result<(), E>
    where
        F: FnMut(Result<CbzFile<'_>>) -> result::Result<(), E>,
    {
        for file_name in self.sorted_names() {
            f(self.read_by_name(&file_name))?;
        }

        Ok(())
    }
}

pub trait CbzWrite {
    fn size(&self) -> usize;

    /// High level `insert` method, the entry is named after the amount of files already present
    ///
    /// ## Errors
    ///
    /// Same behavior as `insert_from_bytes_slice_with_options`
    fn insert(&mut self, insertion: CbzWriterInsertion<'_, '_, Auto>) -> Result<()> {
        let filename = format!(
            "{:0>COUNTER_SIZE$}.{}",
            self.size() + 1,
            insertion.extension
        );

        self.insert_from_bytes_slice_with_options(
            filename,
            &insertion.bytes,
            insertion.file_options,
        )
    }

    /// High level `insert_custom_str` method, the entry is named `<custom str>.<extension>`
    ///
    /// ## Errors
    ///
    /// Same behavior as `insert_from_bytes_slice_with_options`
    fn insert_custom_str(
        &mut self,
        insertion: CbzWriterInsertion<'_, '_, CustomStr<'_>>,
    ) -> Result<()> {
        let filename = format!(
            "{:0>COUNTER_SIZE$}.{}",
            &*insertion.type_, insertion.extension
        );

        self.insert_from_bytes_slice_with_options(
            filename,
            &insertion.bytes,
            insertion.file_options,
        )
    }

    /// Inserts `bytes` under the exact entry `name`
    ///
    /// ## Errors
    ///
    /// Same behavior as `insert_from_bytes_slice_with_options`
    fn insert_named(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<()> {
        self.insert_from_bytes_slice_with_options(name, bytes, FileOptions::default())
    }

    /// This is the method ultimately called to insert the bytes into the Cbz
    ///
    /// ## Errors
    ///
    /// This fails if the Cbz writer can't be written or if it's full (i.e. its size equals `MAX_FILE_NUMBER`)
    fn insert_from_bytes_slice_with_options(
        &mut self,
        filename: impl Into<String>,
        bytes: &[u8],
        file_options: FileOptions,
    ) -> Result<()>;
}

pub struct CbzFile<'a>(ZipFile<'a>);

impl<'a> CbzFile<'a> {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn size(&self) -> u64 {
        self.0.size()
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    /// Convert the file content to `Bytes`
    ///
    /// ## Errors
    ///
    /// Fails if file size is too large to fit a `usize` on host machine
    /// or if the content can't be read
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(
            self.size()
                .try_into()
                .map_err(|_| Error::CbzFileSizeConversion)?,
        );

        self.0.read_to_end(&mut buf)?;

        Ok(buf.into())
    }
}

impl<'a> Read for CbzFile<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<'a> From<ZipFile<'a>> for CbzFile<'a> {
    fn from(zip_file: ZipFile<'a>) -> Self {
        Self(zip_file)
    }
}

#[derive(Debug)]
pub struct CbzReader<R> {
    archive: ZipArchive<R>,
}

impl<R> CbzReader<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        Self { archive }
    }
}

impl<R> CbzReader<R>
where
    R: Read + Seek,
{
    /// Creates `CbzReader` from a `Read`
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;

        Ok(Self::new(archive))
    }
}

impl CbzReader<File> {
    /// Creates `CbzReader` from a path
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        Self::from_reader(file)
    }
}

impl<'b> CbzReader<Cursor<&'b [u8]>> {
    /// Creates `CbzReader` from a bytes slice
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_bytes_slice(bytes: &'b [u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes);

        Self::from_reader(cursor)
    }
}

impl<R> Cbz for CbzReader<R>
where
    R: Read + Seek,
{
    fn len(&self) -> usize {
        self.archive.len()
    }
}

impl<R> CbzRead for CbzReader<R>
where
    R: Read + Seek,
{
    fn file_names(&self) -> Vec<&str> {
        self.archive.file_names().collect()
    }

    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>> {
        let archive_file = self.archive.by_name(name)?;

        Ok(archive_file.into())
    }
}

impl<R> Deref for CbzReader<R> {
    type Target = ZipArchive<R>;

    fn deref(&self) -> &Self::Target {
        &self.archive
    }
}

impl<R> DerefMut for CbzReader<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.archive
    }
}

pub struct CbzWriter<W: Write + Seek> {
    archive: ZipWriter<W>,
    size: usize,
}

impl<W> CbzWriter<W>
where
    W: Write + Seek,
{
    pub fn new(archive: ZipWriter<W>) -> Self {
        Self { archive, size: 0 }
    }

    /// Creates a `CbzWriter` from a `Write`
    fn from_writer(writer: W) -> Self {
        let archive = ZipWriter::new(writer);

        Self::new(archive)
    }

    /// Copies an entry from another archive as is, without decompressing it
    ///
    /// ## Errors
    ///
    /// Fails if the archive is full or the entry can't be copied
    pub fn raw_copy(&mut self, file: ZipFile<'_>) -> Result<()> {
        if self.size >= MAX_FILE_NUMBER {
            return Err(Error::CbzTooLarge(MAX_FILE_NUMBER));
        }

        trace!("copying {}", file.name());
        self.archive.raw_copy_file(file)?;
        self.size += 1;

        Ok(())
    }

    /// Adds every file found below `root`, named after its `/` separated path relative to `root`,
    /// in reading order. When a `filter` is provided, files it considers junk are skipped.
    /// Returns the amount of inserted files.
    ///
    /// ## Errors
    ///
    /// Fails if the directory can't be walked, a path isn't utf-8, or the archive is full
    pub fn pack_dir(
        &mut self,
        root: impl AsRef<Utf8Path>,
        filter: Option<&JunkFilter>,
    ) -> Result<usize> {
        let root = root.as_ref();
        let mut entries = Vec::new();
        collect_files(root, root, &mut entries)?;
        entries.sort_by(|(a, _), (b, _)| naming::natural_cmp(a, b));

        let mut inserted = 0;
        for (name, path) in entries {
            if filter.is_some_and(|filter| filter.is_junk(&name)) {
                debug!("skipping junk file {name}");
                continue;
            }

            let bytes = fs::read(&path)?;
            self.insert_named(name, &bytes)?;
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Terminates the Cbz archiving, called on drop anyway but error can't be handled
    ///
    /// ## Errors
    ///
    /// Same errors as the underlying `ZipWriter::finish` method
    pub fn finish(&mut self) -> Result<CbzWriterFinished<W>> {
        let writer = self.archive.finish()?;

        Ok(CbzWriterFinished::new(writer))
    }
}

fn collect_files(
    root: &Utf8Path,
    dir: &Utf8Path,
    entries: &mut Vec<(String, Utf8PathBuf)>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|path| Error::NonUtf8Path(path.display().to_string()))?;

        if path.is_dir() {
            collect_files(root, &path, entries)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let name = relative
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join("/");
            entries.push((name, path));
        }
    }

    Ok(())
}

impl Default for CbzWriter<Cursor<Vec<u8>>> {
    fn default() -> Self {
        Self::from_writer(Cursor::new(Vec::new()))
    }
}

impl<W> Cbz for CbzWriter<W>
where
    W: Write + Seek,
{
    fn len(&self) -> usize {
        self.size
    }
}

impl<W> CbzWrite for CbzWriter<W>
where
    W: Write + Seek,
{
    fn size(&self) -> usize {
        self.size
    }

    fn insert_from_bytes_slice_with_options(
        &mut self,
        filename: impl Into<String>,
        bytes: &[u8],
        file_options: FileOptions,
    ) -> Result<()> {
        if self.size >= MAX_FILE_NUMBER {
            return Err(Error::CbzTooLarge(MAX_FILE_NUMBER));
        }

        self.archive.start_file(filename, file_options)?;

        self.archive.write_all(bytes)?;

        self.size += 1;

        Ok(())
    }
}

pub struct CustomStr<'a>(&'a str);

impl<'a> Deref for CustomStr<'a> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

pub struct Auto;

pub struct CbzWriterInsertion<'a, 'b, T> {
    extension: Cow<'a, str>,
    file_options: FileOptions,
    bytes: Cow<'b, [u8]>,
    type_: T,
}

#[derive(Debug, PartialEq, Eq)]
enum InsertionTypeDescriber<'a> {
    Filename(&'a str),
    Extension(&'a str),
}

pub struct CbzWriterInsertionBuilder<'a, 'b> {
    type_describer: InsertionTypeDescriber<'a>,
    file_options: Option<FileOptions>,
    bytes: Option<Cow<'b, [u8]>>,
}

impl<'a, 'b> CbzWriterInsertionBuilder<'a, 'b> {
    pub fn from_filename(filename: &'a (impl AsRef<str> + ?Sized)) -> Self {
        Self {
            type_describer: InsertionTypeDescriber::Filename(filename.as_ref()),
            file_options: None,
            bytes: None,
        }
    }

    pub fn from_extension(extension: &'a (impl AsRef<str> + ?Sized)) -> Self {
        Self {
            type_describer: InsertionTypeDescriber::Extension(extension.as_ref()),
            file_options: None,
            bytes: None,
        }
    }

    #[must_use]
    pub fn set_bytes_ref(mut self, bytes: &'b impl AsRef<[u8]>) -> Self {
        self.bytes = Some(bytes.as_ref().into());

        self
    }

    #[must_use]
    pub fn set_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bytes = Some(bytes.into().into());

        self
    }

    /// Builds a `CbzWriterInsertion` named by the writer's counter
    ///
    /// ## Errors
    ///
    /// Fails if the `bytes` field hasn't been populated or if the extension is empty
    pub fn build(self) -> Result<CbzWriterInsertion<'a, 'b, Auto>> {
        self.inner_build(Auto)
    }

    /// Builds a `CbzWriterInsertion` named after `s`
    ///
    /// ## Errors
    ///
    /// Fails if the `bytes` field hasn't been populated or if the extension is empty
    pub fn build_custom_str<'c>(
        self,
        s: &'c str,
    ) -> Result<CbzWriterInsertion<'a, 'b, CustomStr<'c>>> {
        self.inner_build(CustomStr(s))
    }

    fn inner_build<T>(self, type_: T) -> Result<CbzWriterInsertion<'a, 'b, T>> {
        let Some(bytes) = self.bytes else {
            return Err(Error::CbzInsertionNoBytes);
        };

        let extension = match self.type_describer {
            InsertionTypeDescriber::Extension(extension) => {
                if extension.is_empty() {
                    return Err(Error::CbzInsertionNoExtension);
                }

                extension.into()
            }
            InsertionTypeDescriber::Filename(filename) => {
                let extension = Utf8Path::new(filename)
                    .extension()
                    .and_then(|extension| (!extension.is_empty()).then_some(extension.to_string()));

                let Some(extension) = extension else {
                    return Err(Error::CbzInsertionNoExtension);
                };

                extension.into()
            }
        };

        Ok(CbzWriterInsertion {
            extension,
            file_options: self.file_options.unwrap_or_default(),
            bytes,
            type_,
        })
    }
}

pub struct CbzWriterFinished<W> {
    writer: W,
}

impl<W> CbzWriterFinished<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for CbzWriterFinished<Cursor<T>> {
    fn as_ref(&self) -> &[u8] {
        self.writer.get_ref().as_ref()
    }
}

impl CbzWriterFinished<Cursor<Vec<u8>>> {
    /// Writes self into provided writer
    ///
    /// ## Errors
    ///
    /// Fails on write error
    pub fn write_to(self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.writer.into_inner())?;

        Ok(())
    }

    /// Writes self into a File (that will be created) located under the provided path
    ///
    /// ## Errors
    ///
    /// Can fail on file creation or when writing the file content
    pub fn write_to_path(self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;

        self.write_to(&mut file)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_insertion_uses_a_padded_counter() {
        let mut writer = CbzWriter::default();
        for bytes in [b"first".as_slice(), b"second".as_slice()] {
            let insertion = CbzWriterInsertionBuilder::from_filename("scan.JPG")
                .set_bytes_ref(&bytes)
                .build()
                .unwrap();
            writer.insert(insertion).unwrap();
        }
        let finished = writer.finish().unwrap();

        let reader = CbzReader::from_bytes_slice(finished.as_ref()).unwrap();
        assert_eq!(reader.sorted_names(), ["00001.JPG", "00002.JPG"]);
    }

    #[test]
    fn insertion_requires_bytes_and_extension() {
        assert!(matches!(
            CbzWriterInsertionBuilder::from_extension("png").build(),
            Err(Error::CbzInsertionNoBytes)
        ));
        assert!(matches!(
            CbzWriterInsertionBuilder::from_filename("README")
                .set_bytes(b"x".to_vec())
                .build(),
            Err(Error::CbzInsertionNoExtension)
        ));
    }

    #[test]
    fn pages_come_in_reading_order() {
        let mut writer = CbzWriter::default();
        for name in ["10.jpg", "ComicInfo.xml", "2.jpg", "1.png"] {
            writer.insert_named(name, b"data").unwrap();
        }
        let finished = writer.finish().unwrap();

        let mut reader = CbzReader::from_bytes_slice(finished.as_ref()).unwrap();
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.page_names(), ["1.png", "2.jpg", "10.jpg"]);

        let mut seen = Vec::new();
        reader
            .try_for_each(|file| {
                let mut file = file?;
                seen.push((file.name().to_string(), file.to_bytes()?));
                Ok::<_, Error>(())
            })
            .unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].0, "1.png");
        assert_eq!(seen[0].1.as_ref(), b"data");
    }

    #[test]
    fn pack_dir_keeps_relative_names_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("Chapter 1")).unwrap();
        fs::create_dir_all(root.join("__MACOSX/Chapter 1")).unwrap();
        fs::write(root.join("Chapter 1/page10.jpg"), b"10").unwrap();
        fs::write(root.join("Chapter 1/page9.jpg"), b"9").unwrap();
        fs::write(root.join("Chapter 1/Thumbs.db"), b"junk").unwrap();
        fs::write(root.join("__MACOSX/Chapter 1/._page9.jpg"), b"junk").unwrap();

        let mut writer = CbzWriter::default();
        let inserted = writer.pack_dir(root, None).unwrap();
        assert_eq!(inserted, 4);

        let mut writer = CbzWriter::default();
        let inserted = writer.pack_dir(root, Some(&JunkFilter::new())).unwrap();
        assert_eq!(inserted, 2);

        let finished = writer.finish().unwrap();
        let reader = CbzReader::from_bytes_slice(finished.as_ref()).unwrap();
        assert_eq!(
            reader.sorted_names(),
            ["Chapter 1/page9.jpg", "Chapter 1/page10.jpg"]
        );
    }

    #[test]
    fn raw_copy_preserves_content() {
        let mut source = CbzWriter::default();
        source.insert_named("001.jpg", b"page one").unwrap();
        let source = source.finish().unwrap();

        let mut reader = CbzReader::from_bytes_slice(source.as_ref()).unwrap();
        let mut copy = CbzWriter::default();
        copy.raw_copy(reader.by_index_raw(0).unwrap()).unwrap();
        assert_eq!(copy.size(), 1);
        let copy = copy.finish().unwrap();

        let mut reader = CbzReader::from_bytes_slice(copy.as_ref()).unwrap();
        let bytes = reader.read_by_name("001.jpg").unwrap().to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), b"page one");
    }

    #[test]
    fn write_to_path_creates_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("out.cbz")).unwrap();
        let mut writer = CbzWriter::default();
        writer.insert_named("001.png", b"png").unwrap();
        writer.finish().unwrap().write_to_path(&path).unwrap();

        let reader = CbzReader::from_path(&path).unwrap();
        assert_eq!(reader.file_names(), ["001.png"]);
    }
}
