use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use cbz::{
    clean::{clean, junk_names},
    junk::JunkFilter,
    signature::{detect, ArchiveKind, ComicExtension},
    CbzReader, CbzWriter,
};
use cbz_tools::{
    batch::Outcome,
    output::{replace_file, OutputLayout},
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Cleaner {
    pub layout: OutputLayout,
    pub filter: JunkFilter,
    /// Replace the inputs instead of writing to the output layout
    pub in_place: bool,
    /// Only list what would be removed
    pub dry_run: bool,
}

impl Cleaner {
    pub fn clean(&self, input: &Utf8Path) -> Result<Outcome> {
        let kind = detect(input).with_context(|| format!("reading {input}"))?;
        if kind != ArchiveKind::Zip {
            bail!("{input} is a {kind} file, not a zip archive, run cbz-converter on it first");
        }

        let mut reader = CbzReader::from_path(input)?;
        let junk = junk_names(&mut reader, &self.filter)?;
        if junk.is_empty() {
            return Ok(Outcome::Done("already clean".to_string()));
        }
        debug!("junk found in {input}: {junk:?}");

        if self.dry_run {
            return Ok(Outcome::Done(format!(
                "would remove {} entries: {}",
                junk.len(),
                junk.join(", ")
            )));
        }

        let mut writer = CbzWriter::default();
        let report = clean(&mut reader, &mut writer, &self.filter)?;
        let finished = writer.finish()?;
        drop(reader);

        let removed = report.removed.len();
        if self.in_place {
            replace_file(input, finished.as_ref())?;
            return Ok(Outcome::Done(format!("{removed} entries removed in place")));
        }

        let Some(target) = self.layout.target(input, ComicExtension::Cbz.as_str())? else {
            return Ok(Outcome::Skipped("output already exists".to_string()));
        };
        finished.write_to_path(&target)?;

        Ok(Outcome::Done(format!(
            "{removed} entries removed, {} kept, written to {target}",
            report.kept
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use cbz::{junk::COMIC_INFO, CbzRead, CbzWrite};
    use cbz_tools::output::CLEANED_DIR;
    use tempfile::TempDir;

    use super::*;

    fn cleaner(filter: JunkFilter) -> Cleaner {
        Cleaner {
            layout: OutputLayout::new(None, CLEANED_DIR),
            filter,
            in_place: false,
            dry_run: false,
        }
    }

    fn archive(root: &Utf8Path, name: &str, entries: &[&str]) -> Utf8PathBuf {
        let mut writer = CbzWriter::default();
        for entry in entries {
            writer.insert_named(*entry, b"content").unwrap();
        }
        let path = root.join(name);
        writer.finish().unwrap().write_to_path(&path).unwrap();
        path
    }

    fn tempdir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();
        (dir, root)
    }

    #[test]
    fn junk_is_removed_into_cleaned() {
        let (_dir, root) = tempdir();
        let input = archive(
            &root,
            "Volume 1.cbz",
            &["001.jpg", "__MACOSX/._001.jpg", "Thumbs.db", "002.jpg", COMIC_INFO],
        );
        let original = fs::read(&input).unwrap();

        let outcome = cleaner(JunkFilter::new()).clean(&input).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));

        let reader = CbzReader::from_path(root.join("cleaned/Volume 1.cbz")).unwrap();
        assert_eq!(reader.sorted_names(), ["001.jpg", "002.jpg", COMIC_INFO]);
        assert_eq!(fs::read(&input).unwrap(), original);
    }

    #[test]
    fn comic_info_removal_is_opt_in() {
        let (_dir, root) = tempdir();
        let input = archive(&root, "Volume 1.cbz", &["001.jpg", COMIC_INFO]);

        cleaner(JunkFilter::new().remove_comic_info(true))
            .clean(&input)
            .unwrap();

        let reader = CbzReader::from_path(root.join("cleaned/Volume 1.cbz")).unwrap();
        assert_eq!(reader.sorted_names(), ["001.jpg"]);
    }

    #[test]
    fn clean_archives_are_not_rewritten() {
        let (_dir, root) = tempdir();
        let input = archive(&root, "Volume 1.cbz", &["001.jpg", "002.jpg"]);

        let outcome = cleaner(JunkFilter::new()).clean(&input).unwrap();
        assert_eq!(outcome, Outcome::Done("already clean".to_string()));
        assert!(!root.join("cleaned").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (_dir, root) = tempdir();
        let input = archive(&root, "Volume 1.cbz", &["001.jpg", ".DS_Store"]);

        let cleaner = Cleaner {
            dry_run: true,
            ..cleaner(JunkFilter::new())
        };
        let Outcome::Done(message) = cleaner.clean(&input).unwrap() else {
            panic!("dry run should succeed");
        };
        assert!(message.contains(".DS_Store"));
        assert!(!root.join("cleaned").exists());
    }

    #[test]
    fn in_place_replaces_the_input() {
        let (_dir, root) = tempdir();
        let input = archive(&root, "Volume 1.cbz", &["001.jpg", "desktop.ini", "cover.txt"]);

        let cleaner = Cleaner {
            in_place: true,
            ..cleaner(JunkFilter::new().with_patterns(&["*.txt"]).unwrap())
        };
        cleaner.clean(&input).unwrap();

        let reader = CbzReader::from_path(&input).unwrap();
        assert_eq!(reader.sorted_names(), ["001.jpg"]);
        assert!(!root.join("cleaned").exists());
    }

    #[test]
    fn non_zip_inputs_point_to_the_converter() {
        let (_dir, root) = tempdir();
        let input = root.join("Volume 1.cbz");
        fs::write(&input, b"Rar!\x1A\x07\x00 rest").unwrap();

        let err = cleaner(JunkFilter::new()).clean(&input).unwrap_err();
        assert!(err.to_string().contains("cbz-converter"));
    }
}
