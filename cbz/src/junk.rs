use glob::{MatchOptions, Pattern};

use crate::Result;

/// Files that operating systems and file managers drop into folders before they get zipped
static JUNK_FILE_NAMES: [&str; 5] = [
    ".DS_Store",
    "Thumbs.db",
    "ehthumbs.db",
    "desktop.ini",
    ".directory",
];

static JUNK_DIR_NAMES: [&str; 1] = ["__MACOSX"];

static APPLE_DOUBLE_PREFIX: &str = "._";

pub static COMIC_INFO: &str = "ComicInfo.xml";

/// Decides which archive entries are unwanted metadata
#[derive(Debug, Clone, Default)]
pub struct JunkFilter {
    extra_patterns: Vec<Pattern>,
    remove_comic_info: bool,
}

impl JunkFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds user provided glob patterns, matched against the full entry name and the file name
    ///
    /// ## Errors
    ///
    /// Fails if one of the patterns is invalid
    pub fn with_patterns(mut self, patterns: &[impl AsRef<str>]) -> Result<Self> {
        for pattern in patterns {
            self.extra_patterns.push(Pattern::new(pattern.as_ref())?);
        }

        Ok(self)
    }

    #[must_use]
    pub fn remove_comic_info(mut self, remove: bool) -> Self {
        self.remove_comic_info = remove;
        self
    }

    #[must_use]
    pub fn is_junk(&self, entry_name: &str) -> bool {
        let trimmed = entry_name.trim_end_matches('/');
        let mut components = trimmed.split(['/', '\\']).filter(|c| !c.is_empty());
        let Some(file_name) = components.next_back() else {
            return false;
        };

        // The folder itself is dropped along with its content, matching on parents is enough
        let in_junk_dir = components.any(|c| JUNK_DIR_NAMES.contains(&c));
        if in_junk_dir {
            return true;
        }

        if entry_name.ends_with('/') {
            return JUNK_DIR_NAMES.contains(&file_name);
        }

        if JUNK_FILE_NAMES
            .iter()
            .any(|junk| junk.eq_ignore_ascii_case(file_name))
            || file_name.starts_with(APPLE_DOUBLE_PREFIX)
        {
            return true;
        }

        if self.remove_comic_info && file_name.eq_ignore_ascii_case(COMIC_INFO) {
            return true;
        }

        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };
        self.extra_patterns.iter().any(|pattern| {
            pattern.matches_with(trimmed, options) || pattern.matches_with(file_name, options)
        })
    }
}
