//! Command-line configuration

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

use crate::lookup::PreviewOptions;

pub const BUNDLE_ID: &str = "alfred2-dictcc-lookup";
pub const VOLATILE_DIR: &str = "Library/Caches/com.runningwithcrayons.Alfred-2/Workflow Data";
pub const NON_VOLATILE_DIR: &str = "Library/Application Support/Alfred 2/Workflow Data";
pub const STORE_FILE: &str = "cache.json";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Look up dict.cc translations, caching previews on disk")]
pub struct Config {
    /// Word to translate
    #[arg(long, default_value = "")]
    pub word: String,

    /// Timeout for preview requests, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub timeout: u64,

    /// Maximum number of concurrent preview requests (0 for unlimited)
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Keep the cache in the launcher's volatile cache location
    #[arg(long)]
    pub volatile_store: bool,

    /// Directory for the cache file, overriding the launcher locations
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// The query, trimmed and in NFC
    ///
    /// Launchers may pass decomposed text; "Käse" typed either way must
    /// reach the same cache entry and dictionary page.
    #[must_use]
    pub fn word(&self) -> String {
        self.word.trim().nfc().collect()
    }

    #[must_use]
    pub fn preview_options(&self) -> PreviewOptions {
        PreviewOptions {
            timeout: Duration::from_millis(self.timeout),
            max_concurrent: self.max_concurrent,
        }
    }

    /// Directory holding the store file
    ///
    /// Returns `None` if no `--cache-dir` was given and `home` is unknown.
    #[must_use]
    pub fn store_dir(&self, home: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        let base = if self.volatile_store {
            VOLATILE_DIR
        } else {
            NON_VOLATILE_DIR
        };
        home.map(|home| home.join(base).join(BUNDLE_ID))
    }
}
