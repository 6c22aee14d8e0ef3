//! Cache keys for translation previews
//!
//! A key is `"<code>|<lowercased word>"`. Language codes are pure digits, so
//! the first `|` always ends the code and a word containing `|` cannot make
//! two (language, word) pairs collide.

use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Dictionary direction, as numbered by the autosuggest endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// German headword, English translations
    DeEn,
    /// English headword, German translations
    EnDe,
}

impl Language {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::DeEn => 1,
            Self::EnDe => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Self::DeEn),
            "2" => Some(Self::EnDe),
            _ => None,
        }
    }

    /// Dictionary page for `word`, with `word` form-escaped
    #[must_use]
    pub fn page_url(self, word: &str) -> String {
        let escaped: String = url::form_urlencoded::byte_serialize(word.as_bytes()).collect();
        match self {
            Self::DeEn => format!("http://www.dict.cc/deutsch-englisch/{escaped}.html"),
            Self::EnDe => format!("http://www.dict.cc/englisch-deutsch/{escaped}.html"),
        }
    }

    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::DeEn => "Icons/de.png",
            Self::EnDe => "Icons/en.png",
        }
    }
}

/// Store key for the translations of one word in one direction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `word` in direction `lang`; the word is NFC-normalized and
    /// lowercased
    #[must_use]
    pub fn new(lang: Language, word: &str) -> Self {
        let word: String = word.nfc().collect();
        Self(format!("{}|{}", lang.code(), word.to_lowercase()))
    }

    /// Split a key back into its language and (lowercased) word
    #[must_use]
    pub fn parse(key: &str) -> Option<(Language, &str)> {
        let (code, word) = key.split_once('|')?;
        Some((Language::from_code(code)?, word))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
