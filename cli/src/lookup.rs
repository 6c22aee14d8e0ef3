//! Suggestions and cached translation previews
//!
//! ```text
//! word ──> fetch_suggestions ──> [Suggestion]
//!                                     │ preview_all (at most N in flight)
//!                                     ▼
//!                          cached_translation
//!                           │ hit: Datastore.get
//!                           │ miss: Translator (with timeout) ──> Datastore.set
//!                           ▼
//!                      preview string
//! ```

use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use wordcache::KeyValueStore;

use crate::cachekey::{CacheKey, Language};

pub const SUGGEST_URL: &str = "http://www.dict.cc/inc/ajax_autosuggest.php";

/// Separator between translations in a preview
pub const PREVIEW_SEPARATOR: &str = " · ";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed suggestion line: {0:?}")]
    MalformedSuggestion(String),
}

/// One line of the autosuggest response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub lang: Language,
}

/// Parse an autosuggest response body
///
/// The body is one `word<TAB>code` pair per line. Trailing newlines and
/// spaces are ignored; an empty body means no suggestions.
///
/// # Errors
///
/// Returns `LookupError::MalformedSuggestion` for a line without a known
/// language code.
pub fn parse_suggestions(body: &str) -> Result<Vec<Suggestion>, LookupError> {
    let body = body.trim_end_matches(|c: char| c == '\n' || c == ' ');
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split('\n')
        .map(|line| {
            let mut fields = line.split('\t');
            let word = fields.next().unwrap_or_default();
            fields
                .next()
                .and_then(Language::from_code)
                .map(|lang| Suggestion {
                    word: word.to_string(),
                    lang,
                })
                .ok_or_else(|| LookupError::MalformedSuggestion(line.to_string()))
        })
        .collect()
}

/// Ask the autosuggest endpoint for words matching `word`
///
/// # Errors
///
/// Returns `LookupError::Http` on transport or status errors, and
/// `LookupError::MalformedSuggestion` if the response does not parse.
pub async fn fetch_suggestions(
    client: &reqwest::Client,
    word: &str,
) -> Result<Vec<Suggestion>, LookupError> {
    let body = client
        .post(SUGGEST_URL)
        .form(&[("s", word)])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_suggestions(&body)
}

/// Source of translations for a word
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        word: &str,
        lang: Language,
    ) -> impl Future<Output = Result<Vec<String>, LookupError>> + Send;
}

/// Scrapes translations from the dictionary web page
#[derive(Debug, Clone, Default)]
pub struct DictTranslator {
    client: reqwest::Client,
}

impl DictTranslator {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Translator for DictTranslator {
    async fn translate(&self, word: &str, lang: Language) -> Result<Vec<String>, LookupError> {
        let html = self
            .client
            .get(lang.page_url(word))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(extract_translations(&html))
    }
}

/// Text of the links in the first `<dd>` of a dictionary page
#[must_use]
pub fn extract_translations(html: &str) -> Vec<String> {
    let (Ok(dd), Ok(link)) = (
        scraper::Selector::parse("dd"),
        scraper::Selector::parse("a"),
    ) else {
        return Vec::new();
    };
    let document = scraper::Html::parse_document(html);
    document
        .select(&dd)
        .next()
        .map(|first| {
            first
                .select(&link)
                .map(|a| a.text().collect::<String>())
                .collect()
        })
        .unwrap_or_default()
}

/// Translations of `word`, from the cache or else from `translator`
///
/// A fresh lookup that succeeds is stored, even when it found nothing.
/// A lookup that fails or exceeds `timeout` yields an empty preview and is
/// not stored, so the next query tries again.
pub async fn cached_translation<S, T>(
    store: &S,
    translator: &T,
    word: &str,
    lang: Language,
    timeout: Duration,
) -> String
where
    S: KeyValueStore,
    T: Translator,
{
    let key = CacheKey::new(lang, word);
    match store.get(key.as_str()).await {
        Ok(preview) => return preview,
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!("lookup: cache read for {key} failed: {e}"),
    }

    let fetched = match tokio::time::timeout(timeout, translator.translate(word, lang)).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout(timeout)),
    };
    match fetched {
        Ok(translations) => {
            let preview = translations.join(PREVIEW_SEPARATOR);
            if let Err(e) = store.set(key.as_str(), &preview).await {
                warn!("lookup: cache write for {key} failed: {e}");
            }
            preview
        }
        Err(e) => {
            debug!("lookup: no preview for {key}: {e}");
            String::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    pub timeout: Duration,
    /// Lookups in flight at once; 0 means no limit
    pub max_concurrent: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_concurrent: 4,
        }
    }
}

/// Preview every suggestion, keeping the suggestion order
pub async fn preview_all<S, T>(
    store: &S,
    translator: &T,
    suggestions: &[Suggestion],
    opts: PreviewOptions,
) -> Vec<String>
where
    S: KeyValueStore,
    T: Translator,
{
    let limit = match opts.max_concurrent {
        0 => suggestions.len().max(1),
        n => n,
    };
    futures::stream::iter(suggestions)
        .map(|s| cached_translation(store, translator, &s.word, s.lang, opts.timeout))
        .buffered(limit)
        .collect()
        .await
}
