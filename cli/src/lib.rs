//! Dictionary lookup glue around the `wordcache` store
//!
//! Fetches suggestions for a word, previews their translations through the
//! cache, and renders the result as launcher XML.

pub mod cachekey;
pub mod config;
pub mod items;
pub mod lookup;

pub use cachekey::{CacheKey, Language};
pub use config::Config;
pub use items::{render_items, Item};
pub use lookup::{
    cached_translation, fetch_suggestions, preview_all, DictTranslator, LookupError,
    PreviewOptions, Suggestion, Translator,
};

use wordcache::KeyValueStore;

/// Launcher items for `suggestions`, with previews from the cache or `translator`
pub async fn lookup_items<S, T>(
    store: &S,
    translator: &T,
    suggestions: &[Suggestion],
    opts: PreviewOptions,
) -> Vec<Item>
where
    S: KeyValueStore,
    T: Translator,
{
    let previews = preview_all(store, translator, suggestions, opts).await;
    suggestions
        .iter()
        .zip(previews)
        .map(|(s, preview)| Item::for_word(&s.word, preview, s.lang))
        .collect()
}
