//! Launcher result items and their XML rendering

use crate::cachekey::Language;

/// One result row for the launcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub uid: Option<String>,
    pub arg: Option<String>,
    pub autocomplete: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
}

impl Item {
    /// Item for a suggested word and its translation preview
    ///
    /// Activating the item opens the dictionary page for the word.
    #[must_use]
    pub fn for_word(word: &str, preview: String, lang: Language) -> Self {
        Self {
            title: word.to_string(),
            subtitle: Some(preview).filter(|p| !p.is_empty()),
            icon: Some(lang.icon().to_string()),
            arg: Some(lang.page_url(word)),
            ..Self::default()
        }
    }
}

/// Render items as the launcher's XML feedback document
#[must_use]
pub fn render_items(items: &[Item]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<items>\n");
    for item in items {
        write_item(&mut out, item);
    }
    out.push_str("</items>\n");
    out
}

fn write_item(out: &mut String, item: &Item) {
    out.push_str("    <item");
    for (name, value) in [
        ("uid", &item.uid),
        ("arg", &item.arg),
        ("autocomplete", &item.autocomplete),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
    }
    out.push_str(">\n");

    out.push_str(&format!("        <title>{}</title>\n", escape(&item.title)));
    for (name, value) in [("subtitle", &item.subtitle), ("icon", &item.icon)] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("        <{name}>{}</{name}>\n", escape(value)));
        }
    }
    out.push_str("    </item>\n");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&#34;c&#39;");
        assert_eq!(escape("hallo · servus"), "hallo · servus");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(render_items(&[]), "<?xml version=\"1.0\"?>\n<items>\n</items>\n");
    }

    #[test]
    fn test_item_for_word() {
        let item = Item::for_word("hello", "hallo · servus".to_string(), Language::EnDe);
        assert_eq!(item.title, "hello");
        assert_eq!(item.subtitle.as_deref(), Some("hallo · servus"));
        assert_eq!(item.icon.as_deref(), Some("Icons/en.png"));
        assert_eq!(
            item.arg.as_deref(),
            Some("http://www.dict.cc/englisch-deutsch/hello.html")
        );
        assert!(item.uid.is_none());
    }

    #[test]
    fn test_render_omits_empty_fields() {
        let item = Item::for_word("Tom & Jerry", String::new(), Language::DeEn);
        let xml = render_items(&[item]);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\"?>\n<items>\n    \
             <item arg=\"http://www.dict.cc/deutsch-englisch/Tom+%26+Jerry.html\">\n        \
             <title>Tom &amp; Jerry</title>\n        \
             <icon>Icons/de.png</icon>\n    \
             </item>\n</items>\n"
        );
    }

    #[test]
    fn test_render_all_fields() {
        let item = Item {
            uid: Some("u1".to_string()),
            arg: Some("a&b".to_string()),
            autocomplete: Some("hel".to_string()),
            title: "hello".to_string(),
            subtitle: Some("<hallo>".to_string()),
            icon: Some("Icons/en.png".to_string()),
        };
        assert_eq!(
            render_items(&[item]),
            "<?xml version=\"1.0\"?>\n<items>\n    \
             <item uid=\"u1\" arg=\"a&amp;b\" autocomplete=\"hel\">\n        \
             <title>hello</title>\n        \
             <subtitle>&lt;hallo&gt;</subtitle>\n        \
             <icon>Icons/en.png</icon>\n    \
             </item>\n</items>\n"
        );
    }
}
