//! Minimal RSS 2.0 item parser.
//!
//! The Yahoo headline feed is flat and well-formed enough that pulling the
//! handful of fields we need out of each `<item>` with regexes is sufficient.

use std::sync::LazyLock;

use regex::Regex;

/// One `<item>` of an RSS channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("item regex"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").expect("title regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link\b[^>]*>(.*?)</link>").expect("link regex"));

static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description\b[^>]*>(.*?)</description>").expect("description regex")
});

static PUB_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pubDate\b[^>]*>(.*?)</pubDate>").expect("pubDate regex"));

static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("entity regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse every `<item>` in `xml`. Items without a link are skipped.
pub fn parse_rss_items(xml: &str) -> Vec<RssItem> {
    ITEM_RE
        .captures_iter(xml)
        .filter_map(|cap| {
            let block = cap.get(1)?.as_str();
            let link = field(&LINK_RE, block)?;
            if link.is_empty() {
                return None;
            }
            Some(RssItem {
                title: field(&TITLE_RE, block).unwrap_or_else(|| "Untitled".to_string()),
                link,
                description: field(&DESCRIPTION_RE, block).unwrap_or_default(),
                pub_date: field(&PUB_DATE_RE, block).filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

fn field(re: &Regex, block: &str) -> Option<String> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
}

/// Unwrap CDATA, decode entities, drop markup and collapse whitespace.
fn clean_text(raw: &str) -> String {
    let unwrapped = CDATA_RE.replace_all(raw, "$1");
    let decoded = decode_entities(&unwrapped);
    let stripped = TAG_RE.replace_all(&decoded, " ");
    WHITESPACE_RE.replace_all(stripped.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
