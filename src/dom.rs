//! Selector application and fragment collection over parsed HTML.
//!
//! `scraper::Html` is `!Send`, so everything here is synchronous: parse,
//! extract, and drop the DOM inside one call. Callers hold only owned
//! results across await points, keeping the crate's futures `Send`.

use std::collections::HashSet;

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::types::fragment::Fragment;

/// A parsed document plus the base URL used to absolutize links.
pub struct Dom {
    html: Html,
    base: Option<Url>,
}

impl Dom {
    /// Parse a document. `base_url` is used to resolve relative image
    /// sources; an unparseable base simply disables resolution.
    pub fn parse(html: &str, base_url: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            base: Url::parse(base_url).ok(),
        }
    }

    /// Number of nodes a selector matches, or `None` if the selector
    /// expression itself is invalid.
    pub fn match_count(&self, selector: &str) -> Option<usize> {
        let sel = Selector::parse(selector).ok()?;
        Some(self.html.select(&sel).count())
    }

    /// First non-empty text produced by a selector.
    ///
    /// Understands the common metadata shapes: `<meta>` elements yield
    /// their `content` attribute, `<time>` prefers `datetime`, `<img>`
    /// yields its resolved `src`.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;

        for el in self.html.select(&sel) {
            let value = match el.value().name() {
                "meta" => el.value().attr("content").map(str::to_string),
                "time" => el
                    .value()
                    .attr("datetime")
                    .map(str::to_string)
                    .or_else(|| Some(element_text(el))),
                "img" => el
                    .value()
                    .attr("src")
                    .map(|src| self.absolutize(src)),
                _ => Some(element_text(el)),
            };

            if let Some(value) = value {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }

        None
    }

    /// Collect ordered fragments from every container a selector
    /// matches, walking in document order and preserving the
    /// interleaving of text runs and inline images.
    ///
    /// A matched element nested inside another matched element is
    /// skipped so its content is not emitted twice.
    pub fn collect_fragments(&self, selector: &str) -> Vec<Fragment> {
        let sel = match Selector::parse(selector) {
            Ok(sel) => sel,
            Err(_) => return Vec::new(),
        };

        let matched: Vec<ElementRef> = self.html.select(&sel).collect();
        let matched_ids: HashSet<_> = matched.iter().map(|el| el.id()).collect();

        let mut fragments = Vec::new();
        for el in matched {
            if el.ancestors().any(|a| matched_ids.contains(&a.id())) {
                continue;
            }
            self.fragments_from_element(el, &mut fragments);
        }

        fragments
    }

    /// Total visible text length of the document, scripts and styles
    /// excluded. Drives the static-to-rendered escalation heuristic.
    pub fn visible_text_len(&self) -> usize {
        let mut len = 0;
        for node in self.html.root_element().descendants() {
            if let Node::Text(text) = node.value() {
                if text_is_rendered(node.parent().map(|p| p.value())) {
                    len += text.split_whitespace().map(str::len).sum::<usize>();
                }
            }
        }
        len
    }

    /// The document title, if present and non-empty.
    pub fn title(&self) -> Option<String> {
        self.first_text("title")
    }

    /// The meta description, falling back to `og:description`.
    pub fn meta_description(&self) -> Option<String> {
        self.first_text(r#"meta[name="description"]"#)
            .or_else(|| self.first_text(r#"meta[property="og:description"]"#))
    }

    fn absolutize(&self, src: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        }
    }

    fn fragments_from_element(&self, el: ElementRef, out: &mut Vec<Fragment>) {
        if el.value().name() == "img" {
            self.push_image(el.value().attr("src"), el.value().attr("alt"), out);
            return;
        }

        let mut buf = String::new();
        for node in el.descendants() {
            match node.value() {
                Node::Text(text) => {
                    if text_is_rendered(node.parent().map(|p| p.value())) {
                        buf.push_str(text);
                        buf.push(' ');
                    }
                }
                Node::Element(element) if element.name() == "img" => {
                    flush_text(&mut buf, out);
                    self.push_image(element.attr("src"), element.attr("alt"), out);
                }
                // Block boundaries start a new fragment, so paragraphs
                // stay separate even when the selector matched a single
                // wrapping container
                Node::Element(element) if is_block_element(element.name()) => {
                    flush_text(&mut buf, out);
                }
                _ => {}
            }
        }
        flush_text(&mut buf, out);
    }

    fn push_image(&self, src: Option<&str>, alt: Option<&str>, out: &mut Vec<Fragment>) {
        if let Some(src) = src.filter(|s| !s.is_empty()) {
            out.push(Fragment::image(
                self.absolutize(src),
                alt.unwrap_or_default(),
            ));
        }
    }
}

/// Whether a text node under this parent would actually render (not
/// script/style content).
fn text_is_rendered(parent: Option<&Node>) -> bool {
    match parent.and_then(Node::as_element) {
        Some(element) => !matches!(element.name(), "script" | "style" | "noscript"),
        None => true,
    }
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "li"
            | "ul"
            | "ol"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "figure"
            | "figcaption"
            | "table"
            | "tr"
    )
}

fn flush_text(buf: &mut String, out: &mut Vec<Fragment>) {
    let collapsed = buf.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        out.push(Fragment::text(collapsed));
    }
    buf.clear();
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text length of a raw document, for escalation decisions.
/// Parses and drops the DOM in one call so callers stay `Send`.
pub fn visible_text_len(html: &str, base_url: &str) -> usize {
    Dom::parse(html, base_url).visible_text_len()
}

/// Strip scripts, styles, and comments from markup and collapse
/// whitespace, truncating to `max_len` characters. This is what gets
/// shipped to the AI service as the page structure summary.
pub fn clean_for_summary(html: &str, max_len: usize) -> String {
    let script = regex::Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    let style = regex::Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    let svg = regex::Regex::new(r"(?is)<svg[^>]*>.*?</svg>").unwrap();
    let comment = regex::Regex::new(r"(?s)<!--.*?-->").unwrap();

    let cleaned = script.replace_all(html, "");
    let cleaned = style.replace_all(&cleaned, "");
    let cleaned = svg.replace_all(&cleaned, "");
    let cleaned = comment.replace_all(&cleaned, "");

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_len)
}

/// Selector ladders for common article markup, used when no template
/// can be trained. Tried in order; the first matching selector wins.
pub fn heuristic_ladders() -> IndexMap<String, Vec<String>> {
    let mut ladders = IndexMap::new();
    ladders.insert(
        "title".to_string(),
        vec![
            "h1[class*=\"title\"]".to_string(),
            "h1[class*=\"headline\"]".to_string(),
            ".article-title".to_string(),
            ".post-title".to_string(),
            "h1".to_string(),
        ],
    );
    ladders.insert(
        "author".to_string(),
        vec![
            ".author".to_string(),
            ".byline".to_string(),
            "[rel=\"author\"]".to_string(),
            "[class*=\"author\"]".to_string(),
        ],
    );
    ladders.insert(
        "date".to_string(),
        vec![
            "time".to_string(),
            ".publish-date".to_string(),
            ".date".to_string(),
            "[class*=\"date\"]".to_string(),
        ],
    );
    ladders.insert(
        "content".to_string(),
        vec![
            ".article-content".to_string(),
            ".post-content".to_string(),
            ".entry-content".to_string(),
            "article".to_string(),
            ".content".to_string(),
        ],
    );
    ladders
}

/// Whether a selector is more specific than a bare tag (class, id, or
/// attribute qualified). Bare tag selectors generalize worse and score
/// lower when ambiguous.
pub fn is_specific_selector(selector: &str) -> bool {
    selector.contains('.') || selector.contains('#') || selector.contains('[')
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
