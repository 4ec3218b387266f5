//! Content normalization: ordered fragments to an output representation.
//!
//! Pure and deterministic by contract: output depends only on the
//! fragment sequence and the requested format.

use crate::types::fragment::Fragment;
use crate::types::result::OutputFormat;

/// Render a fragment sequence in the requested format.
///
/// Empty fragments are dropped; relative ordering of the rest is
/// preserved exactly.
pub fn normalize(fragments: &[Fragment], format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => to_html(fragments),
        OutputFormat::Markdown => to_markdown(fragments),
        OutputFormat::Plaintext => to_plaintext(fragments),
    }
}

/// Minimal markup: `<p>` per text run, bare `<img>` per image, original
/// order. No scripts, styles, or extra attributes.
fn to_html(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments.iter().filter(|f| !f.is_empty()) {
        match fragment {
            Fragment::Text { value } => {
                out.push_str("<p>");
                out.push_str(&escape_html(value));
                out.push_str("</p>");
            }
            Fragment::Image { src, alt } => {
                out.push_str("<img src=\"");
                out.push_str(&escape_attr(src));
                out.push_str("\" alt=\"");
                out.push_str(&escape_attr(alt));
                out.push_str("\">");
            }
        }
    }
    out
}

/// Paragraphs separated by blank lines; `![alt](url)` images inline at
/// their original position.
fn to_markdown(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .filter(|f| !f.is_empty())
        .map(|fragment| match fragment {
            Fragment::Text { value } => value.clone(),
            Fragment::Image { src, alt } => format!("![{}]({})", alt, src),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Newline-joined text runs; images are dropped without a placeholder.
fn to_plaintext(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .filter_map(|fragment| match fragment {
            Fragment::Text { value } if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_html(s).replace('"', "&quot;")
}
