use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::book::DocumentItem;
use crate::html_text::HtmlToText;

/// Why a document item was skipped during extraction. Never fatal: the
/// extractor logs the reason and moves on to the next item.
#[derive(Debug, Error)]
pub enum SectionError {
    #[error("content is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("failed to parse HTML: {0}")]
    Parse(String),
}

/// A normalized document section: converted text, resolved title and a
/// back-reference to the preceding section's title. The parent link is a
/// flat previous-sibling chain used only for display context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub content: String,
    pub title: String,
    pub parent: Option<String>,
}

/// How many leading non-empty lines are scanned for a markdown heading.
const HEADING_SCAN_LINES: usize = 5;

/// Turns raw document items into ordered sections.
///
/// A bad item (undecodable bytes, unparseable markup) is skipped with a
/// warning; one broken chapter must never take the whole book down. The
/// previous successfully extracted title is threaded through as an explicit
/// accumulator to build the parent chain.
pub fn extract(items: &[DocumentItem]) -> Vec<Section> {
    let converter = HtmlToText::new();
    let mut sections = Vec::with_capacity(items.len());
    let mut previous_title: Option<String> = None;

    for item in items {
        let content = match convert_item(&converter, item) {
            Ok(content) => content,
            Err(err) => {
                warn!("Couldn't process section {:?}: {err}", item.file_name);
                continue;
            }
        };
        let title = resolve_title(item, &content);
        sections.push(Section {
            content,
            title: title.clone(),
            parent: previous_title.replace(title),
        });
    }
    sections
}

fn convert_item(converter: &HtmlToText, item: &DocumentItem) -> Result<String, SectionError> {
    let html = String::from_utf8(item.raw_content.clone())?;
    converter.convert(&html)
}

/// Ordered title strategies; the first one that produces a title wins.
fn resolve_title(item: &DocumentItem, content: &str) -> String {
    declared_title(item)
        .or_else(|| heading_title(content))
        .unwrap_or_else(|| file_name_title(&item.file_name))
}

fn declared_title(item: &DocumentItem) -> Option<String> {
    item.declared_title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

fn heading_title(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(HEADING_SCAN_LINES)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

fn file_name_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    stem.replace('_', " ").trim().to_string()
}
