use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;

use crate::section::SectionError;

/// Converts a document item's HTML into plain paginated-reader text.
///
/// Block elements become paragraphs separated by blank lines and headings
/// keep a markdown `#` prefix so the section title heuristic can find them.
/// Links contribute their text, images nothing. This is a line-oriented
/// reduction, not a typesetting pass; word wrap happens at render time.
pub struct HtmlToText {
    multi_space_re: Regex,
    multi_newline_re: Regex,
}

impl Default for HtmlToText {
    fn default() -> Self {
        HtmlToText::new()
    }
}

impl HtmlToText {
    pub fn new() -> Self {
        HtmlToText {
            multi_space_re: Regex::new(r"[ \t]+").expect("Failed to compile multi space regex"),
            multi_newline_re: Regex::new(r"\n{3,}").expect("Failed to compile multi newline regex"),
        }
    }

    pub fn convert(&self, html: &str) -> Result<String, SectionError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|e| SectionError::Parse(e.to_string()))?;

        let mut walker = Walker::default();
        walker.visit(&dom.document);
        walker.flush();

        let joined = walker.paragraphs.join("\n\n");
        let collapsed = self.multi_space_re.replace_all(&joined, " ");
        let collapsed = self.multi_newline_re.replace_all(&collapsed, "\n\n");
        Ok(collapsed.trim().to_string())
    }
}

#[derive(Default)]
struct Walker {
    paragraphs: Vec<String>,
    current: String,
}

impl Walker {
    /// Ends the paragraph being accumulated, dropping whitespace-only runs.
    fn flush(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            let lines: Vec<&str> = text.lines().map(str::trim).collect();
            self.paragraphs.push(lines.join("\n"));
        }
        self.current.clear();
    }

    fn visit(&mut self, node: &Handle) {
        match &node.data {
            NodeData::Document => self.visit_children(node),
            NodeData::Text { contents } => {
                let text = contents.borrow();
                let text = text.replace(['\n', '\r'], " ");
                if !text.trim().is_empty() || !self.current.is_empty() {
                    self.current.push_str(&text);
                }
            }
            NodeData::Element { name, .. } => {
                let tag = name.local.as_ref();
                match tag {
                    "head" | "script" | "style" | "img" | "svg" => {}
                    "br" => self.current.push('\n'),
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                        self.flush();
                        let level = tag[1..].parse::<usize>().unwrap_or(1);
                        self.current.push_str(&"#".repeat(level));
                        self.current.push(' ');
                        self.visit_children(node);
                        self.flush();
                    }
                    "p" | "div" | "li" | "blockquote" | "section" | "article" | "table"
                    | "tr" | "ul" | "ol" | "figure" | "pre" | "hr" => {
                        self.flush();
                        self.visit_children(node);
                        self.flush();
                    }
                    _ => self.visit_children(node),
                }
            }
            _ => {}
        }
    }

    fn visit_children(&mut self, node: &Handle) {
        for child in node.children.borrow().iter() {
            self.visit(child);
        }
    }
}
