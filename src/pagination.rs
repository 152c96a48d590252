use unicode_width::UnicodeWidthStr;

/// Placeholder shown for sections that carry no renderable text.
pub const NO_CONTENT_MARKER: &str = "[No content]";

/// A viewport-sized slice of a section's paragraphs, pre-joined for rendering.
///
/// Pages are derived data: they are recomputed from the owning section
/// whenever the active section or the viewport size changes, and are never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
}

impl Page {
    fn from_paragraphs(paragraphs: &[&str]) -> Self {
        Page {
            text: paragraphs.join("\n\n"),
        }
    }
}

/// Greedy line-budget packer that splits section text into pages.
///
/// The two constants are tuning parameters for the line estimate, not part
/// of the pagination contract: `wrap_margin` accounts for panel borders and
/// horizontal padding, `paragraph_overhead` for the blank separator line and
/// word-wrap slack. Pagination correctness holds for any values.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    pub wrap_margin: u16,
    pub paragraph_overhead: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Paginator {
            wrap_margin: 10,
            paragraph_overhead: 2,
        }
    }
}

impl Paginator {
    /// Splits `content` into pages that fit a `width` x `height` viewport.
    ///
    /// Pure and deterministic: the same inputs always produce the same page
    /// sequence. Non-empty content always yields at least one page and no
    /// paragraph is ever dropped or duplicated; a single paragraph taller
    /// than the whole viewport becomes its own oversized page rather than
    /// being split.
    pub fn paginate(&self, content: &str, width: u16, height: u16) -> Vec<Page> {
        if content.is_empty() {
            return vec![Page {
                text: NO_CONTENT_MARKER.to_string(),
            }];
        }

        let budget = height as usize;
        let mut pages = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_lines = 0usize;

        for paragraph in content.split("\n\n") {
            let lines = self.estimate_lines(paragraph, width);
            if current_lines + lines > budget {
                if current.is_empty() {
                    // Lone paragraph exceeding the full budget: flush unsplit.
                    pages.push(Page {
                        text: paragraph.to_string(),
                    });
                    current_lines = 0;
                } else {
                    pages.push(Page::from_paragraphs(&current));
                    current.clear();
                    current.push(paragraph);
                    current_lines = lines;
                }
            } else {
                current.push(paragraph);
                current_lines += lines;
            }
        }

        if !current.is_empty() {
            pages.push(Page::from_paragraphs(&current));
        }

        if pages.is_empty() {
            pages.push(Page {
                text: NO_CONTENT_MARKER.to_string(),
            });
        }
        pages
    }

    /// Estimates how many terminal rows a paragraph occupies after word wrap.
    fn estimate_lines(&self, paragraph: &str, width: u16) -> usize {
        let columns = width.saturating_sub(self.wrap_margin).max(1) as usize;
        let wrapped = paragraph.width().div_ceil(columns);
        wrapped + paragraph.matches('\n').count() + self.paragraph_overhead
    }
}
