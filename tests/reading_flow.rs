//! End-to-end checks of extraction, pagination and navigation working
//! together through the public API, without a terminal.

use lectern::book::{DocumentItem, Metadata};
use lectern::navigation::{NavCommand, Position};
use lectern::pagination::{NO_CONTENT_MARKER, Paginator};
use lectern::reader::Reader;
use lectern::section;

const VIEWPORT: (u16, u16) = (60, 8);

fn item(html: &str, title: Option<&str>, file_name: &str) -> DocumentItem {
    DocumentItem {
        raw_content: html.as_bytes().to_vec(),
        declared_title: title.map(str::to_string),
        file_name: file_name.to_string(),
    }
}

fn sample_items() -> Vec<DocumentItem> {
    vec![
        item(
            "<h1>Prologue</h1><p>It begins.</p><p>Slowly at first.</p>",
            None,
            "prologue.xhtml",
        ),
        item(
            "<p>A considerably longer chapter paragraph that needs several lines \
             once wrapped into a narrow terminal viewport, followed by more.</p>\
             <p>Another paragraph.</p><p>And another one after it.</p>\
             <p>Plus a fourth to force a second page.</p>",
            Some("Chapter One"),
            "ch1.xhtml",
        ),
        item("<p>The end.</p>", None, "the_end.xhtml"),
    ]
}

fn sample_book() -> Reader {
    let sections = section::extract(&sample_items());
    assert_eq!(sections.len(), 3);
    let mut reader = Reader::from_parts(Metadata::new(), sections);
    reader.ensure_pages(VIEWPORT.0, VIEWPORT.1);
    reader
}

#[test]
fn next_page_visits_every_position_once_in_document_order() {
    let mut reader = sample_book();
    let mut visited = vec![reader.position()];
    while reader.navigate(NavCommand::NextPage, VIEWPORT) {
        let position = reader.position();
        assert!(
            !visited.contains(&position),
            "position {position:?} visited twice"
        );
        let last = *visited.last().unwrap();
        assert!(
            position.section > last.section
                || (position.section == last.section && position.page == last.page + 1),
            "walk left document order: {last:?} -> {position:?}"
        );
        visited.push(position);
    }

    // Every page of every section was visited, nothing skipped.
    let paginator = Paginator::default();
    let total_pages: usize = section::extract(&sample_items())
        .iter()
        .map(|s| paginator.paginate(&s.content, VIEWPORT.0, VIEWPORT.1).len())
        .sum();
    assert_eq!(visited.len(), total_pages);

    // Walked the whole book: at the final page of the final section, and
    // stuck there.
    let end = reader.position();
    assert_eq!(end.section, 2);
    assert!(!reader.navigate(NavCommand::NextPage, VIEWPORT));
    assert_eq!(reader.position(), end);

    // The same walk backwards retraces every position.
    let mut backwards = vec![reader.position()];
    while reader.navigate(NavCommand::PrevPage, VIEWPORT) {
        backwards.push(reader.position());
    }
    backwards.reverse();
    assert_eq!(backwards, visited);
}

#[test]
fn jump_end_then_jump_start_lands_on_the_first_page() {
    let mut reader = sample_book();
    assert!(reader.navigate(NavCommand::JumpEnd, VIEWPORT));
    assert!(reader.position().section == 2);
    assert!(reader.navigate(NavCommand::JumpStart, VIEWPORT));
    assert_eq!(reader.position(), Position { section: 0, page: 0 });
}

#[test]
fn titles_resolve_from_heading_declared_title_and_file_name() {
    let items = vec![
        item("<p>hello</p>", Some("Ch1"), "x.html"),
        item("<h1>Intro</h1><p>body</p>", None, "y.html"),
        item("<p>plain</p>", None, "part_two.html"),
    ];
    let sections = section::extract(&items);
    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Ch1", "Intro", "part two"]);
    assert_eq!(sections[1].parent.as_deref(), Some("Ch1"));
}

#[test]
fn empty_section_paginates_to_the_placeholder_page() {
    let pages = Paginator::default().paginate("", VIEWPORT.0, VIEWPORT.1);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].text, NO_CONTENT_MARKER);
}

#[test]
fn section_content_survives_the_full_pipeline() {
    let reader = sample_book();
    // First section: heading plus two paragraphs, blank-line separated.
    assert!(reader.current_pages()[0].text.starts_with("# Prologue"));
    assert!(
        reader
            .current_pages()
            .iter()
            .any(|page| page.text.contains("Slowly at first."))
    );
}
