use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::ai::CompletionClient;
use crate::book::{EpubSource, Metadata};
use crate::event_source::{Event, EventSource, KeyCode};
use crate::navigation::{NavCommand, Navigator, PageMap, Position};
use crate::pagination::{Page, Paginator};
use crate::section::{self, Section};
use crate::tts::{self, SpeechSynthesizer};

/// Terminal rows taken by chrome around the content panel (header, footer,
/// borders, padding). Subtracted from the frame height to get the page
/// budget handed to the paginator.
const CHROME_ROWS: u16 = 10;

const ASK_SYSTEM_PROMPT: &str =
    "You are an expert reading assistant analyzing a book. Keep responses clear and concise.";

const HELP_LINE: &str =
    "←(h) →(l) • ↑(k) ↓(j) • TOC(t) • Summarize(s) • Ask AI(a) • Read(r) • Guide(>) • Quit(q)";

/// Lazy page-count view over the section list, used for navigation bounds.
struct BookPages<'a> {
    sections: &'a [Section],
    paginator: &'a Paginator,
    width: u16,
    height: u16,
}

impl PageMap for BookPages<'_> {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn page_count(&self, section_index: usize) -> usize {
        self.paginator
            .paginate(&self.sections[section_index].content, self.width, self.height)
            .len()
    }
}

/// The reader application: owns the section list, the navigation state and
/// the pages derived for the active section, and drives the key loop.
///
/// The AI and audio collaborators come in as trait objects so the whole
/// loop runs against mocks in tests.
pub struct Reader {
    metadata: Metadata,
    sections: Vec<Section>,
    paginator: Paginator,
    navigator: Navigator,
    pages: Vec<Page>,
    paginated_for: Option<(usize, u16, u16)>,
    status: Option<String>,
    should_quit: bool,
}

impl Reader {
    pub fn open(path: &Path) -> Result<Self> {
        let source = EpubSource::open(path)?;
        let sections = section::extract(&source.items);
        info!("Extracted {} sections", sections.len());
        Ok(Reader::from_parts(source.metadata, sections))
    }

    pub fn from_parts(metadata: Metadata, sections: Vec<Section>) -> Self {
        Reader {
            metadata,
            sections,
            paginator: Paginator::default(),
            navigator: Navigator::new(),
            pages: Vec::new(),
            paginated_for: None,
            status: None,
            should_quit: false,
        }
    }

    pub fn position(&self) -> Position {
        self.navigator.position()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn current_pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Applies a navigation command against the given content viewport,
    /// re-deriving pages when the section changed. Returns whether the
    /// position moved; a boundary hit is a complete no-op.
    pub fn navigate(&mut self, command: NavCommand, viewport: (u16, u16)) -> bool {
        let (width, height) = viewport;
        let moved = {
            let map = BookPages {
                sections: &self.sections,
                paginator: &self.paginator,
                width,
                height,
            };
            self.navigator.apply(command, &map)
        };
        if moved {
            self.status = None;
            self.ensure_pages(width, height);
        }
        moved
    }

    /// Re-paginates the active section if the section or viewport changed
    /// since the last derivation, then clamps the page index back into
    /// range. Idempotent for unchanged inputs.
    pub fn ensure_pages(&mut self, width: u16, height: u16) {
        let section_index = self.navigator.position().section;
        if self.paginated_for == Some((section_index, width, height)) {
            return;
        }
        {
            let map = BookPages {
                sections: &self.sections,
                paginator: &self.paginator,
                width,
                height,
            };
            self.navigator.clamp(&map);
        }
        let position = self.navigator.position();
        self.pages = match self.sections.get(position.section) {
            Some(section) => self.paginator.paginate(&section.content, width, height),
            None => Vec::new(),
        };
        self.paginated_for = Some((position.section, width, height));
    }

    /// Book metadata, current hierarchical location and page text, the
    /// prompt context handed to the AI collaborator.
    pub fn location_context(&self) -> String {
        let mut book_info = Vec::new();
        for key in ["title", "author"] {
            if let Some(value) = self.metadata.get(key).and_then(|values| values.first()) {
                let label = if key == "title" { "Title" } else { "Author" };
                book_info.push(format!("{label}: {value}"));
            }
        }

        let position = self.navigator.position();
        let hierarchy = match self.sections.get(position.section) {
            Some(section) => match &section.parent {
                Some(parent) => format!("{parent} > {}", section.title),
                None => section.title.clone(),
            },
            None => String::new(),
        };
        let page_text = self
            .pages
            .get(position.page)
            .map(|page| page.text.as_str())
            .unwrap_or_default();

        format!(
            "Book Information: {}\n\nLocation: Section: {hierarchy}\nPage: {} of {}\n\nContent:\n{page_text}",
            book_info.join(" | "),
            position.page + 1,
            self.pages.len().max(1),
        )
    }

    /// Foreground loop: draw, block on the next key, apply. Collaborator
    /// features run as nested loops and always come back here with the
    /// navigation state they found.
    pub fn run<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
        speech: &dyn SpeechSynthesizer,
    ) -> Result<()> {
        while !self.should_quit {
            let viewport = self.content_viewport(terminal)?;
            self.ensure_pages(viewport.0, viewport.1);
            terminal.draw(|frame| self.draw(frame))?;

            match events.read()? {
                Event::Key(key) => {
                    self.handle_key(key.code, viewport, terminal, events, ai, speech)?;
                }
                Event::Resize(..) => {
                    // Next pass re-derives pages for the new viewport.
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn content_viewport<B: Backend<Error: Send + Sync + 'static>>(&self, terminal: &Terminal<B>) -> Result<(u16, u16)> {
        let size = terminal.size()?;
        Ok((size.width, size.height.saturating_sub(CHROME_ROWS).max(1)))
    }

    fn handle_key<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        code: KeyCode,
        viewport: (u16, u16),
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
        speech: &dyn SpeechSynthesizer,
    ) -> Result<()> {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::Left => {
                self.navigate(NavCommand::PrevSection, viewport);
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.navigate(NavCommand::NextSection, viewport);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.navigate(NavCommand::NextPage, viewport);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.navigate(NavCommand::PrevPage, viewport);
            }
            KeyCode::Char('g') => {
                self.navigate(NavCommand::JumpStart, viewport);
            }
            KeyCode::Char('G') => {
                self.navigate(NavCommand::JumpEnd, viewport);
            }
            KeyCode::Char('t') => self.show_toc(viewport, terminal, events)?,
            KeyCode::Char('a') => self.ask_ai(terminal, events, ai)?,
            KeyCode::Char('s') => self.summarize(terminal, events, ai)?,
            KeyCode::Char('r') => self.read_aloud(terminal, events, speech)?,
            KeyCode::Char('>') => self.audio_guide(terminal, events, ai, speech)?,
            _ => {}
        }
        Ok(())
    }

    // ---- table of contents -------------------------------------------------

    fn show_toc<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        viewport: (u16, u16),
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
    ) -> Result<()> {
        if self.sections.is_empty() {
            return Ok(());
        }
        let mut state = ListState::default();
        state.select(Some(self.navigator.position().section));

        loop {
            terminal.draw(|frame| {
                self.draw(frame);
                self.draw_toc(frame, &mut state);
            })?;
            let Event::Key(key) = events.read()? else {
                continue;
            };
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => state.select_next(),
                KeyCode::Char('k') | KeyCode::Up => state.select_previous(),
                KeyCode::Enter => {
                    if let Some(selected) = state.selected() {
                        let target = selected.min(self.sections.len() - 1);
                        let map = BookPages {
                            sections: &self.sections,
                            paginator: &self.paginator,
                            width: viewport.0,
                            height: viewport.1,
                        };
                        self.navigator.jump_to_section(target, &map);
                        self.ensure_pages(viewport.0, viewport.1);
                    }
                    return Ok(());
                }
                KeyCode::Char('t') | KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                _ => {}
            }
        }
    }

    fn draw_toc(&self, frame: &mut Frame, state: &mut ListState) {
        let area = centered_rect(70, 80, frame.area());
        frame.render_widget(Clear, area);

        let current = self.navigator.position().section;
        let items: Vec<ListItem> = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let marker = if i == current { "→" } else { " " };
                ListItem::new(format!("{marker} {}. {}", i + 1, section.title))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title("Table of Contents")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Blue)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, state);
    }

    // ---- AI features -------------------------------------------------------

    fn ask_ai<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
    ) -> Result<()> {
        if self.sections.is_empty() {
            return Ok(());
        }
        let context = self.location_context();

        let mut question = String::new();
        loop {
            terminal.draw(|frame| self.draw_question_input(frame, &question))?;
            let Event::Key(key) = events.read()? else {
                continue;
            };
            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Enter => break,
                KeyCode::Backspace => {
                    question.pop();
                }
                KeyCode::Char(c) => question.push(c),
                _ => {}
            }
        }
        if question.trim().is_empty() {
            return Ok(());
        }

        let prompt = format!("Based on this text:\n{context}\n\nQuestion: {question}");
        let title = format!("AI Response to: {question}");
        self.stream_to_panel(terminal, events, ai, Some(ASK_SYSTEM_PROMPT), &prompt, &title)?;
        Ok(())
    }

    fn summarize<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
    ) -> Result<()> {
        let position = self.navigator.position();
        let Some(page) = self.pages.get(position.page) else {
            self.status = Some("No content to summarize".to_string());
            return Ok(());
        };
        let prompt = format!(
            "Please provide a concise summary of this text:\n{}\n\
             Focus on the key points and main ideas. Keep the summary brief and clear.",
            page.text
        );
        self.stream_to_panel(terminal, events, ai, None, &prompt, "Content Summary")?;
        Ok(())
    }

    /// Streams a completion into the lower half of a split view, polling
    /// for Esc between chunks. Cancellation simply stops consuming the
    /// stream; the navigation state is untouched either way.
    fn stream_to_panel<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
        system: Option<&str>,
        prompt: &str,
        title: &str,
    ) -> Result<()> {
        let mut chunks = match ai.complete(system, prompt) {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!("completion request failed: {err:#}");
                self.status = Some(format!("AI error: {err}"));
                return Ok(());
            }
        };

        let mut response = String::new();
        terminal.draw(|frame| self.draw_split_view(frame, title, &response, false))?;
        loop {
            if poll_for_escape(events)? {
                info!("completion cancelled by user");
                return Ok(());
            }
            match chunks.next() {
                Some(Ok(chunk)) => {
                    response.push_str(&chunk);
                    terminal.draw(|frame| self.draw_split_view(frame, title, &response, false))?;
                }
                Some(Err(err)) => {
                    warn!("completion stream failed: {err:#}");
                    self.status = Some(format!("AI error: {err}"));
                    return Ok(());
                }
                None => break,
            }
        }

        // Hold the finished response on screen until any key.
        terminal.draw(|frame| self.draw_split_view(frame, title, &response, true))?;
        events.read()?;
        Ok(())
    }

    // ---- audio features ----------------------------------------------------

    fn read_aloud<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        speech: &dyn SpeechSynthesizer,
    ) -> Result<()> {
        let position = self.navigator.position();
        let Some(page) = self.pages.get(position.page) else {
            self.status = Some("No content to read".to_string());
            return Ok(());
        };
        let text = page.text.clone();

        terminal.draw(|frame| self.draw_overlay_message(frame, "Converting text to speech..."))?;
        let audio = match speech.synthesize(&text) {
            Ok(audio) => audio,
            Err(err) => {
                warn!("speech synthesis failed: {err:#}");
                self.status = Some(format!("Speech error: {err}"));
                return Ok(());
            }
        };
        self.play_until_done(terminal, events, &audio, "Reading aloud... (Esc to stop)")
    }

    /// Audio companion for the current location: asks the AI for a short
    /// spoken-style guide, then reads it out.
    fn audio_guide<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
        speech: &dyn SpeechSynthesizer,
    ) -> Result<()> {
        if self.sections.is_empty() {
            return Ok(());
        }
        let prompt = format!(
            "Provide a brief audio guide for the reader's current location:\n\
             - Current story location\n\
             - Scene context\n\
             - Key characters/themes\n\n\
             Keep it conversational, like an audiobook companion.\n\n\
             Context:\n{}",
            self.location_context()
        );

        terminal.draw(|frame| self.draw_overlay_message(frame, "Creating guide..."))?;
        let script = match self.collect_completion(events, ai, &prompt)? {
            Some(script) => script,
            None => return Ok(()), // cancelled
        };
        if script.trim().is_empty() {
            self.status = Some("Guide came back empty".to_string());
            return Ok(());
        }

        let audio = match speech.synthesize(&script) {
            Ok(audio) => audio,
            Err(err) => {
                warn!("speech synthesis failed: {err:#}");
                self.status = Some(format!("Speech error: {err}"));
                return Ok(());
            }
        };
        self.play_until_done(terminal, events, &audio, "Reading guide... (Esc to stop)")
    }

    /// Folds a completion stream into a single string, polling for Esc
    /// between chunks. Returns None when cancelled.
    fn collect_completion(
        &mut self,
        events: &mut dyn EventSource,
        ai: &dyn CompletionClient,
        prompt: &str,
    ) -> Result<Option<String>> {
        let chunks = match ai.complete(None, prompt) {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!("completion request failed: {err:#}");
                self.status = Some(format!("AI error: {err}"));
                return Ok(None);
            }
        };

        let mut text = String::new();
        for chunk in chunks {
            if poll_for_escape(events)? {
                info!("guide generation cancelled by user");
                return Ok(None);
            }
            match chunk {
                Ok(chunk) => text.push_str(&chunk),
                Err(err) => {
                    warn!("completion stream failed: {err:#}");
                    self.status = Some(format!("AI error: {err}"));
                    return Ok(None);
                }
            }
        }
        Ok(Some(text))
    }

    fn play_until_done<B: Backend<Error: Send + Sync + 'static>>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut dyn EventSource,
        audio: &[u8],
        label: &str,
    ) -> Result<()> {
        let mut playback = match tts::play(audio) {
            Ok(playback) => playback,
            Err(err) => {
                warn!("playback failed to start: {err:#}");
                self.status = Some(format!("Audio error: {err}"));
                return Ok(());
            }
        };

        loop {
            terminal.draw(|frame| self.draw_overlay_message(frame, label))?;
            if playback.is_finished()? {
                return Ok(());
            }
            if events.poll(Duration::from_millis(100))? {
                if let Event::Key(key) = events.read()? {
                    if key.code == KeyCode::Esc {
                        playback.cancel()?;
                        info!("playback stopped by user");
                        return Ok(());
                    }
                }
            }
        }
    }

    // ---- rendering ---------------------------------------------------------

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_content(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let position = self.navigator.position();
        let header = if let Some(section) = self.sections.get(position.section) {
            let section_progress = if self.pages.is_empty() {
                0.0
            } else {
                position.page as f64 / self.pages.len() as f64 * 100.0
            };
            let overall_progress =
                position.section as f64 / self.sections.len() as f64 * 100.0;
            Line::from(vec![
                Span::styled(
                    section.title.clone(),
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(
                    format!(
                        "Section {}/{} • Page {}/{} ({section_progress:.1}%) • Overall {overall_progress:.1}%",
                        position.section + 1,
                        self.sections.len(),
                        position.page + 1,
                        self.pages.len().max(1),
                    ),
                    Style::default().fg(Color::Yellow),
                ),
            ])
        } else {
            Line::from(Span::styled(
                "No content available",
                Style::default().fg(Color::Red),
            ))
        };
        frame.render_widget(
            Paragraph::new(header).block(Block::default().borders(Borders::ALL)),
            area,
        );
    }

    fn draw_content(&self, frame: &mut Frame, area: Rect) {
        let position = self.navigator.position();
        let text = self
            .pages
            .get(position.page)
            .map(|page| page.text.clone())
            .unwrap_or_default();
        let content = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Blue))
                    .padding(Padding::new(4, 4, 1, 0)),
            );
        frame.render_widget(content, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let (text, style) = match &self.status {
            Some(status) => (status.as_str(), Style::default().fg(Color::Red)),
            None => (HELP_LINE, Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(
            Paragraph::new(text)
                .style(style)
                .block(Block::default().borders(Borders::ALL)),
            area,
        );
    }

    fn draw_question_input(&self, frame: &mut Frame, question: &str) {
        self.draw(frame);
        let area = centered_rect(70, 20, frame.area());
        frame.render_widget(Clear, area);
        let input = Paragraph::new(format!("{question}█")).block(
            Block::default()
                .title("Question (Esc to cancel, Enter to ask)")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        );
        frame.render_widget(input, area);
    }

    fn draw_split_view(&self, frame: &mut Frame, title: &str, response: &str, done: bool) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(frame.area());

        let position = self.navigator.position();
        let page_text = self
            .pages
            .get(position.page)
            .map(|page| page.text.clone())
            .unwrap_or_default();
        frame.render_widget(
            Paragraph::new(page_text).wrap(Wrap { trim: true }).block(
                Block::default()
                    .title("Current Text")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Blue)),
            ),
            chunks[0],
        );

        let body = if response.is_empty() {
            "Waiting for response...".to_string()
        } else if done {
            format!("{response}\n\n(press any key to continue)")
        } else {
            response.to_string()
        };
        frame.render_widget(
            Paragraph::new(body).wrap(Wrap { trim: true }).block(
                Block::default()
                    .title(title.to_string())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            ),
            chunks[1],
        );
    }

    fn draw_overlay_message(&self, frame: &mut Frame, message: &str) {
        self.draw(frame);
        let area = centered_rect(60, 15, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            ),
            area,
        );
    }
}

/// Drains pending input, reporting whether Esc was among it. Other keys
/// pressed during a streaming feature are deliberately discarded.
fn poll_for_escape(events: &mut dyn EventSource) -> Result<bool> {
    let mut cancelled = false;
    while events.poll(Duration::ZERO)? {
        if let Event::Key(key) = events.read()? {
            if key.code == KeyCode::Esc {
                cancelled = true;
            }
        }
    }
    Ok(cancelled)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChunkStream;
    use crate::event_source::{ScriptedEvents, key, key_char};
    use anyhow::anyhow;
    use ratatui::backend::TestBackend;

    struct ScriptedClient(Vec<&'static str>);

    impl CompletionClient for ScriptedClient {
        fn complete(&self, _system: Option<&str>, _prompt: &str) -> Result<ChunkStream> {
            let chunks: Vec<Result<String>> =
                self.0.iter().map(|chunk| Ok(chunk.to_string())).collect();
            Ok(Box::new(chunks.into_iter()))
        }
    }

    struct FailingClient;

    impl CompletionClient for FailingClient {
        fn complete(&self, _system: Option<&str>, _prompt: &str) -> Result<ChunkStream> {
            Err(anyhow!("OPENAI_API_KEY is not set"))
        }
    }

    struct FailingSpeech;

    impl SpeechSynthesizer for FailingSpeech {
        fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            Err(anyhow!("ELEVENLABS_API_KEY is not set"))
        }
    }

    fn sample_reader() -> Reader {
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), vec!["Test Book".to_string()]);
        metadata.insert("author".to_string(), vec!["A. Writer".to_string()]);
        let sections = vec![
            Section {
                content: "opening words\n\nmore of the opening".to_string(),
                title: "First".to_string(),
                parent: None,
            },
            Section {
                content: "middle words".to_string(),
                title: "Second".to_string(),
                parent: Some("First".to_string()),
            },
            Section {
                content: "closing words\n\nfinal thoughts\n\nthe very end".to_string(),
                title: "Third".to_string(),
                parent: Some("Second".to_string()),
            },
        ];
        Reader::from_parts(metadata, sections)
    }

    fn terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(40, 20)).unwrap()
    }

    fn run_keys(reader: &mut Reader, events: &mut ScriptedEvents) {
        let mut terminal = terminal();
        reader
            .run(&mut terminal, events, &ScriptedClient(vec![]), &FailingSpeech)
            .unwrap();
    }

    #[test]
    fn quits_on_q() {
        let mut reader = sample_reader();
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("q"));
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
    }

    #[test]
    fn section_keys_move_between_sections() {
        let mut reader = sample_reader();
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("llhq"));
        assert_eq!(reader.position(), Position { section: 1, page: 0 });
        assert_eq!(reader.current_pages()[0].text, "middle words");
    }

    #[test]
    fn page_keys_cross_section_boundaries() {
        let mut reader = sample_reader();
        // Every section fits on one page at the 40x20 test viewport, so two
        // page-downs land on the third section.
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("jjq"));
        assert_eq!(reader.position(), Position { section: 2, page: 0 });
    }

    #[test]
    fn boundary_keys_are_noops_at_the_start() {
        let mut reader = sample_reader();
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("khq"));
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
    }

    #[test]
    fn jump_keys_reach_both_ends() {
        let mut reader = sample_reader();
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("Gq"));
        assert_eq!(reader.position().section, 2);

        let mut reader = sample_reader();
        run_keys(&mut reader, &mut ScriptedEvents::from_chars("Ggq"));
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
    }

    #[test]
    fn toc_enter_jumps_to_the_selected_section() {
        let mut reader = sample_reader();
        let mut events = ScriptedEvents::from_chars("tj");
        events.push(key(KeyCode::Enter));
        events.push(key_char('q'));
        run_keys(&mut reader, &mut events);
        assert_eq!(reader.position(), Position { section: 1, page: 0 });
    }

    #[test]
    fn toc_escape_leaves_position_alone() {
        let mut reader = sample_reader();
        let mut events = ScriptedEvents::from_chars("tjj");
        events.push(key(KeyCode::Esc));
        events.push(key_char('q'));
        run_keys(&mut reader, &mut events);
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
    }

    #[test]
    fn cancelling_a_question_leaves_state_untouched() {
        let mut reader = sample_reader();
        let mut events = ScriptedEvents::from_chars("ahi");
        events.push(key(KeyCode::Esc));
        events.push(key_char('q'));

        let mut term = terminal();
        reader
            .run(
                &mut term,
                &mut events,
                &ScriptedClient(vec!["never", "seen"]),
                &FailingSpeech,
            )
            .unwrap();
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
        assert_eq!(reader.status_message(), None);
    }

    #[test]
    fn streamed_summary_waits_for_a_key_then_returns() {
        let mut reader = sample_reader();
        let mut events = ScriptedEvents::from_chars("s");
        events.push(key_char(' ')); // dismiss the finished summary
        events.push(key_char('q'));

        let mut term = terminal();
        reader
            .run(
                &mut term,
                &mut events,
                &ScriptedClient(vec!["A short ", "summary."]),
                &FailingSpeech,
            )
            .unwrap();
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
        assert_eq!(reader.status_message(), None);
    }

    #[test]
    fn ai_failure_surfaces_as_a_status_message() {
        let mut reader = sample_reader();
        let mut term = terminal();
        let mut events = ScriptedEvents::from_chars("sq");
        reader
            .run(&mut term, &mut events, &FailingClient, &FailingSpeech)
            .unwrap();
        let status = reader.status_message().unwrap();
        assert!(status.contains("AI error"), "unexpected status: {status}");
        assert_eq!(reader.position(), Position { section: 0, page: 0 });
    }

    #[test]
    fn speech_failure_surfaces_as_a_status_message() {
        let mut reader = sample_reader();
        let mut term = terminal();
        let mut events = ScriptedEvents::from_chars("rq");
        reader
            .run(&mut term, &mut events, &ScriptedClient(vec![]), &FailingSpeech)
            .unwrap();
        let status = reader.status_message().unwrap();
        assert!(status.contains("Speech error"), "unexpected status: {status}");
    }

    #[test]
    fn navigation_clears_the_status_line() {
        let mut reader = sample_reader();
        let mut term = terminal();
        let mut events = ScriptedEvents::from_chars("slq");
        reader
            .run(&mut term, &mut events, &FailingClient, &FailingSpeech)
            .unwrap();
        assert_eq!(reader.status_message(), None);
        assert_eq!(reader.position().section, 1);
    }

    #[test]
    fn location_context_carries_metadata_and_hierarchy() {
        let mut reader = sample_reader();
        reader.ensure_pages(40, 10);
        let map_viewport = (40u16, 10u16);
        assert!(reader.navigate(NavCommand::NextSection, map_viewport));

        let context = reader.location_context();
        assert!(context.contains("Title: Test Book"));
        assert!(context.contains("Author: A. Writer"));
        assert!(context.contains("Section: First > Second"));
        assert!(context.contains("Page: 1 of 1"));
        assert!(context.contains("middle words"));
    }

    #[test]
    fn shrinking_viewport_clamps_the_page_index() {
        let mut reader = sample_reader();
        // Narrow, short viewport: the first section spreads over several pages.
        reader.ensure_pages(12, 3);
        let small = (12u16, 3u16);
        assert!(reader.navigate(NavCommand::JumpEnd, small));
        let deep = reader.position();
        assert_eq!(deep, Position { section: 2, page: 2 });

        // A huge viewport collapses every section to a single page.
        reader.ensure_pages(200, 100);
        let clamped = reader.position();
        assert_eq!(clamped.section, deep.section);
        assert_eq!(clamped.page, 0);
    }
}
