/// Read-only view of the paginated book used by [`Navigator`] for bounds
/// checks. Implementations paginate lazily, so asking for a page count of a
/// section that is not currently active is cheap and side-effect free.
pub trait PageMap {
    fn section_count(&self) -> usize;
    fn page_count(&self, section_index: usize) -> usize;
}

/// The reader's current position: which section, and which page within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub section: usize,
    pub page: usize,
}

/// Symbolic navigation commands, decoupled from key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    PrevSection,
    NextSection,
    PrevPage,
    NextPage,
    JumpStart,
    JumpEnd,
}

/// Owns `(section, page)` and moves it through the book.
///
/// Every operation either fully succeeds (returning `true`) or leaves the
/// position untouched (returning `false`); there are no partial updates.
/// Crossing a section boundary consults the target section's page count, so
/// `prev_page` lands on the last page of the section it enters rather than
/// on a stale index from the section it left.
#[derive(Debug, Clone)]
pub struct Navigator {
    section: usize,
    page: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Navigator::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Navigator { section: 0, page: 0 }
    }

    pub fn position(&self) -> Position {
        Position {
            section: self.section,
            page: self.page,
        }
    }

    pub fn apply(&mut self, command: NavCommand, map: &impl PageMap) -> bool {
        match command {
            NavCommand::PrevSection => self.prev_section(),
            NavCommand::NextSection => self.next_section(map),
            NavCommand::PrevPage => self.prev_page(map),
            NavCommand::NextPage => self.next_page(map),
            NavCommand::JumpStart => self.jump_start(map),
            NavCommand::JumpEnd => self.jump_end(map),
        }
    }

    pub fn prev_section(&mut self) -> bool {
        if self.section == 0 {
            return false;
        }
        self.section -= 1;
        self.page = 0;
        true
    }

    pub fn next_section(&mut self, map: &impl PageMap) -> bool {
        if self.section + 1 >= map.section_count() {
            return false;
        }
        self.section += 1;
        self.page = 0;
        true
    }

    pub fn prev_page(&mut self, map: &impl PageMap) -> bool {
        if self.page > 0 {
            self.page -= 1;
            return true;
        }
        if self.section == 0 {
            return false;
        }
        self.section -= 1;
        self.page = map.page_count(self.section).saturating_sub(1);
        true
    }

    pub fn next_page(&mut self, map: &impl PageMap) -> bool {
        if self.page + 1 < map.page_count(self.section) {
            self.page += 1;
            return true;
        }
        if self.section + 1 >= map.section_count() {
            return false;
        }
        self.section += 1;
        self.page = 0;
        true
    }

    pub fn jump_start(&mut self, map: &impl PageMap) -> bool {
        if map.section_count() == 0 {
            return false;
        }
        self.section = 0;
        self.page = 0;
        true
    }

    /// Direct jump used by the table of contents. Lands on the first page
    /// of the chosen section; out-of-range targets are a no-op.
    pub fn jump_to_section(&mut self, section_index: usize, map: &impl PageMap) -> bool {
        if section_index >= map.section_count() {
            return false;
        }
        self.section = section_index;
        self.page = 0;
        true
    }

    pub fn jump_end(&mut self, map: &impl PageMap) -> bool {
        let sections = map.section_count();
        if sections == 0 {
            return false;
        }
        self.section = sections - 1;
        self.page = map.page_count(self.section).saturating_sub(1);
        true
    }

    /// Clamps the page index back into range after a re-pagination (for
    /// example when the viewport shrank and the current section now has
    /// fewer pages).
    pub fn clamp(&mut self, map: &impl PageMap) {
        if map.section_count() == 0 {
            self.section = 0;
            self.page = 0;
            return;
        }
        self.section = self.section.min(map.section_count() - 1);
        self.page = self.page.min(map.page_count(self.section).saturating_sub(1));
    }
}
