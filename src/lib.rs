// Export modules for use in tests
pub mod ai;
pub mod book;
pub mod event_source;
pub mod html_text;
pub mod navigation;
pub mod pagination;
pub mod reader;
pub mod section;
pub mod tts;

pub use reader::Reader;
