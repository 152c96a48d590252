use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::{error, info};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use simplelog::{Config, LevelFilter, WriteLogger};

use lectern::ai::OpenAiClient;
use lectern::event_source::KeyboardEventSource;
use lectern::reader::Reader;
use lectern::tts::ElevenLabsClient;

/// Interactive ebook reader with AI assistance.
#[derive(Parser)]
#[command(name = "lectern", version, about)]
struct Cli {
    /// Path to an EPUB file
    path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_epub = cli
        .path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("epub"));
    if !cli.path.exists() || !is_epub {
        eprintln!("Please provide a valid EPUB file");
        std::process::exit(1);
    }

    WriteLogger::init(
        LevelFilter::Info,
        Config::default(),
        File::create("lectern.log")?,
    )?;
    info!("Starting lectern with {}", cli.path.display());

    let mut reader = Reader::open(&cli.path)?;
    let ai = OpenAiClient::from_env()?;
    let speech = ElevenLabsClient::from_env()?;

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut events = KeyboardEventSource;
    let result = reader.run(&mut terminal, &mut events, &ai, &speech);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        error!("Application error: {err:?}");
        eprintln!("{err:?}");
    }
    result
}
