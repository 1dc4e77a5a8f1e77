use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    cursor::MoveToColumn,
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
    tty::IsTty,
};
use log::info;
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
    sync::mpsc::{self, Receiver},
    time::Instant,
};

use typewise::{
    config::{Config, ConfigStore, FileConfigStore},
    controller::SessionController,
    corpus::Corpus,
    events::SessionEvent,
    feedback::LiveMetrics,
    predictor::DifficultyPredictor,
    runtime::{CrosstermEventSource, FixedTicker, InputEvent, Runner, SessionCommand},
    scorer::ScoreSnapshot,
    selector::TextSelector,
    session::{SessionStatus, TextType},
    stats::StatsStore,
};

/// adaptive typing trainer that picks the next passage from how you typed the last one
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// passage length to practice
    #[clap(short = 't', long, value_enum, global = true)]
    text_type: Option<TextType>,

    /// session ledger file (defaults to the state directory)
    #[clap(long, global = true)]
    ledger: Option<PathBuf>,

    /// difficulty model file (defaults to the state directory)
    #[clap(long, global = true)]
    model: Option<PathBuf>,

    /// JSON corpus with short/medium/long passage pools
    #[clap(long, global = true)]
    corpus: Option<PathBuf>,

    /// custom passage to type instead of the corpus (never augmented)
    #[clap(short = 'p', long, global = true)]
    prompt: Option<String>,

    /// never make passages harder by swapping in complex words
    #[clap(long, global = true)]
    no_augment: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// type passages (default)
    Practice,
    /// show aggregate statistics and recent sessions
    Stats,
    /// clear the session ledger
    ResetStats,
    /// write every recorded session to a CSV file
    Export { file: PathBuf },
}

impl Cli {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(text_type) = self.text_type {
            config.text_type = text_type;
        }
        if let Some(ref path) = self.ledger {
            config.ledger_path = Some(path.clone());
        }
        if let Some(ref path) = self.model {
            config.model_path = Some(path.clone());
        }
        if let Some(ref path) = self.corpus {
            config.corpus_path = Some(path.clone());
        }
        if self.no_augment || self.prompt.is_some() {
            config.augment = false;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.apply(FileConfigStore::new().load());

    match cli.command {
        Some(Command::Stats) => {
            let store = StatsStore::load(config.ledger_path());
            println!("{}", store.report());
        }
        Some(Command::ResetStats) => {
            let mut store = StatsStore::load(config.ledger_path());
            store.reset()?;
            println!("Session history cleared.");
        }
        Some(Command::Export { ref file }) => {
            let store = StatsStore::load(config.ledger_path());
            store.export_csv(file)?;
            println!(
                "Exported {} sessions to {}",
                store.sessions().len(),
                file.display()
            );
        }
        Some(Command::Practice) | None => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            practice(&cli, &config)?;
        }
    }

    Ok(())
}

fn load_corpus(cli: &Cli, config: &Config) -> Corpus {
    if let Some(ref prompt) = cli.prompt {
        return Corpus::single(prompt.clone());
    }
    match config.corpus_path {
        Some(ref path) => Corpus::from_path(path).unwrap_or_else(|e| {
            log::warn!("could not read corpus {}: {}", path.display(), e);
            Corpus::embedded()
        }),
        None => Corpus::embedded(),
    }
}

fn practice(cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let store = StatsStore::load(config.ledger_path());
    let predictor = DifficultyPredictor::load(config.model_path());
    let selector = TextSelector::new(load_corpus(cli, config), config.augment);
    let (tx, rx) = mpsc::channel();
    let mut controller: SessionController =
        SessionController::new(config, store, predictor, selector, tx);

    enable_raw_mode()?;
    let result = run(&mut controller, &rx, config);
    disable_raw_mode()?;
    println!();
    info!("{} sessions on record", controller.store().sessions().len());
    result
}

/// F1/F2/F3 pick the passage length.
fn text_type_key(key: &KeyEvent) -> Option<TextType> {
    match key.code {
        KeyCode::F(1) => Some(TextType::Short),
        KeyCode::F(2) => Some(TextType::Medium),
        KeyCode::F(3) => Some(TextType::Long),
        _ => None,
    }
}

fn run(
    controller: &mut SessionController,
    rx: &Receiver<SessionEvent>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::new(config.tick_interval()));
    let mut presenter = LinePresenter::new(io::stdout());
    presenter.help()?;
    presenter.drain(rx)?;

    loop {
        let event = match runner.step() {
            InputEvent::Key(key) => match key.code {
                KeyCode::Esc => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Tab => InputEvent::Command(SessionCommand::Reset),
                KeyCode::Enter if controller.status() == SessionStatus::Completed => {
                    InputEvent::Command(SessionCommand::Reset)
                }
                _ => match text_type_key(&key) {
                    Some(text_type) => InputEvent::Command(SessionCommand::NewSession(text_type)),
                    None => InputEvent::Key(key),
                },
            },
            other => other,
        };
        controller.dispatch(event, Instant::now());
        presenter.drain(rx)?;
    }
    Ok(())
}

/// Minimal raw-mode renderer: one status line under the passage, messages above it.
struct LinePresenter<W: Write> {
    out: W,
    score: Option<ScoreSnapshot>,
    live: LiveMetrics,
}

impl<W: Write> LinePresenter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            score: None,
            live: LiveMetrics::default(),
        }
    }

    fn help(&mut self) -> io::Result<()> {
        self.line("Tab: new passage  Enter: next after finishing  F1/F2/F3: short/medium/long  Esc: quit")
    }

    fn drain(&mut self, rx: &Receiver<SessionEvent>) -> io::Result<()> {
        let mut dirty = false;
        for event in rx.try_iter() {
            match event {
                SessionEvent::PassageReady(passage) => {
                    self.score = None;
                    self.live = LiveMetrics::default();
                    self.line("")?;
                    self.line(&passage)?;
                }
                SessionEvent::Score(score) => self.score = Some(score),
                SessionEvent::Live(live) => self.live = live,
                SessionEvent::DifficultyChanged(level) => {
                    self.line(&format!("Difficulty changed to {level}"))?
                }
                SessionEvent::Feedback(feedback) => self.line(&format!("* {feedback}"))?,
                SessionEvent::SessionCompleted(summary) => {
                    self.line("")?;
                    for l in summary.to_string().lines() {
                        self.line(l)?;
                    }
                    self.line("Press Enter for the next passage")?;
                    continue;
                }
                SessionEvent::Notice(msg) => self.line(&format!("! {msg}"))?,
            }
            dirty = true;
        }
        if dirty {
            self.status()?;
        }
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(text),
            Print("\r\n")
        )?;
        self.out.flush()
    }

    fn status(&mut self) -> io::Result<()> {
        let Some(score) = self.score else {
            return Ok(());
        };
        let marker = if score.prefix_matches { ' ' } else { 'x' };
        execute!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!(
                "{marker} {:>5.1}s {:>5.1} wpm  acc {:>5.1}%  {:>3.0}% done",
                self.live.elapsed_secs, self.live.wpm, score.accuracy, score.progress_percent
            ))
        )
    }
}
