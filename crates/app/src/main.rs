use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gate_core::model::{GateSettings, TabId, VideoMetadata};
use services::{
    Clock, CoordinatorConfig, ObserverConfig, OpenAiGenerator, QuestionBank, QuizGenerator,
    ScreenState, TabAgent, TabConfig, TabEvent, VideoPlayer, run_platform_observer,
    spawn_coordinator,
};
use storage::repository::Storage;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidFrequency { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFrequency { raw } => write!(f, "invalid --frequency value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- demo    [--db <sqlite_url>] [--subject <name>] [--frequency <n>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults for demo:");
    eprintln!("  --db sqlite:studygate.sqlite3");
    eprintln!("  --subject Biology");
    eprintln!("  --frequency 3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDYGATE_DB_URL, STUDYGATE_SUBJECT");
    eprintln!("  STUDYGATE_AI_API_KEY, STUDYGATE_AI_BASE_URL, STUDYGATE_AI_MODEL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Demo,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "demo" => Some(Self::Demo),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    subject: String,
    frequency: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("STUDYGATE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://studygate.sqlite3".into(), normalize_sqlite_url);
        let mut subject = std::env::var("STUDYGATE_SUBJECT")
            .ok()
            .unwrap_or_else(|| "Biology".into());
        let mut frequency = 3;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--subject" => {
                    subject = require_value(args, "--subject")?;
                }
                "--frequency" => {
                    let value = require_value(args, "--frequency")?;
                    frequency = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n >= 1)
                        .ok_or(ArgsError::InvalidFrequency { raw: value })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            subject,
            frequency,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Console stand-in for the page's video element.
struct SimulatedPlayer {
    label: &'static str,
    paused: bool,
}

impl SimulatedPlayer {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            paused: false,
        }
    }
}

impl VideoPlayer for SimulatedPlayer {
    fn is_paused(&self) -> bool {
        self.paused
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            println!("      [{}] playback paused", self.label);
        }
    }

    fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            println!("      [{}] playback resumed", self.label);
        }
    }
}

/// A scripted swipe through a shorts feed: URL, title, caption line.
const FEED: [(&str, &str, &str); 12] = [
    (
        "https://www.youtube.com/shorts/krebs-cycle-60s",
        "The Krebs cycle in 60 seconds",
        "acetyl coa enters the cycle and is oxidized to carbon dioxide",
    ),
    (
        "https://www.youtube.com/shorts/mitochondria-atp",
        "Why mitochondria make ATP",
        "the electron transport chain pumps protons across the membrane",
    ),
    (
        "https://www.youtube.com/shorts/osmosis-explained",
        "Osmosis explained with an egg",
        "water moves toward the higher solute concentration",
    ),
    (
        "https://www.tiktok.com/@cellbio/video/7301112223334",
        "Photosynthesis speedrun",
        "light reactions split water and release oxygen",
    ),
    (
        "https://www.youtube.com/shorts/dna-replication",
        "DNA replication is wild",
        "helicase unzips the double helix ahead of the polymerase",
    ),
    (
        "https://www.youtube.com/shorts/enzymes-locks",
        "Enzymes are tiny locks",
        "the active site fits its substrate like a key",
    ),
    (
        "https://www.instagram.com/reels/Cxy123AbCd4/",
        "Neurons firing in slow motion",
        "an action potential races down the axon to the synapse",
    ),
    (
        "https://www.youtube.com/shorts/immune-system",
        "Your immune system at war",
        "antibodies tag invaders for the phagocytes",
    ),
    (
        "https://www.youtube.com/shorts/protein-folding",
        "Protein folding in 45 seconds",
        "the amino acid chain collapses into its native shape",
    ),
    (
        "https://www.tiktok.com/@cellbio/video/7301112229999",
        "Meiosis vs mitosis",
        "crossing over shuffles alleles between homologous chromosomes",
    ),
    (
        "https://www.youtube.com/shorts/gut-microbiome",
        "Your gut is an ecosystem",
        "trillions of bacteria ferment fiber into short chain fatty acids",
    ),
    (
        "https://www.youtube.com/shorts/crispr-in-60",
        "CRISPR in one minute",
        "cas9 cuts dna where the guide rna tells it to",
    ),
];

async fn run_demo(storage: Storage, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = GateSettings::from_persisted(true, args.frequency)?;
    storage.settings.save_settings(&settings).await?;

    let openai = OpenAiGenerator::from_env();
    let generator: Arc<dyn QuizGenerator> = if openai.enabled() {
        info!("quiz generation goes through the configured model API");
        Arc::new(openai)
    } else {
        info!("no STUDYGATE_AI_API_KEY set, quizzes come from the built-in bank");
        Arc::new(QuestionBank::new())
    };

    let handle = spawn_coordinator(
        CoordinatorConfig::default(),
        generator,
        Arc::clone(&storage.sessions),
        Clock::default(),
    );

    let session = handle.start_session(args.subject.clone()).await?;
    println!("study session {session} started, subject: {}", args.subject);
    println!(
        "a quiz interrupts every {} shorts; wrong answers come back later\n",
        args.frequency
    );

    let study_tab = TabId::new(1);
    let browse_tab = TabId::new(2);
    let mut study = TabAgent::register(
        study_tab,
        TabConfig::new(args.subject.clone()),
        handle.clone(),
        storage.clone(),
        Clock::default(),
        Box::new(SimulatedPlayer::new("shorts tab")),
    )
    .await?;
    let mut browse = TabAgent::register(
        browse_tab,
        TabConfig::new(args.subject.clone()),
        handle.clone(),
        storage.clone(),
        Clock::default(),
        Box::new(SimulatedPlayer::new("second tab")),
    )
    .await?;

    let (nav_tx, nav_rx) = mpsc::channel(16);
    let (event_tx, mut events) = mpsc::channel(16);
    tokio::spawn(run_platform_observer(
        nav_rx,
        event_tx,
        ObserverConfig::default(),
    ));

    let mut quizzes_taken = 0u32;
    let mut other_blocked = false;
    for (url, title, caption) in FEED {
        nav_tx.send(url.to_string()).await?;
        let Ok(Some(event)) = timeout(Duration::from_millis(900), events.recv()).await else {
            continue;
        };

        if let TabEvent::ShortOpened { platform, .. } = &event {
            println!("[shorts tab] {title}  ({})", platform.label());
        }
        study.handle_event(event).await?;
        study
            .handle_event(TabEvent::MetadataExtracted(VideoMetadata::new(
                Some(title.to_string()),
                None,
                Some("StudyShorts".to_string()),
            )))
            .await?;
        study
            .handle_event(TabEvent::Captions(caption.to_string()))
            .await?;

        poke_other_tab(&mut browse, &mut other_blocked).await?;
        answer_any_quiz(&mut study, &mut quizzes_taken).await?;
        poke_other_tab(&mut browse, &mut other_blocked).await?;
    }

    nav_tx.send("https://example.com/".to_string()).await?;
    if let Ok(Some(event)) = timeout(Duration::from_millis(900), events.recv()).await {
        study.handle_event(event).await?;
    }

    println!();
    match handle.end_session().await? {
        Some(summary) => {
            let stats = summary.stats();
            println!(
                "session over: {} quizzes, {}/{} correct, {} shorts watched",
                stats.quiz_count(),
                stats.correct_answers(),
                stats.total_answers(),
                stats.videos_watched()
            );
        }
        None => println!("session was already over"),
    }

    handle.unregister_tab(study_tab).await?;
    handle.unregister_tab(browse_tab).await?;
    Ok(())
}

/// Prints the quiz, picks an answer, and submits it. The first quiz is
/// deliberately answered wrong so the replay shows up later in the run.
async fn answer_any_quiz(
    study: &mut TabAgent,
    quizzes_taken: &mut u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (question, origin) = match study.screen() {
        ScreenState::Quiz { question, origin } => (question.clone(), *origin),
        _ => return Ok(()),
    };

    *quizzes_taken += 1;
    println!("\n  === quiz break ({}) ===", origin.label());
    println!("  {}", question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        println!("    {}. {option}", index + 1);
    }

    let choice = if *quizzes_taken == 1 {
        (question.correct_index() + 1) % question.option_count()
    } else {
        question.correct_index()
    };
    let verdict = if question.is_correct(choice) {
        "correct"
    } else {
        "wrong, it will come back"
    };
    println!("  answering {}: {verdict}", choice + 1);
    if let Some(explanation) = question.explanation_for(choice) {
        println!("  {explanation}");
    }
    println!();

    study.handle_event(TabEvent::AnswerSelected(choice)).await?;
    Ok(())
}

async fn poke_other_tab(
    browse: &mut TabAgent,
    was_blocked: &mut bool,
) -> Result<(), Box<dyn std::error::Error>> {
    browse
        .handle_event(TabEvent::Captions("background audio".to_string()))
        .await?;
    if browse.is_blocked() != *was_blocked {
        *was_blocked = browse.is_blocked();
        if *was_blocked {
            println!("      [second tab] blocked until the quiz is answered");
        } else {
            println!("      [second tab] released");
        }
    }
    Ok(())
}

async fn run_history(storage: Storage) -> Result<(), Box<dyn std::error::Error>> {
    let summaries = storage.sessions.recent_summaries(10).await?;
    if summaries.is_empty() {
        println!("no finished study sessions yet");
        return Ok(());
    }

    for summary in summaries {
        let stats = summary.stats();
        let minutes = (summary.ended_at() - summary.started_at()).num_minutes();
        println!(
            "{}  {:<16} {:>4} min  quizzes {:>2}  correct {}/{}  shorts {}",
            summary.started_at().format("%Y-%m-%d %H:%M"),
            summary.subject(),
            minutes,
            stats.quiz_count(),
            stats.correct_answers(),
            stats.total_answers(),
            stats.videos_watched()
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: run the demo when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Demo => run_demo(storage, parsed).await,
        Command::History => run_history(storage).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/gate.sqlite3".into()),
            "sqlite:///tmp/gate.sqlite3"
        );
        assert!(normalize_sqlite_url("gate.sqlite3".into()).starts_with("sqlite://"));
    }

    #[test]
    fn frequency_must_be_positive() {
        let mut args = ["--frequency".to_string(), "0".to_string()].into_iter();
        assert!(matches!(
            Args::parse(&mut args),
            Err(ArgsError::InvalidFrequency { .. })
        ));
    }
}
