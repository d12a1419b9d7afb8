use std::fmt;
use std::path::PathBuf;

use qcm_core::model::{Chapter, QuestionBank};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    questions: Option<PathBuf>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QCM_DB_URL").unwrap_or_else(|_| "sqlite://qcm.sqlite3?mode=rwc".into());
        let mut questions = std::env::var("QCM_QUESTIONS").ok().map(PathBuf::from);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--questions" => {
                    questions = Some(PathBuf::from(require_value(&mut args, "--questions")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, questions })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://qcm.sqlite3?mode=rwc)");
    eprintln!("  --questions <file.json>   Question bank: {{\"<chapter key>\": [{{\"q\", \"r\", \"c\"}}]}}");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QCM_DB_URL, QCM_QUESTIONS, RUST_LOG");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let chapters = storage.chapters.list().await;

    if let Some(path) = &args.questions {
        let raw = std::fs::read_to_string(path)?;
        let bank: QuestionBank = serde_json::from_str(&raw)?;
        for (key, questions) in bank {
            if !chapters.iter().any(|c| c.key() == key) {
                tracing::warn!(%key, "no chapter for question set, adding one");
                storage
                    .chapters
                    .add(Chapter::with_key(key.as_str(), key.clone()))
                    .await?;
            }
            tracing::info!(%key, count = questions.len(), "importing question set");
            storage.chapters.save_question_set(key, questions).await?;
        }
    }

    let catalog = storage.chapters.catalog().await;
    for chapter in catalog.chapters() {
        println!(
            "{:<40} {:<20} {} questions",
            chapter.title,
            chapter.key,
            chapter.question_count()
        );
    }
    println!("Seeded {} chapters into {}", catalog.chapters().len(), args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
