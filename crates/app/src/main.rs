use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use quiz_core::model::{TopicData, TopicId, raw::RawQuestion, raw::normalize_all};
use services::{CatalogService, CatalogSource, Clock, QuizLoopService};
use storage::Storage;
use storage::sqlite::SqliteRepository;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidTopicId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTopicId { raw } => write!(f, "invalid topic id: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz list                                [options]");
    eprintln!("  quiz play <topicId>                      [options]");
    eprintln!("  quiz normalize <raw.json> <topicId> [title]");
    eprintln!("  quiz forget                              [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --data <dir|url>     catalog root (default ./data)");
    eprintln!("  --db <sqlite_url>    progress database (default sqlite://quiz-session.sqlite3)");
    eprintln!("  --session <name>     progress scope (default \"default\")");
    eprintln!("  --stats-url <url>    override the manifest's stats endpoint; empty disables");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DATA, QUIZ_DB_URL, QUIZ_SESSION, QUIZ_STATS_URL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Play(TopicId),
    Normalize {
        input: PathBuf,
        topic_id: TopicId,
        title: Option<String>,
    },
    Forget,
}

struct Args {
    data: String,
    db_url: String,
    session: String,
    stats_url: Option<String>,
}

impl Args {
    fn from_env() -> Self {
        Self {
            data: std::env::var("QUIZ_DATA").unwrap_or_else(|_| "./data".into()),
            db_url: std::env::var("QUIZ_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://quiz-session.sqlite3".into(), normalize_sqlite_url),
            session: std::env::var("QUIZ_SESSION").unwrap_or_else(|_| "default".into()),
            stats_url: std::env::var("QUIZ_STATS_URL").ok(),
        }
    }

    /// Consume `--flag value` pairs, returning everything else positionally.
    fn parse_flags(
        &mut self,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Vec<String>, ArgsError> {
        let mut positional = Vec::new();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" => self.data = require_value(args, "--data")?,
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--session" => self.session = require_value(args, "--session")?,
                "--stats-url" => self.stats_url = Some(require_value(args, "--stats-url")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }
        Ok(positional)
    }
}

fn parse_topic_id(raw: &str) -> Result<TopicId, ArgsError> {
    TopicId::new(raw).map_err(|_| ArgsError::InvalidTopicId {
        raw: raw.to_owned(),
    })
}

fn parse_command(name: &str, positional: Vec<String>) -> Result<Command, ArgsError> {
    let mut positional = positional.into_iter();
    let command = match name {
        "list" => Command::List,
        "forget" => Command::Forget,
        "play" => {
            let raw = positional
                .next()
                .ok_or(ArgsError::MissingArgument { name: "topicId" })?;
            Command::Play(parse_topic_id(&raw)?)
        }
        "normalize" => {
            let input = positional
                .next()
                .ok_or(ArgsError::MissingArgument { name: "raw.json" })?;
            let raw_id = positional
                .next()
                .ok_or(ArgsError::MissingArgument { name: "topicId" })?;
            Command::Normalize {
                input: PathBuf::from(input),
                topic_id: parse_topic_id(&raw_id)?,
                title: positional.next(),
            }
        }
        other => return Err(ArgsError::UnknownArg(other.to_owned())),
    };
    match positional.next() {
        Some(extra) => Err(ArgsError::UnknownArg(extra)),
        None => Ok(command),
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
            .unwrap_or_else(|_| PathBuf::from("."))
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

async fn normalize_file(
    input: &Path,
    topic_id: TopicId,
    title: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = tokio::fs::read_to_string(input).await?;
    let raws: Vec<RawQuestion> = serde_json::from_str(&body)?;
    let questions = normalize_all(raws)?;
    info!("normalized {} questions for {topic_id}", questions.len());

    let document = TopicData {
        current_topic: title.unwrap_or_else(|| topic_id.to_string()),
        topic_id,
        questions,
    };
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let name = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let mut args = Args::from_env();
    let command = args
        .parse_flags(&mut argv)
        .and_then(|positional| parse_command(&name, positional))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    if let Command::Normalize {
        input,
        topic_id,
        title,
    } = command
    {
        return normalize_file(&input, topic_id, title).await;
    }

    let catalog = CatalogService::new(CatalogSource::parse(&args.data));
    if command == Command::List {
        let manifest = catalog.load_manifest().await?;
        terminal::print_manifest(&manifest);
        return Ok(());
    }

    // Open + migrate SQLite here so the library crates stay storage-agnostic.
    prepare_sqlite_file(&args.db_url)?;

    match command {
        Command::Forget => {
            let repo = SqliteRepository::connect(&args.db_url)
                .await?
                .with_scope(args.session.as_str());
            repo.migrate().await?;
            let removed = repo.clear_scope().await?;
            println!("Forgot {removed} saved run(s) in session \"{}\".", args.session);
            Ok(())
        }
        Command::Play(topic) => {
            let clock = Clock::system();
            let storage = Storage::sqlite(&args.db_url, &args.session).await?;
            let mut service = QuizLoopService::new(clock, catalog, storage.progress(clock));
            if let Some(endpoint) = args.stats_url {
                service = service.with_stats_endpoint(endpoint);
            }
            terminal::play(&service, &topic).await
        }
        Command::List | Command::Normalize { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
