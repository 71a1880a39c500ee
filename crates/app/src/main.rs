use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kosakata_core::model::{DailyGoal, ItemId, Level, ProfileId};
use services::{
    Clock, DueQueue, DueQueueOptions, PersistedReview, ProgressService, ReviewService,
};
use storage::repository::Storage;
use storage::vocab::load_vocabulary;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, prelude::*};

const DEFAULT_DB_URL: &str = "sqlite://kosakata.sqlite3";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    MissingValue { flag: &'static str },
    MissingOperand { command: &'static str, operand: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    FlagNotAllowed { flag: &'static str, command: &'static str },
    InvalidLevel { raw: String },
    InvalidLimit { raw: String },
    InvalidWord { raw: String },
    InvalidGoal { raw: String },
    InvalidProfile { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingOperand { command, operand } => {
                write!(f, "{command} requires <{operand}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::FlagNotAllowed { flag, command } => {
                write!(f, "{flag} cannot be used with {command}")
            }
            ArgsError::InvalidLevel { raw } => write!(f, "invalid --level value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidWord { raw } => write!(f, "invalid word: {raw:?}"),
            ArgsError::InvalidGoal { raw } => {
                write!(f, "invalid goal: {raw} (expected 5 to 100 words)")
            }
            ArgsError::InvalidProfile { raw } => write!(f, "invalid --profile value: {raw:?}"),
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
    eprintln!("  kosakata [global options] review <word> <easy|medium|hard>");
    eprintln!("  kosakata [global options] due [--level <level>] [--limit <n>] [--shuffle]");
    eprintln!("  kosakata [global options] overview");
    eprintln!("  kosakata [global options] weak [--limit <n>]");
    eprintln!("  kosakata [global options] reset <word>");
    eprintln!("  kosakata [global options] goal [<words>]");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>   (default {DEFAULT_DB_URL})");
    eprintln!("  --profile <name>    (default {DEFAULT_PROFILE})");
    eprintln!("  --vocab <path>      vocabulary JSON; restricts reviews to known words");
    eprintln!();
    eprintln!("Levels: absolute-beginner, beginner, intermediate, advanced");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  KOSAKATA_DB_URL, KOSAKATA_PROFILE, KOSAKATA_VOCAB, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Review { word: ItemId, rating: String },
    Due(DueQueueOptions),
    Overview,
    Weak { limit: Option<usize> },
    Reset { word: ItemId },
    /// Show the daily goal, or set it when `words` is given.
    Goal { words: Option<DailyGoal> },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Review { .. } => "review",
            Command::Due(_) => "due",
            Command::Overview => "overview",
            Command::Weak { .. } => "weak",
            Command::Reset { .. } => "reset",
            Command::Goal { .. } => "goal",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db_url: String,
    profile: ProfileId,
    vocab: Option<PathBuf>,
    command: Command,
}

/// Flags that only some commands accept, collected before the command is known.
#[derive(Default)]
struct CommandFlags {
    level: Option<Level>,
    limit: Option<usize>,
    shuffle: bool,
}

fn parse_word(raw: String) -> Result<ItemId, ArgsError> {
    ItemId::new(&raw).map_err(|_| ArgsError::InvalidWord { raw })
}

fn parse_goal(raw: String) -> Result<DailyGoal, ArgsError> {
    raw.parse::<u32>()
        .ok()
        .and_then(|words| DailyGoal::new(words).ok())
        .ok_or(ArgsError::InvalidGoal { raw })
}

impl Args {
    /// Parse command-line arguments, falling back to `env` for globals.
    fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("KOSAKATA_DB_URL").map_or_else(
            || DEFAULT_DB_URL.to_string(),
            normalize_sqlite_url,
        );
        let mut profile_raw = env("KOSAKATA_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.into());
        let mut vocab = env("KOSAKATA_VOCAB")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let mut flags = CommandFlags::default();
        let mut positionals = Vec::new();
        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--profile" => profile_raw = require_value(&mut args, "--profile")?,
                "--vocab" => vocab = Some(PathBuf::from(require_value(&mut args, "--vocab")?)),
                "--level" => {
                    let value = require_value(&mut args, "--level")?;
                    let level = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?;
                    flags.level = Some(level);
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    let limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                    flags.limit = Some(limit);
                }
                "--shuffle" => flags.shuffle = true,
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        let profile = ProfileId::new(&profile_raw)
            .map_err(|_| ArgsError::InvalidProfile { raw: profile_raw })?;
        let command = Self::build_command(positionals, flags)?;

        Ok(Self {
            db_url,
            profile,
            vocab,
            command,
        })
    }

    fn build_command(positionals: Vec<String>, flags: CommandFlags) -> Result<Command, ArgsError> {
        let mut positionals = positionals.into_iter();
        let name = positionals.next().ok_or(ArgsError::MissingCommand)?;

        let command = match name.as_str() {
            "review" => {
                let word = positionals.next().ok_or(ArgsError::MissingOperand {
                    command: "review",
                    operand: "word",
                })?;
                let rating = positionals.next().ok_or(ArgsError::MissingOperand {
                    command: "review",
                    operand: "easy|medium|hard",
                })?;
                Command::Review {
                    word: parse_word(word)?,
                    rating,
                }
            }
            "due" => Command::Due(DueQueueOptions {
                level: flags.level,
                limit: flags.limit,
                shuffle: flags.shuffle,
            }),
            "overview" => Command::Overview,
            "weak" => Command::Weak { limit: flags.limit },
            "reset" => {
                let word = positionals.next().ok_or(ArgsError::MissingOperand {
                    command: "reset",
                    operand: "word",
                })?;
                Command::Reset {
                    word: parse_word(word)?,
                }
            }
            "goal" => Command::Goal {
                words: positionals.next().map(parse_goal).transpose()?,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        if let Some(extra) = positionals.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        let name = command.name();
        if !matches!(command, Command::Due(_)) {
            if flags.level.is_some() {
                return Err(ArgsError::FlagNotAllowed { flag: "--level", command: name });
            }
            if flags.shuffle {
                return Err(ArgsError::FlagNotAllowed { flag: "--shuffle", command: name });
            }
            if flags.limit.is_some() && !matches!(command, Command::Weak { .. }) {
                return Err(ArgsError::FlagNotAllowed { flag: "--limit", command: name });
            }
        }

        Ok(command)
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

fn print_review(result: &PersistedReview) {
    let item = &result.applied.item;
    let days = item.interval_days();
    println!(
        "{}: {} -> next review in {days} day{} ({}), mastery {}/10, {}",
        item.identifier(),
        result.applied.session.difficulty,
        if days == 1 { "" } else { "s" },
        item.next_review_at().format("%Y-%m-%d %H:%M UTC"),
        item.mastery_level(),
        item.status(),
    );
    if let Some((from, to)) = result.applied.status_change() {
        println!("status: {from} -> {to}");
    }
    println!("daily streak: {}", result.streak.current());
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() || argv.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let clock = Clock::default_clock();
    let profile = &parsed.profile;
    tracing::debug!(db = %parsed.db_url, %profile, command = parsed.command.name(), "starting");

    match parsed.command {
        Command::Review { word, rating } => {
            let mut service = ReviewService::new().with_clock(clock);
            if let Some(path) = &parsed.vocab {
                service = service.with_vocabulary(Arc::new(load_vocabulary(path)?));
            }
            let result = service
                .review_persisted(profile, &word, &rating, &storage)
                .await?;
            print_review(&result);
        }
        Command::Due(options) => {
            let queue = DueQueue::new(clock, Arc::clone(&storage.items));
            for identifier in queue.due_items(profile, options).await? {
                println!("{identifier}");
            }
        }
        Command::Overview => {
            let progress = ProgressService::new(clock, &storage);
            let overview = progress.overview(profile).await?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        Command::Weak { limit } => {
            let progress = ProgressService::new(clock, &storage);
            for weak in progress.weak_items(profile, limit).await? {
                println!(
                    "{}\tmastery {}\tsuccess {:.0}%\tpriority {:.2}",
                    weak.identifier,
                    weak.mastery_level,
                    weak.success_rate * 100.0,
                    weak.priority,
                );
            }
        }
        Command::Reset { word } => {
            let item = ReviewService::new()
                .with_clock(clock)
                .reset_item(profile, &word, storage.items.as_ref())
                .await?;
            println!("{}: reset, due now", item.identifier());
        }
        Command::Goal { words } => {
            let progress = ProgressService::new(clock, &storage);
            let goal = match words {
                Some(goal) => progress.set_daily_goal(profile, goal.words()).await?,
                None => progress.daily_goal(profile).await?,
            };
            println!("daily goal: {goal}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|a| (*a).to_string()), |_| None)
    }

    #[test]
    fn review_with_globals_anywhere() {
        let args = parse(&["--profile", "sari", "review", "terima kasih", "easy", "--db", "sqlite::memory:"])
            .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.profile.as_str(), "sari");
        assert_eq!(
            args.command,
            Command::Review {
                word: ItemId::new("terima kasih").unwrap(),
                rating: "easy".into(),
            }
        );
    }

    #[test]
    fn due_collects_its_flags() {
        let args = parse(&["due", "--level", "Absolute Beginner", "--limit", "5", "--shuffle"]).unwrap();
        assert_eq!(
            args.command,
            Command::Due(DueQueueOptions {
                level: Some(Level::AbsoluteBeginner),
                limit: Some(5),
                shuffle: true,
            })
        );
        assert_eq!(args.profile.as_str(), DEFAULT_PROFILE);
    }

    #[test]
    fn env_supplies_defaults_and_flags_override() {
        let env = |key: &str| match key {
            "KOSAKATA_PROFILE" => Some("budi".to_string()),
            "KOSAKATA_VOCAB" => Some("/data/vocab.json".to_string()),
            _ => None,
        };
        let args = Args::parse(["overview".to_string()], env).unwrap();
        assert_eq!(args.profile.as_str(), "budi");
        assert_eq!(args.vocab, Some(PathBuf::from("/data/vocab.json")));

        let args = Args::parse(
            ["--profile".to_string(), "sari".to_string(), "overview".to_string()],
            env,
        )
        .unwrap();
        assert_eq!(args.profile.as_str(), "sari");
    }

    #[test]
    fn flags_outside_their_command_are_rejected() {
        assert!(matches!(
            parse(&["overview", "--shuffle"]),
            Err(ArgsError::FlagNotAllowed { flag: "--shuffle", command: "overview" })
        ));
        assert!(matches!(
            parse(&["reset", "halo", "--limit", "3"]),
            Err(ArgsError::FlagNotAllowed { flag: "--limit", command: "reset" })
        ));
        assert_eq!(
            parse(&["weak", "--limit", "3"]).unwrap().command,
            Command::Weak { limit: Some(3) }
        );
    }

    #[test]
    fn malformed_input_is_reported() {
        assert!(matches!(parse(&[]), Err(ArgsError::MissingCommand)));
        assert!(matches!(parse(&["learn"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(parse(&["review", "halo"]), Err(ArgsError::MissingOperand { .. })));
        assert!(matches!(parse(&["review", " ", "easy"]), Err(ArgsError::InvalidWord { .. })));
        assert!(matches!(parse(&["due", "--level", "expert"]), Err(ArgsError::InvalidLevel { .. })));
        assert!(matches!(parse(&["due", "--limit", "-1"]), Err(ArgsError::InvalidLimit { .. })));
        assert!(matches!(parse(&["due", "--limit"]), Err(ArgsError::MissingValue { flag: "--limit" })));
        assert!(matches!(parse(&["overview", "extra"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(parse(&["--profile", "", "overview"]), Err(ArgsError::InvalidProfile { .. })));
    }

    #[test]
    fn goal_shows_or_sets_within_bounds() {
        assert_eq!(parse(&["goal"]).unwrap().command, Command::Goal { words: None });
        assert_eq!(
            parse(&["goal", "35"]).unwrap().command,
            Command::Goal {
                words: Some(DailyGoal::new(35).unwrap())
            }
        );
        for raw in ["4", "101", "ten", "-5"] {
            assert!(matches!(
                parse(&["goal", raw]),
                Err(ArgsError::InvalidGoal { raw: r }) if r == raw
            ));
        }
        assert!(matches!(
            parse(&["goal", "30", "--limit", "2"]),
            Err(ArgsError::FlagNotAllowed { flag: "--limit", command: "goal" })
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/kosakata.db".to_string());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/kosakata.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
