use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use progress_core::model::Path;
use progress_core::progress::{ProgressContext, TreeError};
use services::{
    AppServices, Clock, Credential, RemoteConfig, StoreBackend, SyncError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingPath { command: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidStore { raw: String },
    InvalidDate { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingPath { command } => write!(f, "{command} requires a node path"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidStore { raw } => {
                write!(f, "invalid --store value: {raw} (expected json or sqlite)")
            }
            ArgsError::InvalidDate { raw } => {
                write!(f, "invalid --on value: {raw} (expected YYYY-MM-DD or RFC 3339)")
            }
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
    eprintln!("  cargo run -p app -- [show]                      [options]");
    eprintln!("  cargo run -p app -- toggle   <path>             [options]");
    eprintln!("  cargo run -p app -- complete <path> [--on <date>] [options]");
    eprintln!("  cargo run -p app -- clear    <path>             [options]");
    eprintln!("  cargo run -p app -- sync                        [options]");
    eprintln!("  cargo run -p app -- pull                        [options]");
    eprintln!("  cargo run -p app -- whoami                      [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --schema <file>      course schema (default course.json)");
    eprintln!("  --data-dir <dir>     snapshot directory (default .progress)");
    eprintln!("  --store json|sqlite  snapshot backend (default json)");
    eprintln!("  --db <sqlite_url>    database for --store sqlite");
    eprintln!();
    eprintln!("Paths look like [1,2,0] or 1.2.0.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROGRESS_SCHEMA, PROGRESS_DATA_DIR, PROGRESS_ENV, PROGRESS_SERVER_URL,");
    eprintln!("  PROGRESS_TIMEOUT_SECS, PROGRESS_TOKEN, PROGRESS_EMAIL, PROGRESS_PASSWORD, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show,
    Toggle(Path),
    Complete(Path, Option<DateTime<Utc>>),
    Clear(Path),
    Sync,
    Pull,
    WhoAmI,
}

#[derive(Debug)]
struct Args {
    command: Command,
    schema: PathBuf,
    data_dir: PathBuf,
    backend: Option<String>,
    db_url: Option<String>,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut schema = std::env::var("PROGRESS_SCHEMA")
            .map_or_else(|_| PathBuf::from("course.json"), PathBuf::from);
        let mut data_dir = std::env::var("PROGRESS_DATA_DIR")
            .map_or_else(|_| PathBuf::from(".progress"), PathBuf::from);
        let mut backend = None;
        let mut db_url = None;
        let mut completed_on = None;
        let mut positional = Vec::new();

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--schema" => schema = PathBuf::from(require_value(&mut args, "--schema")?),
                "--data-dir" => data_dir = PathBuf::from(require_value(&mut args, "--data-dir")?),
                "--store" => {
                    let value = require_value(&mut args, "--store")?;
                    if value != "json" && value != "sqlite" {
                        return Err(ArgsError::InvalidStore { raw: value }.into());
                    }
                    backend = Some(value);
                }
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value }.into());
                    }
                    db_url = Some(value);
                }
                "--on" => completed_on = Some(parse_date(&require_value(&mut args, "--on")?)?),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg).into()),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("show") => Command::Show,
            Some("toggle") => Command::Toggle(parse_path(positional.next(), "toggle")?),
            Some("complete") => {
                Command::Complete(parse_path(positional.next(), "complete")?, completed_on)
            }
            Some("clear") => Command::Clear(parse_path(positional.next(), "clear")?),
            Some("sync") => Command::Sync,
            Some("pull") => Command::Pull,
            Some("whoami") => Command::WhoAmI,
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_string()).into()),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra).into());
        }

        Ok(Self {
            command,
            schema,
            data_dir,
            backend,
            db_url,
        })
    }

    fn store_backend(&self) -> StoreBackend {
        match self.backend.as_deref() {
            Some("sqlite") => {
                let url = self.db_url.clone().unwrap_or_else(|| {
                    format!("sqlite:{}", self.data_dir.join("progress.sqlite3").display())
                });
                StoreBackend::Sqlite(normalize_sqlite_url(url))
            }
            _ => StoreBackend::Json(self.data_dir.clone()),
        }
    }
}

/// Accepts `[1,2,0]` or the dotted form `1.2.0` shown by `show`.
fn parse_path(
    raw: Option<String>,
    command: &'static str,
) -> Result<Path, Box<dyn std::error::Error>> {
    let raw = raw.ok_or(ArgsError::MissingPath { command })?;
    let normalized = if raw.contains('.') && !raw.contains(',') {
        raw.replace('.', ",")
    } else {
        raw
    };
    let path = normalized
        .parse::<Path>()
        .map_err(progress_core::Error::from)?;
    Ok(path)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ArgsError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ArgsError::InvalidDate {
            raw: raw.to_string(),
        })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite://") || raw.contains("mode=memory") {
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
    if db_url.contains("mode=memory") {
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

/// Hold a credential from `PROGRESS_TOKEN`, or sign in with
/// `PROGRESS_EMAIL` and `PROGRESS_PASSWORD`.
async fn sign_in(services: &AppServices) -> Result<(), SyncError> {
    if let Ok(token) = std::env::var("PROGRESS_TOKEN") {
        if !token.trim().is_empty() {
            services.session().set(Credential::new(token.trim()));
            return Ok(());
        }
    }
    match (
        std::env::var("PROGRESS_EMAIL"),
        std::env::var("PROGRESS_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => services.auth().login(&email, &password).await,
        _ => Err(SyncError::Unauthenticated),
    }
}

async fn apply_local_change(
    services: &AppServices,
    ctx: &mut ProgressContext,
    command: &Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = Clock::system().now();
    let path = match command {
        Command::Toggle(path) | Command::Complete(path, _) | Command::Clear(path) => path,
        _ => return Ok(()),
    };
    let tree = ctx.tree_mut().ok_or(SyncError::NotBuilt)?;
    let id = tree
        .lookup(path)
        .ok_or_else(|| progress_core::Error::from(TreeError::UnknownPath(path.clone())))?;

    let completed_on = match command {
        Command::Toggle(_) => tree
            .toggle_completion(id, now)
            .map_err(progress_core::Error::from)?,
        Command::Complete(_, on) => {
            let at = on.unwrap_or(now);
            tree.set_completion(id, Some(at))
                .map_err(progress_core::Error::from)?;
            Some(at)
        }
        _ => {
            tree.set_completion(id, None)
                .map_err(progress_core::Error::from)?;
            None
        }
    };
    match completed_on {
        Some(at) => info!(path = %path, completed_on = %at, "marked complete"),
        None => info!(path = %path, "marked incomplete"),
    }

    services.snapshots().save(ctx).await?;

    // Push the change right away when a session is available. Otherwise it
    // is saved as pending and retried by the next `sync`.
    if sign_in(services).await.is_ok() {
        if let Err(err) = services.sync().sync_node(ctx, path).await {
            warn!(path = %path, error = %err, "change kept locally; run `sync` later");
        }
        services.snapshots().save(ctx).await?;
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h" | "help")) {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let backend = args.store_backend();
    if let StoreBackend::Sqlite(url) = &backend {
        prepare_sqlite_file(url)?;
    }
    let remote_config = RemoteConfig::from_env()?;
    let services = AppServices::open(Clock::system(), &args.schema, &backend, remote_config).await?;

    let mut ctx = ProgressContext::new();
    let restored = services.start(&mut ctx).await?;
    info!(restored, "progress tree ready");

    match &args.command {
        Command::Show => {}
        Command::Toggle(_) | Command::Complete(..) | Command::Clear(_) => {
            apply_local_change(&services, &mut ctx, &args.command).await?;
        }
        Command::Sync => {
            // Without credentials, changes that need no remote call still settle.
            match sign_in(&services).await {
                Ok(()) | Err(SyncError::Unauthenticated) => {}
                Err(err) => return Err(err.into()),
            }
            let result = services.sync().sync_dirty(&mut ctx).await;
            services.snapshots().save(&ctx).await?;
            let report = result?;
            for (path, err) in &report.failed {
                eprintln!("{}: {err}", path.dot_text());
            }
            println!(
                "synced {} node(s), {} failed",
                report.synced.len(),
                report.failed.len()
            );
        }
        Command::Pull => {
            sign_in(&services).await?;
            let merged = services.sync().fetch_all(&mut ctx).await?;
            println!("merged {merged} remote record(s)");
            services.snapshots().save(&ctx).await?;
        }
        Command::WhoAmI => {
            sign_in(&services).await?;
            println!("{}", services.auth().verify().await?);
            return Ok(());
        }
    }

    if let Some(tree) = ctx.tree() {
        print!("{}", render::outline(&services.course(), tree));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse(args.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test]
    fn default_command_is_show() {
        assert_eq!(parse(&[]).command, Command::Show);
    }

    #[test]
    fn path_accepts_bracketed_and_dotted_forms() {
        assert_eq!(
            parse(&["toggle", "[1, 2, 0]"]).command,
            Command::Toggle(Path::from([1, 2, 0]))
        );
        assert_eq!(
            parse(&["clear", "1.2.0"]).command,
            Command::Clear(Path::from([1, 2, 0]))
        );
    }

    #[test]
    fn complete_takes_an_optional_date() {
        let args = parse(&["complete", "1.1.0", "--on", "2023-11-14"]);
        let Command::Complete(path, Some(at)) = args.command else {
            panic!("expected complete with a date");
        };
        assert_eq!(path, Path::from([1, 1, 0]));
        assert_eq!(at.to_rfc3339(), "2023-11-14T12:00:00+00:00");
    }

    #[test]
    fn bad_input_is_rejected() {
        let parse_err = |args: &[&str]| Args::parse(args.iter().map(ToString::to_string).collect());
        assert!(parse_err(&["toggle"]).is_err());
        assert!(parse_err(&["toggle", "1.x"]).is_err());
        assert!(parse_err(&["--store", "csv"]).is_err());
        assert!(parse_err(&["launch"]).is_err());
        assert!(parse_err(&["--on", "yesterday"]).is_err());
    }

    #[test]
    fn sqlite_backend_defaults_into_data_dir() {
        let args = parse(&["--store", "sqlite", "--data-dir", "/tmp/progress"]);
        assert_eq!(
            args.store_backend(),
            StoreBackend::Sqlite("sqlite:///tmp/progress/progress.sqlite3".into())
        );
    }
}
