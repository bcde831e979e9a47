use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use halt_workspace::config::{self, EnvRegistry, DEFAULT_ENV_FILE};
use halt_workspace::controllers::ShowFilter;
use halt_workspace::databricks::{AzureCliCredential, SessionConfig, WorkspaceSession};
use halt_workspace::resource::{choose_restore_point, Selection, SnapshotStore, DEFAULT_STATE_DIR};
use halt_workspace::table::print_header;
use halt_workspace::WorkspaceManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Halt and restore an Azure Databricks workspace
#[derive(Parser, Debug)]
#[command(name = "halt-workspace", version, about, long_about = None)]
struct Args {
    /// Environment to use (a key of the environment file)
    #[arg(long)]
    env: String,

    /// Environment file mapping environment names to workspace URLs
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Directory holding restore states
    #[arg(long, default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log file, instead of the one under the local data directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show all workspace objects
    Show {
        /// Show only unpaused workflows, running jobs and unterminated compute
        #[arg(short, long)]
        active_only: bool,
    },
    /// Stop the workspace
    Stop {
        /// Principal IDs to ignore when permissions are deleted
        #[arg(short, long, num_args = 1.., required = true)]
        ignored_principals: Vec<i64>,
    },
    /// Restore the workspace
    Restore {
        /// Restore from the most recent restore point without asking
        #[arg(long)]
        latest: bool,

        /// Restore from this restore-state directory
        #[arg(long, conflicts_with = "latest")]
        from: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive: this crate at the chosen level, dependencies at warn
    fn directive(self) -> Option<String> {
        let level = match self {
            LogLevel::Off => return None,
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        Some(format!("warn,halt_workspace={level}"))
    }
}

/// `RUST_LOG` overrides `--log-level` when set
fn log_filter(level: LogLevel) -> Option<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Some(filter),
        Err(_) => level.directive().map(EnvFilter::new),
    }
}

fn setup_logging(level: LogLevel, log_file: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let Some(filter) = log_filter(level) else {
        return Ok(None);
    };

    let log_path = log_file.unwrap_or_else(default_log_path);
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        "Logging started"
    );
    Ok(Some(guard))
}

/// `<local data dir>/halt-workspace/halt-workspace.log`
fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("halt-workspace")
        .join("halt-workspace.log")
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Everything local is validated before the first network call
    let registry = EnvRegistry::load(&args.env_file)?;
    let env = registry.resolve(&args.env)?;
    println!("Using workspace URL: {}", env.workspace_url);
    let account_id = config::account_id_from_env()?;

    let restore_from = match &args.command {
        Command::Restore { latest, from } => {
            let selection = match (from, *latest) {
                (Some(path), _) => Selection::Explicit(path.clone()),
                (None, true) => Selection::Latest,
                (None, false) => Selection::Interactive,
            };
            Some(choose_restore_point(&args.state_dir, &env.name, selection)?)
        }
        _ => None,
    };

    let token = AzureCliCredential::default().get_token().await?;
    let session = Arc::new(WorkspaceSession::new(
        SessionConfig::for_environment(&env, &account_id),
        &token,
    )?);

    match args.command {
        Command::Show { active_only } => {
            let manager = WorkspaceManager::new(session);
            manager.show(ShowFilter { active_only }).await?;
        }
        Command::Stop { ignored_principals } => {
            let manager = WorkspaceManager::new(session).with_ignored_principals(ignored_principals);
            let store = manager.run_store(&args.state_dir)?;
            let reports = manager.stop(&store).await?;

            print_header("Summary");
            for report in reports {
                println!("{}", report);
            }
        }
        Command::Restore { .. } => {
            let path = restore_from.context("restore point was not selected")?;
            let manager = WorkspaceManager::new(session);
            println!("Restoring from {}", path.display());
            let reports = manager.restore(&SnapshotStore::new(path)).await?;

            print_header("Summary");
            for report in reports {
                println!("{}", report);
            }
        }
    }

    Ok(())
}
