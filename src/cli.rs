//! CLI parsing and orchestration. Resolves settings, runs the backup, maps errors to exit codes.

use crate::config::{self, ConfigError, DEFAULT_OUTPUT};
use crate::imdb::{Endpoints, ImdbSession, SessionSettings, DEFAULT_DELAY_MS, DEFAULT_TIMEOUT_SECS};
use crate::pipeline::{self, BackupOptions, PipelineError, RunSummary};
use crate::sanitize::{self, DEFAULT_MAX_NAME_LEN};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Config(_) => 1,
            CliRunError::Pipeline(e) => match e {
                PipelineError::Configuration(_) => 1,
                PipelineError::Authentication(_) => 2,
                PipelineError::Archive(_) => 3,
                PipelineError::Cancelled { .. } => 130,
            },
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "imdb-backup")]
#[command(about = "Back up your IMDb ratings, watchlist and lists into one zip of CSV files")]
#[command(
    after_help = "The session cookie is read from imdb_cookie.json (or imdb_cookie.txt) next to the executable unless --cookies is given. Settings file keys (output, cookie_file, user_agent, request_delay_ms, timeout_secs, max_name_len, pause_before_exit) live in imdb-backup.toml. CLI flags override settings."
)]
pub struct Args {
    /// Archive path. Default: ./imdb_exported_lists.zip
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Credential file (JSON with "id" and optional "sid", or the bare cookie value).
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Wait for Enter before exiting (for double-click launches).
    #[arg(long, conflicts_with = "no_pause")]
    pub pause: bool,

    /// Never wait before exiting, even if the settings file asks for it.
    #[arg(long)]
    pub no_pause: bool,

    /// Delay between requests in milliseconds (overrides config; default 200).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Longest archive entry name, without extension (overrides config; default 80, minimum 16).
    #[arg(long)]
    pub max_name_len: Option<usize>,

    /// Only print warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Debug output and full error chains.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Install the stdout logger. `RUST_LOG` wins over the flags.
pub fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,imdb_backup={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .without_time()
        .init();
}

/// Whether to wait for Enter before exiting. Unreadable config counts as "no".
pub fn pause_requested(args: &Args) -> bool {
    if args.pause {
        return true;
    }
    if args.no_pause {
        return false;
    }
    config::load_config()
        .ok()
        .flatten()
        .and_then(|c| c.pause_before_exit)
        .unwrap_or(false)
}

pub fn pause_before_exit() {
    print!("\nPress Enter to exit...");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}

/// Output must be a file in an existing directory.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if path.is_dir() {
        return Err(CliRunError::InvalidInput(format!(
            "Cannot write output: {} is a directory.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Ctrl-C stops the run before the next export instead of killing the process mid-write.
fn install_interrupt_handler(cancel: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if !cancel.swap(true, Ordering::SeqCst) {
            tracing::warn!("Interrupted; stopping after the current request.");
        }
    });
    if let Err(e) = result {
        tracing::warn!("Could not install the Ctrl-C handler: {}", e);
    }
}

/// Entry point for the CLI. Returns the run summary; Err carries exit code and message.
pub fn run(args: &Args) -> Result<RunSummary, CliRunError> {
    let config = config::load_config()?.unwrap_or_default();

    let output = args
        .output
        .clone()
        .or(config.output)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    validate_output_path(&output)?;
    let max_name_len = sanitize::check_max_name_len(
        args.max_name_len
            .or(config.max_name_len)
            .unwrap_or(DEFAULT_MAX_NAME_LEN),
    )?;

    let cookie_path = match args.cookies.clone().or(config.cookie_file) {
        Some(p) => p,
        None => config::default_credentials_path(&config::tool_dir()?),
    };

    let settings = SessionSettings {
        user_agent: args.user_agent.clone().or(config.user_agent),
        delay_ms: args
            .delay_ms
            .or(config.request_delay_ms)
            .unwrap_or(DEFAULT_DELAY_MS),
        timeout_secs: args
            .timeout
            .or(config.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        endpoints: Endpoints::default(),
    };
    let options = BackupOptions {
        output,
        max_name_len,
    };
    tracing::debug!(cookies = %cookie_path.display(), ?settings, ?options, "starting backup");

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&cancel));
    let summary = pipeline::run(
        || {
            let credentials = config::load_credentials(&cookie_path)?;
            ImdbSession::connect(&credentials, &settings)
        },
        &options,
        &cancel,
    )?;

    for skipped in &summary.skipped {
        tracing::warn!(
            "Not backed up: {} ({}): {}",
            skipped.descriptor.display_title(),
            skipped.descriptor.id,
            skipped.reason
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveError;
    use crate::imdb::ImdbError;

    #[test]
    fn parse_minimal_args() {
        let args = Args::parse_from(["imdb-backup"]);
        assert!(args.output.is_none());
        assert!(args.cookies.is_none());
        assert!(!args.pause);
        assert!(!args.no_pause);
        assert!(!args.quiet);
        assert!(!args.verbose);
    }

    #[test]
    fn parse_all_args() {
        let args = Args::parse_from([
            "imdb-backup",
            "-o",
            "out/lists.zip",
            "--cookies",
            "secret.json",
            "--pause",
            "--delay-ms",
            "500",
            "--timeout",
            "10",
            "--user-agent",
            "Test/1.0",
            "--max-name-len",
            "40",
            "-v",
        ]);
        assert_eq!(args.output, Some(PathBuf::from("out/lists.zip")));
        assert_eq!(args.cookies, Some(PathBuf::from("secret.json")));
        assert!(args.pause);
        assert_eq!(args.delay_ms, Some(500));
        assert_eq!(args.timeout, Some(10));
        assert_eq!(args.user_agent.as_deref(), Some("Test/1.0"));
        assert_eq!(args.max_name_len, Some(40));
        assert!(args.verbose);
    }

    #[test]
    fn pause_flags_conflict() {
        assert!(Args::try_parse_from(["imdb-backup", "--pause", "--no-pause"]).is_err());
        assert!(Args::try_parse_from(["imdb-backup", "-q", "-v"]).is_err());
    }

    #[test]
    fn explicit_pause_flags_skip_config() {
        assert!(pause_requested(&Args::parse_from(["imdb-backup", "--pause"])));
        assert!(!pause_requested(&Args::parse_from([
            "imdb-backup",
            "--no-pause"
        ])));
    }

    #[test]
    fn validate_output_path_parent_exists() {
        let path = std::env::temp_dir().join("imdb_backup_cli_test_output.zip");
        assert!(validate_output_path(&path).is_ok());
        assert!(validate_output_path(Path::new("plain.zip")).is_ok());
    }

    #[test]
    fn validate_output_path_parent_missing() {
        let path = PathBuf::from("/nonexistent_dir_imdb_backup_xyz/output.zip");
        let result = validate_output_path(&path);
        match result {
            Err(CliRunError::InvalidInput(msg)) => {
                assert!(msg.contains("parent directory does not exist"))
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn validate_output_path_rejects_directory() {
        let result = validate_output_path(&std::env::temp_dir());
        assert!(matches!(result, Err(CliRunError::InvalidInput(_))));
    }

    #[test]
    fn max_name_len_below_minimum_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out.zip");
        let output_arg = output.to_string_lossy().into_owned();
        let args = Args::parse_from([
            "imdb-backup",
            "-o",
            output_arg.as_str(),
            "--max-name-len",
            "10",
        ]);
        let err = match run(&args) {
            Err(e) => e,
            Ok(_) => panic!("expected the name limit to be rejected"),
        };
        assert!(matches!(
            err,
            CliRunError::Config(ConfigError::InvalidSetting { ref key, .. }) if key == "max_name_len"
        ));
        assert_eq!(err.exit_code(), 1);
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Config(ConfigError::MissingCredential { field: "id".into() }).exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Pipeline(PipelineError::Configuration(
                ConfigError::MissingCredential { field: "id".into() }
            ))
            .exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Pipeline(PipelineError::Authentication(ImdbError::Authentication {
                url: "https://www.imdb.com/profile".into(),
                reason: "sign-in".into(),
            }))
            .exit_code(),
            2
        );
        assert_eq!(
            CliRunError::Pipeline(PipelineError::Archive(ArchiveError::DuplicateEntry {
                name: "a.csv".into()
            }))
            .exit_code(),
            3
        );
        assert_eq!(
            CliRunError::Pipeline(PipelineError::Cancelled {
                exported: 1,
                discovered: 3
            })
            .exit_code(),
            130
        );
    }
}
