//! Local inputs: the optional settings file and the credential file.
//!
//! Settings search order: ./imdb-backup.toml, then $XDG_CONFIG_HOME/imdb-backup/config.toml
//! (or ~/.config/imdb-backup/config.toml). Credentials default to `imdb_cookie.json` next to
//! the executable, falling back to the plain-text `imdb_cookie.txt`.

use crate::imdb::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "imdb-backup.toml";
pub const COOKIE_JSON_FILE: &str = "imdb_cookie.json";
pub const COOKIE_TEXT_FILE: &str = "imdb_cookie.txt";
pub const DEFAULT_OUTPUT: &str = "imdb_exported_lists.zip";

/// Bad or missing local input. Always fatal, raised before any network request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Credential file not found. Create {path} containing your IMDb session cookie (see README).")]
    CredentialsMissing { path: PathBuf },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed credential file {path}: {reason}")]
    CredentialsMalformed { path: PathBuf, reason: String },

    #[error("Credential '{field}' is missing or empty. Put your IMDb session cookie into the credential file.")]
    MissingCredential { field: String },

    #[error("Credential '{field}' is invalid: {reason}")]
    InvalidCredential { field: String, reason: String },

    #[error("Invalid config {path}: {reason}")]
    SettingsInvalid { path: PathBuf, reason: String },

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Cannot determine {what}: {source}")]
    Environment {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Settings file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Archive path. Relative paths are relative to CWD.
    pub output: Option<PathBuf>,
    /// Credential file path, instead of the one next to the executable.
    pub cookie_file: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Minimum delay in milliseconds between requests.
    pub request_delay_ms: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Longest archive entry name, without extension.
    pub max_name_len: Option<usize>,
    /// Wait for Enter before exiting.
    pub pause_before_exit: Option<bool>,
}

/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Environment {
        what: "current directory",
        source: e,
    })?;
    let mut paths = vec![cwd.join(SETTINGS_FILE)];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("imdb-backup").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_from(path).map(Some);
        }
    }
    Ok(None)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&s).map_err(|e| ConfigError::SettingsInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Directory of the running executable; credentials live next to the tool.
pub fn tool_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(|e| ConfigError::Environment {
        what: "executable location",
        source: e,
    })?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Pick the credential file in `dir`: JSON first, then legacy plain text. When neither exists the
/// JSON path is returned so the error names the preferred file.
pub fn default_credentials_path(dir: &Path) -> PathBuf {
    let json = dir.join(COOKIE_JSON_FILE);
    if json.exists() {
        return json;
    }
    let text = dir.join(COOKIE_TEXT_FILE);
    if text.exists() {
        return text;
    }
    json
}

/// Read credentials. A file starting with `{` is JSON; anything else is the bare primary token.
pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::CredentialsMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    parse_credentials(&raw).map_err(|reason| ConfigError::CredentialsMalformed {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse_credentials(raw: &str) -> Result<Credentials, String> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| e.to_string())
    } else if trimmed.lines().count() > 1 {
        Err("plain-text credential file must contain only the session cookie value".to_string())
    } else {
        Ok(Credentials::from_id(trimmed))
    }
}
