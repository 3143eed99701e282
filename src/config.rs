//! Armory configuration.
//!
//! Loaded from `~/.armory/config.toml`. Every key is optional; a missing
//! file means defaults. Environment variables override the file and
//! command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// On-disk shape of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    database: Option<PathBuf>,
    listen: Option<String>,
    busy_timeout_ms: Option<u64>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file.
    pub database: PathBuf,

    /// Socket address for `serve`.
    pub listen: String,

    /// How long a writer waits for the database lock.
    pub busy_timeout: Duration,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub listen: Option<String>,
}

impl Config {
    /// Load config from `~/.armory/config.toml` and the process environment.
    pub fn load(overrides: Overrides) -> Result<Self, String> {
        let root = Self::root().ok_or("could not determine home directory")?;
        let file = read_file(&root.join("config.toml"))?;
        Ok(Self::resolve(&root, file, overrides, |key| std::env::var(key).ok()))
    }

    /// The config directory: `~/.armory`.
    pub fn root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".armory"))
    }

    fn resolve(
        root: &Path,
        file: ConfigFile,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let database = overrides
            .database
            .or_else(|| env("ARMORY_DATABASE").map(PathBuf::from))
            .or(file.database)
            .unwrap_or_else(|| root.join("armory.sqlite"));

        let listen = overrides
            .listen
            .or_else(|| env("ARMORY_LISTEN"))
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

        let busy_timeout =
            Duration::from_millis(file.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS));

        Self {
            database,
            listen,
            busy_timeout,
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, String> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents =
        fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    parse(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
}

fn parse(contents: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(contents)
}
