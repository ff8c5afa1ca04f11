use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

pub const WORKSPACE_ENV: &str = "ATTENDANCED_WORKSPACE";
pub const LOG_ENV: &str = "ATTENDANCED_LOG";

/// Startup settings. Read once; everything else is per-request state.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(WORKSPACE_ENV).ok(),
            std::env::var(LOG_ENV).ok(),
        )
    }

    fn from_vars(workspace: Option<String>, log: Option<String>) -> Self {
        let workspace = workspace
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let log_level = log
            .as_deref()
            .and_then(|s| LevelFilter::from_str(s.trim()).ok())
            .unwrap_or(LevelFilter::INFO);
        Config {
            workspace,
            log_level,
        }
    }
}
