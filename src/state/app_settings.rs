use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub api_url: String,
    pub cache_dir: PathBuf,
    /// `None` waits for the service as long as it takes.
    pub api_timeout: Option<Duration>,
}

impl AppSettings {
    pub fn load() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = var("BRACKET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let cache_dir = var("BRACKET_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_cache_dir(&var));
        let api_timeout = var("BRACKET_API_TIMEOUT_SECS").and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => {
                warn!("ignoring BRACKET_API_TIMEOUT_SECS={raw}: expected a positive number of seconds");
                None
            }
        });

        Self { api_url, cache_dir, api_timeout }
    }
}

fn default_cache_dir(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(cache_home) = var("XDG_CACHE_HOME") {
        return PathBuf::from(cache_home).join("bracket-desk");
    }
    if let Some(home) = var("HOME") {
        return PathBuf::from(home).join(".cache").join("bracket-desk");
    }
    PathBuf::from(".bracket-desk")
}
