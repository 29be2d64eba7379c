use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_REFRESH_SECS: u64 = 15;

/// Environment variables consulted for the backend URL, in order.
pub const API_URL_VARS: [&str; 2] = ["APPLYDASH_API_URL", "NEXT_PUBLIC_API_URL"];

#[derive(Debug, Clone)]
pub struct FormDefaults {
    pub positions: String,
    pub locations: String,
    pub remote_only: bool,
    pub openai_model: String,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            positions: "Software Engineer,Backend Engineer".to_string(),
            locations: "United States,Remote".to_string(),
            remote_only: true,
            openai_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub api_url: String,
    pub refresh_interval: Duration,
    pub jobs_limit: Option<u32>,
    pub defaults: FormDefaults,
}

impl PanelConfig {
    pub fn new(api_url: Option<&str>, interval_secs: u64, jobs_limit: Option<u32>) -> Self {
        Self {
            api_url: resolve_api_url(api_url, |key| std::env::var(key).ok()),
            refresh_interval: Duration::from_secs(interval_secs.max(1)),
            jobs_limit,
            defaults: FormDefaults::default(),
        }
    }
}

/// Flag first, then the environment, then the local default.
pub fn resolve_api_url<F>(flag: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    flag.map(str::to_string)
        .into_iter()
        .chain(API_URL_VARS.iter().filter_map(|key| lookup(key)))
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .find(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn log_file_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "applydash") {
        proj_dirs.data_dir().join("applydash.log")
    } else {
        PathBuf::from("applydash.log")
    }
}
