use std::time::Duration;

pub const API_BASE_ENV: &str = "CHURN_API_BASE";
pub const DEFAULT_API_HOST: &str = "http://localhost:8000";
const API_PATH: &str = "/api/churn";

pub const VIEW_PAGE_SIZE: usize = 50;
pub const QUEUE_BATCH: usize = 100;
pub const QUEUE_CAP: usize = 1000;
pub const DEBOUNCE: Duration = Duration::from_millis(350);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection and paging knobs for one dashboard session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub root: String,
    pub timeout: Duration,
    pub page_size: usize,
    pub batch_size: usize,
    pub batch_cap: usize,
    pub debounce: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            root: api_root(DEFAULT_API_HOST),
            timeout: REQUEST_TIMEOUT,
            page_size: VIEW_PAGE_SIZE,
            batch_size: QUEUE_BATCH,
            batch_cap: QUEUE_CAP,
            debounce: DEBOUNCE,
        }
    }
}

impl ApiConfig {
    /// Resolves the backend host from the CLI flag, then `CHURN_API_BASE`,
    /// then the local default.
    pub fn resolve(api_base: Option<&str>, timeout_secs: Option<u64>) -> Self {
        let from_env = std::env::var(API_BASE_ENV).ok();
        let host = api_base
            .map(str::to_string)
            .or(from_env)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let mut config = Self {
            root: api_root(&host),
            ..Self::default()
        };
        if let Some(secs) = timeout_secs {
            config.timeout = Duration::from_secs(secs.max(1));
        }
        config
    }
}

fn api_root(host: &str) -> String {
    format!("{}{}", host.trim().trim_end_matches('/'), API_PATH)
}
