use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Life Alert";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Demo city centre used for seed data (Tampa, FL).
pub const DEMO_CENTER_LAT: f64 = 27.9478;
pub const DEMO_CENTER_LNG: f64 = -82.4584;

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_MAPS_URL: &str = "https://maps.googleapis.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_GUIDANCE_MODEL: &str = "medgemma";
const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 5;
const DEFAULT_GUIDANCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AVG_SPEED_KMH: f64 = 40.0;
const DEFAULT_ASSIGN_RETRIES: u32 = 3;
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Get the application data directory
/// ~/LifeAlert/ (falls back to the system temp dir when no home is set)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("LifeAlert")
}

/// Default location of the dispatch database
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("dispatch.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "life_alert_lib=info,tower_http=info".to_string()
}

/// Runtime configuration, read from `LIFE_ALERT_*` environment variables.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Distance-matrix base URL. Only used when `maps_api_key` is set.
    pub maps_url: String,
    pub maps_api_key: Option<String>,
    pub routing_timeout: Duration,
    /// Average road speed for straight-line ETA estimates.
    pub average_speed_kmh: f64,
    pub ollama_url: String,
    pub guidance_model: String,
    pub guidance_timeout: Duration,
    /// Attempts per candidate when the assignment write hits a busy database.
    pub assign_retries: u32,
    pub event_buffer: usize,
    pub seed_demo: bool,
    pub log_filter: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: default_db_path(),
            maps_url: DEFAULT_MAPS_URL.to_string(),
            maps_api_key: None,
            routing_timeout: Duration::from_secs(DEFAULT_ROUTING_TIMEOUT_SECS),
            average_speed_kmh: DEFAULT_AVG_SPEED_KMH,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            guidance_model: DEFAULT_GUIDANCE_MODEL.to_string(),
            guidance_timeout: Duration::from_secs(DEFAULT_GUIDANCE_TIMEOUT_SECS),
            assign_retries: DEFAULT_ASSIGN_RETRIES,
            event_buffer: DEFAULT_EVENT_BUFFER,
            seed_demo: true,
            log_filter: default_log_filter(),
        }
    }
}

impl DispatchConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unset keys take their defaults. Values that fail to parse are
    /// logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&non_empty, "LIFE_ALERT_BIND", DEFAULT_BIND.parse().unwrap_or(defaults.bind_addr));
        let routing_secs = parse_or(&non_empty, "LIFE_ALERT_ROUTING_TIMEOUT_SECS", DEFAULT_ROUTING_TIMEOUT_SECS);
        let guidance_secs = parse_or(&non_empty, "LIFE_ALERT_GUIDANCE_TIMEOUT_SECS", DEFAULT_GUIDANCE_TIMEOUT_SECS);
        let mut average_speed_kmh = parse_or(&non_empty, "LIFE_ALERT_AVG_SPEED_KMH", DEFAULT_AVG_SPEED_KMH);
        if !(average_speed_kmh.is_finite() && average_speed_kmh > 0.0) {
            tracing::warn!(value = average_speed_kmh, "LIFE_ALERT_AVG_SPEED_KMH must be positive, using default");
            average_speed_kmh = DEFAULT_AVG_SPEED_KMH;
        }

        Self {
            bind_addr,
            db_path: non_empty("LIFE_ALERT_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            maps_url: non_empty("LIFE_ALERT_MAPS_URL").unwrap_or(defaults.maps_url),
            maps_api_key: non_empty("GOOGLE_MAPS_API_KEY"),
            routing_timeout: Duration::from_secs(routing_secs.max(1)),
            average_speed_kmh,
            ollama_url: non_empty("LIFE_ALERT_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            guidance_model: non_empty("LIFE_ALERT_GUIDANCE_MODEL").unwrap_or(defaults.guidance_model),
            guidance_timeout: Duration::from_secs(guidance_secs.max(1)),
            assign_retries: parse_or(&non_empty, "LIFE_ALERT_ASSIGN_RETRIES", DEFAULT_ASSIGN_RETRIES).max(1),
            event_buffer: parse_or(&non_empty, "LIFE_ALERT_EVENT_BUFFER", DEFAULT_EVENT_BUFFER).max(1),
            seed_demo: parse_flag(&non_empty, "LIFE_ALERT_SEED_DEMO", defaults.seed_demo),
            log_filter: non_empty("LIFE_ALERT_LOG").unwrap_or(defaults.log_filter),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }),
        None => default,
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            tracing::warn!(key, value = %v, "Invalid boolean flag, using default");
            default
        }
        None => default,
    }
}
