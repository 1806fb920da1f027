use crate::errors::{Error, Result};
use crate::store::ScanPolicy;
use std::env;

pub const DEFAULT_PARAMETER_PREFIX: &str = "/tryout1";
pub const DEFAULT_RAW_PREFIX: &str = "raw";
pub const DEFAULT_PROCESSED_PREFIX: &str = "processed";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Process-level settings. Backend identifiers are not here; those come from
/// the parameter store.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub parameter_prefix: String,
    pub raw_prefix: String,
    pub processed_prefix: String,
    pub scan_policy: ScanPolicy,
    pub log_format: LogFormat,
    pub http_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let parameter_prefix = var("PARAMETER_PREFIX", DEFAULT_PARAMETER_PREFIX)
            .trim_end_matches('/')
            .to_string();
        let raw_prefix = var("RAW_PREFIX", DEFAULT_RAW_PREFIX)
            .trim_matches('/')
            .to_string();
        let processed_prefix = var("PROCESSED_PREFIX", DEFAULT_PROCESSED_PREFIX)
            .trim_matches('/')
            .to_string();
        let scan_policy = var("SCAN_POLICY", "first-page").parse::<ScanPolicy>()?;
        let log_format = match var("LOG_FORMAT", "json").as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(Error::Config(format!(
                    "LOG_FORMAT must be `json` or `text`, got `{}`",
                    other
                )))
            }
        };

        Ok(Self {
            parameter_prefix,
            raw_prefix,
            processed_prefix,
            scan_policy,
            log_format,
            http_addr: var("HTTP_ADDR", DEFAULT_HTTP_ADDR),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parameter_prefix: DEFAULT_PARAMETER_PREFIX.to_string(),
            raw_prefix: DEFAULT_RAW_PREFIX.to_string(),
            processed_prefix: DEFAULT_PROCESSED_PREFIX.to_string(),
            scan_policy: ScanPolicy::FirstPage,
            log_format: LogFormat::Json,
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
        }
    }
}
