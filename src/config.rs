//! Configuration management for the vigil harness
//!
//! Layers, later wins: built-in defaults, a TOML file passed with `--config`,
//! then command-line flags and environment variables.

use crate::error::{Result, VigilError};
use crate::models::{Credentials, HarnessConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// File-based configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    target: Option<TargetSection>,
    http: Option<HttpSection>,
    browser: Option<BrowserSection>,
    rate_limit: Option<RateLimitSection>,
    cors: Option<CorsSection>,
    suites: Option<SuitesSection>,
}

#[derive(Debug, Deserialize)]
struct TargetSection {
    api_url: Option<String>,
    dashboard_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HttpSection {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrowserSection {
    page_timeout_secs: Option<u64>,
    element_timeout_ms: Option<u64>,
    network_idle_ms: Option<u64>,
    settle_ms: Option<u64>,
    headless: Option<bool>,
    screenshot_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RateLimitSection {
    attempts: Option<usize>,
    threshold: Option<usize>,
    strict: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CorsSection {
    allowed_origin: Option<String>,
    disallowed_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuitesSection {
    enabled: Option<Vec<String>>,
}

/// Parses a TOML document on top of the defaults
pub fn parse_config(content: &str) -> Result<HarnessConfig> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut config = HarnessConfig::default();

    if let Some(target) = file_config.target {
        if let Some(api) = target.api_url {
            config.api_url = api;
        }
        if let Some(dashboard) = target.dashboard_url {
            config.dashboard_url = dashboard;
        }
    }

    if let Some(http) = file_config.http {
        if let Some(timeout) = http.timeout_secs {
            config.http_timeout_secs = timeout;
        }
        if let Some(ua) = http.user_agent {
            config.user_agent = ua;
        }
    }

    if let Some(browser) = file_config.browser {
        if let Some(timeout) = browser.page_timeout_secs {
            config.page_timeout_secs = timeout;
        }
        if let Some(ms) = browser.element_timeout_ms {
            config.element_timeout_ms = ms;
        }
        if let Some(ms) = browser.network_idle_ms {
            config.network_idle_ms = ms;
        }
        if let Some(ms) = browser.settle_ms {
            config.settle_ms = ms;
        }
        if let Some(headless) = browser.headless {
            config.headless = headless;
        }
        if let Some(dir) = browser.screenshot_dir {
            config.screenshot_dir = dir;
        }
    }

    if let Some(limits) = file_config.rate_limit {
        if let Some(attempts) = limits.attempts {
            config.rate_limit.attempts = attempts;
        }
        if let Some(threshold) = limits.threshold {
            config.rate_limit.threshold = threshold;
        }
        if let Some(strict) = limits.strict {
            config.rate_limit.strict = strict;
        }
    }

    if let Some(cors) = file_config.cors {
        if cors.allowed_origin.is_some() {
            config.allowed_origin = cors.allowed_origin;
        }
        if let Some(origin) = cors.disallowed_origin {
            config.disallowed_origin = origin;
        }
    }

    if let Some(suites) = file_config.suites {
        if let Some(enabled) = suites.enabled {
            config.suites = enabled;
        }
    }

    Ok(config)
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let content = std::fs::read_to_string(path).map_err(VigilError::IoError)?;
    parse_config(&content)
}

/// Values given on the command line or through the environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub dashboard_url: Option<String>,
    pub suites: Option<Vec<String>>,
    pub http_timeout_secs: Option<u64>,
    pub page_timeout_secs: Option<u64>,
    pub attempts: Option<usize>,
    pub strict_rate_limit: bool,
    pub allowed_origin: Option<String>,
    pub screenshot_dir: Option<PathBuf>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub headed: bool,
}

/// Merges command-line values into an existing HarnessConfig
pub fn merge_cli_args(config: &mut HarnessConfig, overrides: Overrides) {
    if let Some(api) = overrides.api_url {
        config.api_url = api;
    }
    if let Some(dashboard) = overrides.dashboard_url {
        config.dashboard_url = dashboard;
    }
    if let Some(suites) = overrides.suites {
        config.suites = suites
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(t) = overrides.http_timeout_secs {
        config.http_timeout_secs = t;
    }
    if let Some(t) = overrides.page_timeout_secs {
        config.page_timeout_secs = t;
    }
    if let Some(n) = overrides.attempts {
        config.rate_limit.attempts = n;
    }
    if overrides.strict_rate_limit {
        config.rate_limit.strict = true;
    }
    if overrides.allowed_origin.is_some() {
        config.allowed_origin = overrides.allowed_origin;
    }
    if let Some(dir) = overrides.screenshot_dir {
        config.screenshot_dir = dir;
    }
    if overrides.headed {
        config.headless = false;
    }
    if let (Some(email), Some(password)) = (overrides.email, overrides.password) {
        config.credentials = Some(Credentials { email, password });
    }
}

/// Rejects configurations no run could succeed with
pub fn validate(config: &HarnessConfig) -> Result<()> {
    for (name, value) in [
        ("API URL", &config.api_url),
        ("dashboard URL", &config.dashboard_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| VigilError::ConfigError(format!("invalid {name} '{value}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VigilError::ConfigError(format!(
                "{name} '{value}' must use http or https"
            )));
        }
    }

    if config.http_timeout_secs == 0 {
        return Err(VigilError::ConfigError(
            "HTTP timeout must be at least one second".to_string(),
        ));
    }
    if config.page_timeout_secs == 0 {
        return Err(VigilError::ConfigError(
            "page timeout must be at least one second".to_string(),
        ));
    }
    if config.element_timeout_ms == 0 {
        return Err(VigilError::ConfigError(
            "element timeout must be positive".to_string(),
        ));
    }

    let limits = &config.rate_limit;
    if limits.attempts <= limits.threshold {
        return Err(VigilError::ConfigError(format!(
            "rate-limit attempts ({}) must exceed the threshold ({})",
            limits.attempts, limits.threshold
        )));
    }

    if let Some(ref creds) = config.credentials {
        if creds.email.trim().is_empty() || creds.password.is_empty() {
            return Err(VigilError::ConfigError(
                "credentials need both an email and a password".to_string(),
            ));
        }
    }

    Ok(())
}
