// src/config.rs
// =============================================================================
// Runtime settings read from the environment.
//
// Everything here has a sensible default, so a plain `repo-grabber fetch-folder`
// works without any configuration. The environment only overrides:
//
//   REPO_GRABBER_BASE_URL              archive host (default https://github.com)
//   REPO_GRABBER_TIMEOUT_SECS          whole-request timeout (default 60)
//   REPO_GRABBER_CONNECT_TIMEOUT_SECS  connect timeout (default 10)
//   REPO_GRABBER_PROXY                 proxy URL applied to every scheme
//   REPO_GRABBER_RETRIES               transport retries per ref (default 2)
//   REPO_GRABBER_BACKOFF_MS            linear backoff step (default 500)
//
// The log filter (REPO_GRABBER_LOG) is read by main.rs when it installs the
// tracing subscriber.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://github.com";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl Settings {
    /// Reads overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests don't have to touch the
    /// real process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(base_url) = non_empty(lookup("REPO_GRABBER_BASE_URL")) {
            url::Url::parse(&base_url)
                .with_context(|| format!("REPO_GRABBER_BASE_URL is not a valid URL: {}", base_url))?;
            settings.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "REPO_GRABBER_TIMEOUT_SECS")? {
            settings.timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "REPO_GRABBER_CONNECT_TIMEOUT_SECS")? {
            settings.connect_timeout = Duration::from_secs(secs);
        }

        settings.proxy = non_empty(lookup("REPO_GRABBER_PROXY"));

        if let Some(retries) = parse_var::<u32, _>(&lookup, "REPO_GRABBER_RETRIES")? {
            settings.retries = retries;
        }

        if let Some(ms) = parse_var::<u64, _>(&lookup, "REPO_GRABBER_BACKOFF_MS")? {
            settings.backoff = Duration::from_millis(ms);
        }

        if settings.timeout.is_zero() || settings.connect_timeout.is_zero() {
            return Err(anyhow!("timeouts must be greater than zero"));
        }

        Ok(settings)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retries, 2);
        assert_eq!(settings.base_url, "https://github.com");
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("REPO_GRABBER_BASE_URL", "http://127.0.0.1:8080/"),
            ("REPO_GRABBER_TIMEOUT_SECS", "5"),
            ("REPO_GRABBER_PROXY", "http://proxy.local:3128"),
            ("REPO_GRABBER_RETRIES", "0"),
            ("REPO_GRABBER_BACKOFF_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(settings.base_url, "http://127.0.0.1:8080");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert_eq!(settings.retries, 0);
        assert_eq!(settings.backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = Settings::from_lookup(lookup_from(&[("REPO_GRABBER_RETRIES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("REPO_GRABBER_RETRIES"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("REPO_GRABBER_TIMEOUT_SECS", "0")]));
        assert!(result.is_err());
    }
}
