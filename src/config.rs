//! Resolver configuration.
//!
//! Values come from built-in defaults, then the environment, then explicit
//! overrides (usually command-line flags), in that order of priority.

use std::time::Duration;

/// Environment variable holding a comma-separated list of remote locator schemes.
pub const ENV_REMOTE_SCHEMES: &str = "BUNDLEARCH_REMOTE_SCHEMES";

/// Environment variable holding the remote read timeout, in whole seconds. `0` disables it.
pub const ENV_READ_TIMEOUT: &str = "BUNDLEARCH_READ_TIMEOUT_SECS";

/// Scheme recognized as remote object storage when nothing else is configured.
pub const DEFAULT_REMOTE_SCHEME: &str = "azfs";

/// Upper bound on a single remote request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Schemes (without `://`) that mark a locator as remote object storage.
    pub remote_schemes: Vec<String>,
    /// Deadline applied to each request's remote reads. `None` means no deadline.
    pub read_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            remote_schemes: vec![DEFAULT_REMOTE_SCHEME.to_string()],
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

impl ResolverConfig {
    /// Builds a configuration from the defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ResolverConfig::from_env`] with an injectable lookup, so tests
    /// need not mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_REMOTE_SCHEMES) {
            let schemes = parse_schemes(&raw);
            if schemes.is_empty() {
                return Err(format!("{} is set but names no scheme", ENV_REMOTE_SCHEMES));
            }
            cfg.remote_schemes = schemes;
        }
        if let Some(raw) = lookup(ENV_READ_TIMEOUT) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a whole number of seconds, got '{}'", ENV_READ_TIMEOUT, raw))?;
            cfg.read_timeout = timeout_from_secs(secs);
        }
        Ok(cfg)
    }

    /// Applies a timeout override in seconds (`0` disables the deadline).
    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.read_timeout = timeout_from_secs(secs);
        }
        self
    }

    pub fn is_remote_scheme(&self, scheme: &str) -> bool {
        self.remote_schemes.iter().any(|s| s == scheme)
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

fn parse_schemes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches("://").to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = ResolverConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, ResolverConfig::default());
        assert!(cfg.is_remote_scheme("azfs"));
        assert_eq!(cfg.read_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn environment_overrides() {
        let cfg = ResolverConfig::from_lookup(lookup_from(&[
            (ENV_REMOTE_SCHEMES, "azfs, s3://, ,gs"),
            (ENV_READ_TIMEOUT, "12"),
        ]))
        .unwrap();
        assert_eq!(cfg.remote_schemes, vec!["azfs", "s3", "gs"]);
        assert_eq!(cfg.read_timeout, Some(Duration::from_secs(12)));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let cfg = ResolverConfig::from_lookup(lookup_from(&[(ENV_READ_TIMEOUT, "0")])).unwrap();
        assert_eq!(cfg.read_timeout, None);
        let cfg = cfg.with_timeout_secs(Some(3));
        assert_eq!(cfg.read_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(ResolverConfig::from_lookup(lookup_from(&[(ENV_READ_TIMEOUT, "soon")])).is_err());
        assert!(ResolverConfig::from_lookup(lookup_from(&[(ENV_REMOTE_SCHEMES, " , ")])).is_err());
    }
}
