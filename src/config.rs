//! Trigger configuration

use std::time::Duration;

/// Trigger configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    /// Path to the sled database holding the receipts collection
    pub database_path: String,
    /// How long one wait on the change feed may block before the shutdown
    /// flag is checked again
    pub poll_interval_ms: u64,
    /// Process stored receipts once before watching for new ones
    pub catch_up: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            database_path: "./lokal.db".to_string(),
            poll_interval_ms: 250,
            catch_up: true,
        }
    }
}

impl TriggerConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = lookup("LOKAL_DATABASE_PATH").unwrap_or(defaults.database_path);

        let poll_interval_ms = lookup("LOKAL_POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults.poll_interval_ms);

        let catch_up = lookup("LOKAL_CATCH_UP")
            .map(|s| !matches!(s.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(defaults.catch_up);

        Self {
            database_path,
            poll_interval_ms,
            catch_up,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TriggerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, TriggerConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_vars() {
        let config = TriggerConfig::from_lookup(lookup(&[
            ("LOKAL_DATABASE_PATH", "/var/lib/lokal"),
            ("LOKAL_POLL_INTERVAL_MS", "40"),
            ("LOKAL_CATCH_UP", "false"),
        ]));
        assert_eq!(config.database_path, "/var/lib/lokal");
        assert_eq!(config.poll_interval_ms, 40);
        assert!(!config.catch_up);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = TriggerConfig::from_lookup(lookup(&[
            ("LOKAL_POLL_INTERVAL_MS", "soon"),
            ("LOKAL_CATCH_UP", "yes"),
        ]));
        assert_eq!(config.poll_interval_ms, 250);
        assert!(config.catch_up);

        let zero = TriggerConfig::from_lookup(lookup(&[("LOKAL_POLL_INTERVAL_MS", "0")]));
        assert_eq!(zero.poll_interval_ms, 250);
    }
}
