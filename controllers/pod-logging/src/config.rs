//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;

/// Runtime configuration for the Pod Logging Controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Namespace to watch, `None` for all namespaces (`WATCH_NAMESPACE`)
    pub namespace: Option<String>,
    /// Informer resync period, `None` when disabled (`RESYNC_PERIOD_SECS`)
    pub resync_period: Option<Duration>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let resync_period = match lookup("RESYNC_PERIOD_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ControllerError::InvalidConfig(format!(
                        "RESYNC_PERIOD_SECS must be a whole number of seconds, got {:?}: {}",
                        raw, e
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            namespace,
            resync_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_watch_all_namespaces_without_resync() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_namespace_means_all_namespaces() {
        let config = load(&[("WATCH_NAMESPACE", "")]).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_namespace_and_resync_period() {
        let config = load(&[("WATCH_NAMESPACE", "apps"), ("RESYNC_PERIOD_SECS", "300")]).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("apps"));
        assert_eq!(config.resync_period, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_resync_period_disables_resync() {
        let config = load(&[("RESYNC_PERIOD_SECS", "0")]).unwrap();
        assert_eq!(config.resync_period, None);
    }

    #[test]
    fn test_invalid_resync_period_is_rejected() {
        let result = load(&[("RESYNC_PERIOD_SECS", "ten")]);
        assert!(matches!(result, Err(ControllerError::InvalidConfig(_))));
    }
}
