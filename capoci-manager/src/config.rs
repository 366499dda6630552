use std::{env::var, num::ParseIntError, time::Duration};

use thiserror::Error;

pub const REGION_ENV: &str = "CAPOCI_REGION";
pub const WATCH_NAMESPACE_ENV: &str = "CAPOCI_WATCH_NAMESPACE";
pub const RECONCILE_TIMEOUT_ENV: &str = "CAPOCI_RECONCILE_TIMEOUT_SECS";
pub const ENABLE_MACHINE_POOL_ENV: &str = "CAPOCI_ENABLE_MACHINE_POOL";

const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60 * 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} is not a valid number of seconds! Reason: {}", RECONCILE_TIMEOUT_ENV, .0)]
    InvalidTimeout(#[source] ParseIntError),
    #[error("{} must be either 'true' or 'false', got '{}'!", .0, .1)]
    InvalidFlag(&'static str, String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManagerConfig {
    /// region used for clusters that don't specify one
    pub region: Option<String>,
    /// limits all controllers to a single namespace
    pub watch_namespace: Option<String>,
    pub reconcile_timeout: Duration,
    pub machine_pool_enabled: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            region: None,
            watch_namespace: None,
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            machine_pool_enabled: false,
        }
    }
}

impl ManagerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Self {
            region: non_empty(REGION_ENV),
            watch_namespace: non_empty(WATCH_NAMESPACE_ENV),
            reconcile_timeout: match non_empty(RECONCILE_TIMEOUT_ENV) {
                Some(secs) => Duration::from_secs(
                    secs.trim().parse().map_err(ConfigError::InvalidTimeout)?,
                ),
                None => Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            },
            machine_pool_enabled: match non_empty(ENABLE_MACHINE_POOL_ENV) {
                Some(flag) => parse_flag(ENABLE_MACHINE_POOL_ENV, &flag)?,
                None => false,
            },
        })
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(name, value.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ManagerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        ManagerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]).unwrap(), ManagerConfig::default());
    }

    #[test]
    fn variables_are_read() {
        let config = config_from(&[
            (REGION_ENV, "us-phoenix-1"),
            (WATCH_NAMESPACE_ENV, "capi-system"),
            (RECONCILE_TIMEOUT_ENV, "60"),
            (ENABLE_MACHINE_POOL_ENV, "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.region.as_deref(), Some("us-phoenix-1"));
        assert_eq!(config.watch_namespace.as_deref(), Some("capi-system"));
        assert_eq!(config.reconcile_timeout, Duration::from_secs(60));
        assert!(config.machine_pool_enabled);
    }

    #[test]
    fn blank_region_counts_as_unset() {
        assert!(config_from(&[(REGION_ENV, "  ")]).unwrap().region.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config_from(&[(RECONCILE_TIMEOUT_ENV, "five")]),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            config_from(&[(ENABLE_MACHINE_POOL_ENV, "yes please")]),
            Err(ConfigError::InvalidFlag(ENABLE_MACHINE_POOL_ENV, _))
        ));
    }
}
