//! Host options.
//!
//! Options come from code, from environment variables (`<PREFIX>_<KEY>`), or
//! with the `config` feature from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::host::InstanceContextMode;

/// Options a [`ServiceHost`](crate::host::ServiceHost) is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HostOptions {
    /// Name of the service in configuration and logs
    pub configuration_name: String,
    /// Prefixes for relative endpoint addresses; the first one is used
    pub base_addresses: Vec<String>,
    /// Log each configured endpoint at `info`
    pub log_endpoints: bool,
    /// Instancing mode for registrations that neither carry nor declare a behavior
    pub default_instance_mode: Option<InstanceContextMode>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            configuration_name: "ferrous-host".to_string(),
            base_addresses: Vec::new(),
            log_endpoints: true,
            default_instance_mode: None,
        }
    }
}

impl HostOptions {
    pub fn new(configuration_name: impl Into<String>) -> Self {
        Self {
            configuration_name: configuration_name.into(),
            ..Self::default()
        }
    }

    pub fn with_base_address(mut self, address: impl Into<String>) -> Self {
        self.base_addresses.push(address.into());
        self
    }

    pub fn with_log_endpoints(mut self, enabled: bool) -> Self {
        self.log_endpoints = enabled;
        self
    }

    pub fn with_default_instance_mode(mut self, mode: InstanceContextMode) -> Self {
        self.default_instance_mode = Some(mode);
        self
    }

    /// Reads `<PREFIX>_CONFIGURATION_NAME`, `<PREFIX>_BASE_ADDRESSES`
    /// (comma-separated), `<PREFIX>_LOG_ENDPOINTS` and
    /// `<PREFIX>_INSTANCE_MODE`. Unset variables keep their defaults.
    pub fn from_env(prefix: &str) -> HostResult<Self> {
        let prefix = prefix.to_uppercase();
        Self::from_lookup(|key| env::var(format!("{prefix}_{key}")).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> HostResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(name) = lookup("CONFIGURATION_NAME") {
            options.configuration_name = name;
        }
        if let Some(addresses) = lookup("BASE_ADDRESSES") {
            options.base_addresses = addresses
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(flag) = lookup("LOG_ENDPOINTS") {
            options.log_endpoints = parse_flag("LOG_ENDPOINTS", &flag)?;
        }
        if let Some(mode) = lookup("INSTANCE_MODE") {
            options.default_instance_mode = Some(mode.parse()?);
        }
        Ok(options)
    }

    /// Parses options from JSON; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> HostResult<Self> {
        serde_json::from_str(json).map_err(|e| HostError::Config {
            message: e.to_string(),
        })
    }

    /// `relative` resolved against the first base address; absolute
    /// addresses (containing `://`) are returned unchanged.
    pub fn resolve_address(&self, relative: &str) -> String {
        match self.base_addresses.first() {
            Some(base) if !relative.contains("://") => {
                if relative.is_empty() {
                    base.clone()
                } else {
                    format!(
                        "{}/{}",
                        base.trim_end_matches('/'),
                        relative.trim_start_matches('/')
                    )
                }
            }
            _ => relative.to_string(),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> HostResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HostError::Config {
            message: format!("{key}: expected a boolean, got `{other}`"),
        }),
    }
}
