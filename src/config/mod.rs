//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//!
//! The CBS node name (`$cbs`) and its reply key names are fixed wire constants
//! and have no configuration keys.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::management::{DEFAULT_STATUS_CODE_KEY_NAME, DEFAULT_STATUS_DESCRIPTION_KEY_NAME};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Generic management client configuration
    #[serde(default)]
    pub management: ManagementConfig,

    /// CBS client configuration
    #[serde(default)]
    pub cbs: CbsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(node) = std::env::var("AMQP_MANAGEMENT_NODE") {
            self.management.node = node;
        }
        if let Ok(key) = std::env::var("AMQP_MANAGEMENT_STATUS_CODE_KEY") {
            self.management.status_code_key_name = key;
        }
        if let Ok(key) = std::env::var("AMQP_MANAGEMENT_STATUS_DESCRIPTION_KEY") {
            self.management.status_description_key_name = key;
        }
        if let Some(trace) = env_flag("AMQP_MANAGEMENT_TRACE") {
            self.management.trace = trace;
        }

        if let Ok(token_type) = std::env::var("AMQP_CBS_TOKEN_TYPE") {
            self.cbs.token_type = token_type;
        }
        if let Some(trace) = env_flag("AMQP_CBS_TRACE") {
            self.cbs.trace = trace;
        }

        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Management client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Management node address
    pub node: String,

    /// Application property name of the reply status code
    pub status_code_key_name: String,

    /// Application property name of the reply status description
    pub status_description_key_name: String,

    /// Enable frame tracing on both links
    pub trace: bool,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            node: "$management".to_string(),
            status_code_key_name: DEFAULT_STATUS_CODE_KEY_NAME.to_string(),
            status_description_key_name: DEFAULT_STATUS_DESCRIPTION_KEY_NAME.to_string(),
            trace: false,
        }
    }
}

/// CBS client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbsConfig {
    /// Token type used when the caller does not name one
    pub token_type: String,

    /// Enable frame tracing on the `$cbs` links
    pub trace: bool,
}

impl Default for CbsConfig {
    fn default() -> Self {
        Self {
            token_type: "jwt".to_string(),
            trace: false,
        }
    }
}
