//! Configuration management for FlowChat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{FlowchatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for FlowChat
///
/// Holds everything the orchestrator and its front ends need: the workflow
/// engine endpoint, the persistent store endpoint, and the HTTP server
/// binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workflow engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Persistent store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Inbound HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Workflow engine configuration
///
/// The engine is an external HTTP service (a Langflow-style flow runner)
/// that accepts a prompt plus a session identifier and returns a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Full URL of the flow run endpoint
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Optional bearer token for the engine
    #[serde(default)]
    pub api_key: Option<String>,

    /// Deadline for a single engine call, in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout_seconds: u64,

    /// Static capability-module map sent as `tweaks` on every call
    ///
    /// Treated as opaque configuration: the engine activates the named
    /// modules, the orchestrator never varies it per call.
    #[serde(default = "default_tweaks")]
    pub tweaks: serde_json::Value,
}

fn default_engine_url() -> String {
    "http://localhost:7860/api/v1/run/chat".to_string()
}

fn default_engine_timeout() -> u64 {
    60
}

fn default_tweaks() -> serde_json::Value {
    serde_json::json!({})
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            api_key: None,
            timeout_seconds: default_engine_timeout(),
            tweaks: default_tweaks(),
        }
    }
}

/// Persistent store configuration
///
/// Points at a PostgREST-style HTTP store exposing `sessions` and
/// `messages` collections. When `ephemeral` is set the remote store is
/// ignored and an in-process store is used instead (useful for local
/// development and demos; nothing survives a restart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store's REST endpoint
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Store API key, sent as both `apikey` and bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Use the in-process store instead of the remote one
    #[serde(default)]
    pub ephemeral: bool,
}

fn default_store_url() -> String {
    "http://localhost:54321/rest/v1".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            api_key: None,
            ephemeral: false,
        }
    }
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FlowchatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| FlowchatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("FLOWCHAT_ENGINE_URL") {
            self.engine.url = url;
        }

        if let Ok(key) = std::env::var("FLOWCHAT_ENGINE_API_KEY") {
            self.engine.api_key = Some(key);
        }

        if let Ok(timeout) = std::env::var("FLOWCHAT_ENGINE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.engine.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid FLOWCHAT_ENGINE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(url) = std::env::var("FLOWCHAT_STORE_URL") {
            self.store.url = url;
        }

        if let Ok(key) = std::env::var("FLOWCHAT_STORE_API_KEY") {
            self.store.api_key = Some(key);
        }

        if let Ok(host) = std::env::var("FLOWCHAT_SERVER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("FLOWCHAT_SERVER_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid FLOWCHAT_SERVER_PORT: {}", port);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.engine_url {
            self.engine.url = url.clone();
        }
        if cli.ephemeral {
            self.store.ephemeral = true;
        }
    }

    /// Validate the configuration
    ///
    /// Checks that configured endpoints parse as URLs and that the engine
    /// deadline is non-zero.
    ///
    /// # Errors
    ///
    /// Returns a `FlowchatError::Config` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.engine.url)
            .map_err(|e| FlowchatError::Config(format!("Invalid engine URL: {}", e)))?;

        if !self.store.ephemeral {
            url::Url::parse(&self.store.url)
                .map_err(|e| FlowchatError::Config(format!("Invalid store URL: {}", e)))?;
        }

        if self.engine.timeout_seconds == 0 {
            return Err(
                FlowchatError::Config("engine.timeout_seconds must be non-zero".to_string()).into(),
            );
        }

        if !self.engine.tweaks.is_object() {
            return Err(
                FlowchatError::Config("engine.tweaks must be a JSON object".to_string()).into(),
            );
        }

        Ok(())
    }
}
