//! Configuration management with file persistence
//!
//! Non-secret settings live in `config.toml`; credentials are read from the
//! environment only.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variables that may carry the LLM API key, in lookup order
pub const API_KEY_VARS: [&str; 2] = ["CAREGRAPH_API_KEY", "GITHUB_TOKEN"];

/// CareGraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub graph: GraphConfig,
    pub pipeline: PipelineConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub validation_max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            validation_max_tokens: 100,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub database: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cardinality cap the generator asks for (`LIMIT n`)
    pub result_limit: usize,
    /// Structural check of generated queries before the model verdict
    pub syntax_precheck: bool,
    /// Reject generated queries containing write clauses
    pub read_only: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            result_limit: 5,
            syntax_precheck: true,
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// SQLite file for conversation history (defaults under the config dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Secrets resolved from the environment at startup
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub neo4j_username: String,
    pub neo4j_password: String,
    pub neo4j_uri: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("neo4j_username", &self.neo4j_username)
            .field("neo4j_password", &"***")
            .field("neo4j_uri", &self.neo4j_uri)
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| env::var(key).ok())
    }

    /// Resolve credentials through a lookup function
    ///
    /// All missing variables are reported together.
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = API_KEY_VARS.iter().find_map(|key| get(key));
        let neo4j_username = get("NEO4J_USERNAME");
        let neo4j_password = get("NEO4J_PASSWORD");

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(API_KEY_VARS.join(" or "));
        }
        if neo4j_username.is_none() {
            missing.push("NEO4J_USERNAME".to_string());
        }
        if neo4j_password.is_none() {
            missing.push("NEO4J_PASSWORD".to_string());
        }

        match (api_key, neo4j_username, neo4j_password) {
            (Some(api_key), Some(neo4j_username), Some(neo4j_password)) => Ok(Self {
                api_key,
                neo4j_username,
                neo4j_password,
                neo4j_uri: get("NEO4J_URI"),
            }),
            _ => Err(Error::ConfigError(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            ))),
        }
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", chars[chars.len() - 4..].iter().collect::<String>())
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(API_KEY_VARS.iter().find_map(|key| env::var(key).ok()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl GraphConfig {
    /// The effective graph endpoint, preferring an explicit override
    pub fn effective_uri(&self, credentials: &Credentials) -> Result<String> {
        let uri = credentials
            .neo4j_uri
            .clone()
            .unwrap_or_else(|| self.uri.clone());

        if uri.starts_with("http://") || uri.starts_with("https://") {
            Ok(uri.trim_end_matches('/').to_string())
        } else {
            Err(Error::ConfigError(format!(
                "Unsupported graph URI '{}': use the Neo4j HTTP endpoint (http:// or https://)",
                uri
            )))
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CAREGRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("caregraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the conversation history database path
    pub fn history_path(&self) -> anyhow::Result<PathBuf> {
        match &self.history.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("history.db")),
        }
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if self.pipeline.result_limit == 0 {
            return Err(anyhow!("pipeline.result_limit must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.endpoint" => Ok(self.llm.endpoint.clone()),
            "llm.model" => Ok(self.llm.model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.validation_max_tokens" => Ok(self.llm.validation_max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            "graph.uri" => Ok(self.graph.uri.clone()),
            "graph.database" => Ok(self.graph.database.clone()),
            "graph.timeout_secs" => Ok(self.graph.timeout_secs.to_string()),

            "pipeline.result_limit" => Ok(self.pipeline.result_limit.to_string()),
            "pipeline.syntax_precheck" => Ok(self.pipeline.syntax_precheck.to_string()),
            "pipeline.read_only" => Ok(self.pipeline.read_only.to_string()),

            "history.path" => Ok(self.history_path()?.display().to_string()),

            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use CAREGRAPH_API_KEY or GITHUB_TOKEN env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `caregraph config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.endpoint" => self.llm.endpoint = value.trim_end_matches('/').to_string(),
            "llm.model" => self.llm.model = value.to_string(),
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.validation_max_tokens" => {
                self.llm.validation_max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid validation_max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "graph.uri" => self.graph.uri = value.to_string(),
            "graph.database" => self.graph.database = value.to_string(),
            "graph.timeout_secs" => {
                self.graph.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "pipeline.result_limit" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid result_limit value: {}", value))?;
                if limit == 0 {
                    return Err(anyhow!("pipeline.result_limit must be at least 1"));
                }
                self.pipeline.result_limit = limit;
            }
            "pipeline.syntax_precheck" => {
                self.pipeline.syntax_precheck = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }
            "pipeline.read_only" => {
                self.pipeline.read_only = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }

            "history.path" => self.history.path = Some(PathBuf::from(value)),

            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the CAREGRAPH_API_KEY or GITHUB_TOKEN environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `caregraph config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "llm.endpoint",
            "llm.model",
            "llm.temperature",
            "llm.max_tokens",
            "llm.validation_max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "graph.uri",
            "graph.database",
            "graph.timeout_secs",
            "pipeline.result_limit",
            "pipeline.syntax_precheck",
            "pipeline.read_only",
            "history.path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.llm.validation_max_tokens, 100);
        assert_eq!(config.pipeline.result_limit, 5);
        assert!(config.pipeline.read_only);
    }

    #[test]
    fn test_credentials_resolve() {
        let creds = Credentials::resolve(lookup(&[
            ("GITHUB_TOKEN", "ghp_secret1234"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(creds.api_key, "ghp_secret1234");
        assert!(creds.neo4j_uri.is_none());

        let debug = format!("{:?}", creds);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("***1234"));
    }

    #[test]
    fn test_credentials_prefers_caregraph_key() {
        let creds = Credentials::resolve(lookup(&[
            ("CAREGRAPH_API_KEY", "primary"),
            ("GITHUB_TOKEN", "secondary"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(creds.api_key, "primary");
    }

    #[test]
    fn test_credentials_reports_all_missing() {
        let err = Credentials::resolve(lookup(&[("NEO4J_USERNAME", "  ")])).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(msg.contains("CAREGRAPH_API_KEY or GITHUB_TOKEN"));
        assert!(msg.contains("NEO4J_USERNAME"));
        assert!(msg.contains("NEO4J_PASSWORD"));
    }

    #[test]
    fn test_effective_uri() {
        let mut creds = Credentials::resolve(lookup(&[
            ("GITHUB_TOKEN", "k"),
            ("NEO4J_USERNAME", "u"),
            ("NEO4J_PASSWORD", "p"),
        ]))
        .unwrap();
        let graph = GraphConfig::default();
        assert_eq!(graph.effective_uri(&creds).unwrap(), "http://localhost:7474");

        creds.neo4j_uri = Some("https://graph.example.com/".to_string());
        assert_eq!(graph.effective_uri(&creds).unwrap(), "https://graph.example.com");

        creds.neo4j_uri = Some("bolt://localhost:7687".to_string());
        assert!(matches!(graph.effective_uri(&creds), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            [llm]
            model = "gpt-4o"

            [pipeline]
            result_limit = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.pipeline.result_limit, 10);
        assert_eq!(config.graph.database, "neo4j");
    }

    #[test]
    fn test_from_toml_rejects_stored_api_key() {
        let result = Config::from_toml("[llm]\napi_key = \"sk-123\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("graph.database", "clinic").unwrap();
        config.set("pipeline.result_limit", "20").unwrap();
        config.set("pipeline.read_only", "false").unwrap();
        assert_eq!(config.get("graph.database").unwrap(), "clinic");
        assert_eq!(config.get("pipeline.result_limit").unwrap(), "20");
        assert_eq!(config.get("pipeline.read_only").unwrap(), "false");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("llm.temperature", "3.5").is_err());
        assert!(config.set("pipeline.result_limit", "0").is_err());
        assert!(config.set("api_key", "secret").is_err());
        assert!(config.set("unknown.key", "x").is_err());
    }
}
