use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Entity reader configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Maximum selection depth of one query document
    ///
    /// Root entity blocks are depth 1 and every relation field adds one, so
    /// `1` allows root scalars only and `2` one level of relations.
    #[validate(range(
        min = 1,
        max = 64,
        message = "Max selection depth must be between 1 and 64"
    ))]
    pub max_selection_depth: u32,

    /// Upper bound for the LIMIT of root entity queries
    #[validate(range(
        min = 1,
        max = 100000,
        message = "Max root limit must be between 1 and 100000"
    ))]
    pub max_root_limit: u32,

    /// Log generated SQL at info instead of debug level
    pub log_statements: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_selection_depth: 16,
            max_root_limit: 10_000,
            log_statements: false,
        }
    }
}

impl ReaderConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_selection_depth: parse_env_var("RELGRAPH_MAX_SELECTION_DEPTH", "16")?,
            max_root_limit: parse_env_var("RELGRAPH_MAX_ROOT_LIMIT", "10000")?,
            log_statements: parse_env_var("RELGRAPH_LOG_STATEMENTS", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Level used for statement logging
    pub fn statement_log_level(&self) -> log::Level {
        if self.log_statements {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
