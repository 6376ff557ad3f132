//! Configuration for the chat orchestrator
//!
//! Connection parameters come from the process environment (optionally seeded
//! from a `.env` file). Generation and retrieval parameters are typed,
//! range-checked structures built from command-line flags or a TOML file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::generation::PromptLanguage;

/// Embedding model used for vector search queries
pub const EMBEDDING_MODEL: &str = "cohere.embed-multilingual-v3.0";

/// OCI Generative AI inference API version path segment
pub const API_VERSION: &str = "20231130";

/// Chat settings file layout (`[generation]` and `[retrieval]` tables)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Vector search parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Language of the bundled prompt templates (`en` or `ja`)
    #[serde(default)]
    pub prompt_language: PromptLanguage,
}

impl ChatSettings {
    /// Load settings from a TOML file, filling omitted fields with defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let settings: ChatSettings = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid settings file {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate both sections
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.retrieval.validate()
    }
}

/// Chat model served by OCI Generative AI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatModel {
    /// Cohere Command R+
    #[default]
    #[serde(rename = "cohere.command-r-plus")]
    CommandRPlus,
    /// Cohere Command R (16k context)
    #[serde(rename = "cohere.command-r-16k")]
    CommandR16k,
}

impl ChatModel {
    /// All selectable models
    pub const ALL: [ChatModel; 2] = [ChatModel::CommandRPlus, ChatModel::CommandR16k];

    /// Model identifier as the service expects it
    pub fn id(&self) -> &'static str {
        match self {
            ChatModel::CommandRPlus => "cohere.command-r-plus",
            ChatModel::CommandR16k => "cohere.command-r-16k",
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChatModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ChatModel::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| {
                Error::Config(format!(
                    "Unknown model '{}', expected one of: {}",
                    s,
                    ChatModel::ALL.map(|m| m.id()).join(", ")
                ))
            })
    }
}

/// Sampling and output parameters for one chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model
    pub model: ChatModel,
    /// Stream fragments instead of waiting for the full answer
    pub streaming: bool,
    /// Maximum generated tokens (10..=1024)
    pub max_tokens: u32,
    /// Sampling temperature (0.0..=1.0)
    pub temperature: f32,
    /// Top-k sampling, 0 disables (0..=500)
    pub top_k: u32,
    /// Nucleus sampling (0.0..=0.99)
    pub top_p: f32,
    /// Frequency penalty (0.0..=1.0)
    pub frequency_penalty: f32,
    /// Presence penalty (0.0..=1.0)
    pub presence_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: ChatModel::default(),
            streaming: true,
            max_tokens: 500,
            temperature: 0.3,
            top_k: 0,
            top_p: 0.75,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl GenerationConfig {
    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        check_range("max_tokens", self.max_tokens, 10, 1024)?;
        check_range("temperature", self.temperature, 0.0, 1.0)?;
        check_range("top_k", self.top_k, 0, 500)?;
        check_range("top_p", self.top_p, 0.0, 0.99)?;
        check_range("frequency_penalty", self.frequency_penalty, 0.0, 1.0)?;
        check_range("presence_penalty", self.presence_penalty, 0.0, 1.0)?;
        Ok(())
    }
}

/// Vector search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Ground answers in retrieved passages
    pub enabled: bool,
    /// Number of passages to fetch (1..=20)
    pub fetch_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_k: 3,
        }
    }
}

impl RetrievalConfig {
    /// Check `fetch_k` against its allowed range
    pub fn validate(&self) -> Result<()> {
        check_range("fetch_k", self.fetch_k, 1, 20)
    }
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display + Copy,
{
    // NaN fails both comparisons and is rejected
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )))
    }
}

/// Database and service connection descriptor, read once at startup
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Database user
    pub username: String,
    /// Database password
    pub password: String,
    /// Data source name (TNS alias or Easy Connect string)
    pub dsn: String,
    /// Directory holding tnsnames.ora / sqlnet.ora
    pub config_dir: Option<PathBuf>,
    /// Wallet directory
    pub wallet_dir: Option<PathBuf>,
    /// Wallet password (PEM wallets only)
    pub wallet_password: Option<String>,
    /// Table holding passages and their embeddings
    pub table_name: String,
    /// OCI compartment OCID
    pub compartment_id: String,
    /// OCI Generative AI inference endpoint
    pub service_endpoint: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dsn", &self.dsn)
            .field("config_dir", &self.config_dir)
            .field("wallet_dir", &self.wallet_dir)
            .field(
                "wallet_password",
                &self.wallet_password.as_ref().map(|_| "<redacted>"),
            )
            .field("table_name", &self.table_name)
            .field("compartment_id", &self.compartment_id)
            .field("service_endpoint", &self.service_endpoint)
            .finish()
    }
}

impl ConnectionConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to read .env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // secrets are kept byte-exact; blank counts as unset
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let optional = |key: &str| secret(key).map(|v| v.trim().to_string());
        let missing = |key: &str| {
            Error::Config(format!("Missing required environment variable {}", key))
        };
        let required = |key: &str| optional(key).ok_or_else(|| missing(key));

        let config = Self {
            username: required("USERNAME")?,
            password: secret("PASSWORD").ok_or_else(|| missing("PASSWORD"))?,
            dsn: required("DSN")?,
            config_dir: optional("CONFIG_DIR").map(PathBuf::from),
            wallet_dir: optional("WALLET_DIR").map(PathBuf::from),
            wallet_password: secret("WALLET_PASSWORD"),
            table_name: required("TABLE_NAME")?,
            compartment_id: required("COMPARTMENT_ID")?,
            service_endpoint: required("SERVICE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
        };
        validate_table_name(&config.table_name)?;
        Ok(config)
    }
}

/// Accept `name` or `schema.name` made of identifier characters only
pub fn validate_table_name(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        });
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("Invalid table name: {:?}", name)))
    }
}

/// Location of the OCI API-key profile used to sign requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OciAuthConfig {
    /// OCI config file (default: ~/.oci/config)
    pub config_file: PathBuf,
    /// Profile section within the file
    pub profile: String,
}

impl Default for OciAuthConfig {
    fn default() -> Self {
        Self {
            config_file: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".oci")
                .join("config"),
            profile: "DEFAULT".to_string(),
        }
    }
}

impl OciAuthConfig {
    /// Defaults overridden by `OCI_CONFIG_FILE` / `OCI_CONFIG_PROFILE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("OCI_CONFIG_FILE") {
            config.config_file = PathBuf::from(path);
        }
        if let Ok(profile) = std::env::var("OCI_CONFIG_PROFILE") {
            config.profile = profile;
        }
        config
    }
}
