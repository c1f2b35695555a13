use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "AGENT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5001
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecurityConfig {
    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelProvider {
    /// AWS SDK client with credentials from the default provider chain.
    #[default]
    Bedrock,
    /// HTTPS client authenticated with a Bedrock API key.
    BedrockRest,
    Stub,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Bedrock => "bedrock",
            ModelProvider::BedrockRest => "bedrock-rest",
            ModelProvider::Stub => "stub",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bedrock" => Some(ModelProvider::Bedrock),
            "bedrock-rest" | "rest" => Some(ModelProvider::BedrockRest),
            "stub" => Some(ModelProvider::Stub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the REST endpoint derived from `region`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model_id: default_model_id(),
            region: default_region(),
            endpoint: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn rest_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }
}

fn default_model_id() -> String {
    "amazon.titan-text-express-v1".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_p() -> f32 {
    0.9
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Reads the file named by `AGENT_CONFIG` when set, otherwise defaults,
    /// and applies the environment on top.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_env_or_file(path),
            _ => Self::from_env(),
        }
    }

    pub fn socket_addr(&self) -> Result<std::net::SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|err| {
                AgentError::Config(format!(
                    "invalid listen address {}:{}: {err}",
                    self.server.host, self.server.port
                ))
            })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("AGENT_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("AGENT_PORT") {
            self.server.port = port
                .parse::<u16>()
                .map_err(|err| AgentError::Config(format!("invalid AGENT_PORT `{port}`: {err}")))?;
        }
        if let Ok(provider) = env::var("AGENT_MODEL_PROVIDER") {
            self.model.provider = ModelProvider::parse(&provider).ok_or_else(|| {
                AgentError::Config(format!("unknown model provider `{provider}`"))
            })?;
        }
        if let Ok(model_id) = env::var("MODEL_ID") {
            self.model.model_id = model_id;
        }
        if let Some(region) = env::var("AWS_REGION")
            .ok()
            .or_else(|| env::var("AWS_DEFAULT_REGION").ok())
        {
            self.model.region = region;
        }
        if let Ok(endpoint) = env::var("BEDROCK_ENDPOINT") {
            self.model.endpoint = Some(endpoint);
        }
        if let Ok(key) = env::var("AWS_BEARER_TOKEN_BEDROCK") {
            if !key.trim().is_empty() {
                self.model.api_key = Some(key);
            }
        }
        if let Ok(origins) = env::var("CORS_ORIGINS") {
            self.security.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(level) = env::var("AGENT_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
        if let Ok(json) = env::var("AGENT_LOG_JSON") {
            if let Ok(parsed) = json.parse::<bool>() {
                self.telemetry.json = parsed;
            }
        }
        Ok(())
    }
}
