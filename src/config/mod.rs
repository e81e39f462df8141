use crate::auth::{jwt::JwtAuthenticator, ConnectionKind};
use crate::error::{AuthError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication middleware configuration
    #[serde(default)]
    pub middleware: AuthMiddlewareConfig,
    /// API key authentication
    #[serde(default)]
    pub api_key: Option<ApiKeyConfig>,
    /// JWT authentication
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which connections the authentication middleware applies to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthMiddlewareConfig {
    /// Regular expressions; matching paths skip authentication
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Connection kinds to authenticate. `http` covers every request,
    /// WebSocket handshakes included; `websocket` alone leaves plain
    /// requests unauthenticated.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<ConnectionKind>,
}

/// API key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    /// Header name for API key
    #[serde(default = "default_api_key_header")]
    pub header: String,
    /// In-memory API keys (key -> description)
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

/// JWT authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for HS256 (if using symmetric encryption)
    pub secret: Option<String>,
    /// Public key for RS256 (if using asymmetric encryption)
    pub public_key: Option<String>,
    /// Algorithm to use (HS256 or RS256)
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Issuer to validate
    pub issuer: Option<String>,
    /// Audience to validate
    pub audience: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_scopes() -> Vec<ConnectionKind> {
    vec![ConnectionKind::Http, ConnectionKind::Websocket]
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AuthMiddlewareConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            scopes: default_scopes(),
        }
    }
}

impl AuthMiddlewareConfig {
    /// Compile the exclude patterns into a single alternation
    pub fn exclude_regex(&self) -> Result<Option<Regex>> {
        if self.exclude.is_empty() {
            return Ok(None);
        }

        for pattern in &self.exclude {
            Regex::new(pattern).map_err(|e| {
                AuthError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
        }

        let joined = self
            .exclude
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");

        Regex::new(&joined)
            .map(Some)
            .map_err(|e| AuthError::Config(format!("Invalid exclude patterns: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scopes.is_empty() {
            return Err(AuthError::Config(
                "Middleware scopes cannot be empty".to_string(),
            ));
        }

        self.exclude_regex()?;
        Ok(())
    }
}

impl AuthgateConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AuthError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.middleware.validate()?;

        if let Some(api_key) = &self.api_key {
            if api_key.header.trim().is_empty() {
                return Err(AuthError::Config(
                    "API key header name cannot be empty".to_string(),
                ));
            }
        }

        if let Some(jwt) = &self.jwt {
            let algorithm = JwtAuthenticator::parse_algorithm(&jwt.algorithm)?;
            let is_hmac = jwt.algorithm.to_uppercase().starts_with("HS");

            if is_hmac && jwt.secret.as_deref().map_or(true, str::is_empty) {
                return Err(AuthError::Config(format!(
                    "JWT secret is required for {:?}",
                    algorithm
                )));
            }

            if !is_hmac && jwt.public_key.is_none() {
                return Err(AuthError::Config(format!(
                    "JWT public key is required for {:?}",
                    algorithm
                )));
            }
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            middleware: AuthMiddlewareConfig::default(),
            api_key: None,
            jwt: None,
        }
    }
}
