use crate::config::ApiKeyConfig;
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AuthenticationResult, Authenticator, HttpConnection};

/// Identity established by an API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyUser {
    /// The key itself
    pub key_id: String,
    /// Description registered alongside the key
    pub description: String,
}

/// Credential for an API key: the header the key was presented in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    pub header: String,
}

/// API key authenticator with an in-memory key set
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    header_name: String,
    keys: Arc<RwLock<HashMap<String, String>>>,
}

impl ApiKeyAuthenticator {
    /// Create a new API key authenticator from configuration
    pub fn new(config: &ApiKeyConfig) -> Result<Self> {
        if config.header.trim().is_empty() {
            return Err(AuthError::Config(
                "API key header name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            header_name: config.header.clone(),
            keys: Arc::new(RwLock::new(config.keys.clone())),
        })
    }

    /// Extract API key from request headers
    fn extract_api_key<'a>(&self, connection: &'a HttpConnection<'_>) -> Result<&'a str> {
        let api_key = connection.header(&self.header_name).ok_or_else(|| {
            AuthError::NotAuthorized("Missing authentication credentials".to_string())
        })?;

        if api_key.is_empty() {
            return Err(AuthError::PermissionDenied("Invalid API key".to_string()));
        }

        Ok(api_key)
    }

    /// Add a new API key
    pub async fn add_key(&self, key: String, description: String) {
        let mut keys = self.keys.write().await;
        keys.insert(key, description);
    }

    /// Remove an API key
    pub async fn remove_key(&self, key: &str) -> bool {
        let mut keys = self.keys.write().await;
        keys.remove(key).is_some()
    }

    /// Check if a key exists
    pub async fn key_exists(&self, key: &str) -> bool {
        self.keys.read().await.contains_key(key)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    type User = ApiKeyUser;
    type Auth = ApiKeyAuth;

    async fn authenticate(
        &self,
        connection: &HttpConnection<'_>,
    ) -> Result<AuthenticationResult<ApiKeyUser, ApiKeyAuth>> {
        let api_key = self.extract_api_key(connection)?;

        let keys = self.keys.read().await;
        let description = keys
            .get(api_key)
            .ok_or_else(|| AuthError::PermissionDenied("Invalid API key".to_string()))?;

        Ok(AuthenticationResult::new(
            ApiKeyUser {
                key_id: api_key.to_string(),
                description: description.clone(),
            },
            ApiKeyAuth {
                header: self.header_name.clone(),
            },
        ))
    }
}
