use crate::config::JwtConfig;
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{bearer_token, AuthenticationResult, Authenticator, HttpConnection};

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Identity carried by a JWT: its subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtUser {
    pub id: String,
}

/// Authenticator validating `Authorization: Bearer <jwt>` headers
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    algorithm: Algorithm,
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator from configuration
    pub fn new(config: &JwtConfig) -> Result<Self> {
        let algorithm = Self::parse_algorithm(&config.algorithm)?;

        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config.secret.as_ref().ok_or_else(|| {
                    AuthError::Config(
                        "JWT secret is required for HS256/HS384/HS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            _ => {
                let public_key = config.public_key.as_ref().ok_or_else(|| {
                    AuthError::Config(
                        "JWT public key is required for RS256/RS384/RS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_rsa_pem(public_key.as_bytes())
                    .map_err(|e| AuthError::Config(format!("Invalid RSA public key: {}", e)))?
            }
        };

        let mut validation = Validation::new(algorithm);

        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
            algorithm,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Decode and validate a raw token
    pub fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::PermissionDenied(format!("Token validation failed: {}", e)))
    }

    /// Parse algorithm string to Algorithm enum
    pub(crate) fn parse_algorithm(algo: &str) -> Result<Algorithm> {
        match algo.to_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            _ => Err(AuthError::Config(format!(
                "Unsupported algorithm: {}",
                algo
            ))),
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    type User = JwtUser;
    type Auth = Claims;

    async fn authenticate(
        &self,
        connection: &HttpConnection<'_>,
    ) -> Result<AuthenticationResult<JwtUser, Claims>> {
        if connection.header("authorization").is_none() {
            return Err(AuthError::NotAuthorized(
                "Missing authentication credentials".to_string(),
            ));
        }

        let token = bearer_token(connection.headers()).ok_or_else(|| {
            AuthError::PermissionDenied(
                "Authorization header must start with 'Bearer '".to_string(),
            )
        })?;

        let claims = self.decode(token)?;

        Ok(AuthenticationResult::new(
            JwtUser {
                id: claims.sub.clone(),
            },
            claims,
        ))
    }
}
