//! Operator session tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "venue-ledger";

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Token lifetime in hours
    pub expiration_hours: i64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
            issuer: ISSUER.to_string(),
        }
    }
}

/// Claims carried by an operator token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenClaims {
    /// Username
    pub sub: String,
    pub role: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl TokenClaims {
    pub fn new(username: &str, role: &str, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours);

        Self {
            sub: username.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }

    pub fn expires_in_secs(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

pub fn create_token(
    username: &str,
    role: &str,
    config: &JwtConfig,
) -> Result<(String, TokenClaims), jsonwebtoken::errors::Error> {
    let claims = TokenClaims::new(username, role, config);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok((token, claims))
}

/// Verify signature, issuer and expiry.
pub fn verify_token(
    token: &str,
    config: &JwtConfig,
) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let config = JwtConfig::new("test-secret", 12);
        let (token, claims) = create_token("cashier", "operator", &config).unwrap();
        let decoded = verify_token(&token, &config).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.sub, "cashier");
        assert_eq!(decoded.expires_in_secs(), 12 * 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = create_token("cashier", "operator", &JwtConfig::new("a", 1)).unwrap();
        assert!(verify_token(&token, &JwtConfig::new("b", 1)).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = JwtConfig::new("test-secret", -2);
        let (token, _) = create_token("cashier", "operator", &config).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }
}
