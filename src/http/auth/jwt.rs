//! JWT token management

use crate::core::config::AuthConfig;
use crate::http::errors::{HttpError, HttpResult};
use crate::http::models::Claims;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

pub const INVALID_TOKEN: &str = "Invalid token. Please log in again.";
pub const EXPIRED_TOKEN: &str = "Your token has expired! Please log in again.";

/// Issues and checks the bearer tokens handed out at signup and login
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    token_expiry_seconds: i64,
}

impl JwtService {
    pub fn new(secret: &str, issuer: &str, token_expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            token_expiry_seconds: i64::try_from(token_expiry_seconds).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_issuer, config.jwt_expiry_seconds)
    }

    /// Token for `user_id`, issued now
    pub fn generate_token(&self, user_id: Uuid) -> HttpResult<String> {
        self.generate_token_at(&user_id.to_string(), Utc::now())
    }

    /// Token for an arbitrary subject and issue time
    pub fn generate_token_at(&self, subject: &str, issued_at: DateTime<Utc>) -> HttpResult<String> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(self.token_expiry_seconds),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| HttpError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Decode a token, telling expiry apart from every other failure
    pub fn validate_token(&self, token: &str) -> HttpResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => HttpError::Unauthorized(EXPIRED_TOKEN.to_string()),
                _ => HttpError::Unauthorized(INVALID_TOKEN.to_string()),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_round_trip() {
        let jwt = JwtService::new("secret", "commongood", 3600);
        let id = Uuid::new_v4();
        let token = jwt.generate_token(id).unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_has_its_own_message() {
        let jwt = JwtService::new("secret", "commongood", 60);
        let token = jwt
            .generate_token_at("someone", Utc::now() - Duration::hours(2))
            .unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap_err().to_string(), EXPIRED_TOKEN);
    }

    #[test]
    fn test_foreign_tokens_are_invalid() {
        let ours = JwtService::new("secret", "commongood", 60);
        let other_secret = JwtService::new("other", "commongood", 60);
        let other_issuer = JwtService::new("secret", "elsewhere", 60);

        for token in [
            other_secret.generate_token(Uuid::new_v4()).unwrap(),
            other_issuer.generate_token(Uuid::new_v4()).unwrap(),
            "not.a.token".to_string(),
        ] {
            assert_eq!(ours.validate_token(&token).unwrap_err().to_string(), INVALID_TOKEN);
        }
    }
}
