use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Principal;
use crate::types::Role;

/// Claims carried by bearer tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    Generation(String),
}

/// Issues and verifies HS256 bearer tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, default_ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Sign a token for the principal with the default expiry
    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_with_expiry(principal, self.default_ttl)
    }

    pub fn issue_with_expiry(
        &self,
        principal: &Principal,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            id: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            school: principal.school,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    /// Decode a token; any signature, format or expiry failure yields None
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, school: Option<Uuid>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "head@north.edu".to_string(),
            role,
            school,
        }
    }

    fn service(secret: &str) -> TokenService {
        TokenService::new(secret, Duration::days(1)).unwrap()
    }

    #[test]
    fn issued_token_carries_identity() {
        let tokens = service("secret");
        let school = Uuid::new_v4();
        let who = principal(Role::Admin, Some(school));

        let claims = tokens.verify(&tokens.issue(&who).unwrap()).unwrap();
        assert_eq!(claims.id, who.id);
        assert_eq!(claims.email, who.email);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.school, Some(school));
        assert_eq!(claims.exp - claims.iat, Duration::days(1).num_seconds());
    }

    #[test]
    fn superadmin_token_has_no_school() {
        let tokens = service("secret");
        let token = tokens.issue(&principal(Role::Superadmin, None)).unwrap();
        assert_eq!(tokens.verify(&token).unwrap().school, None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service("secret");
        let token = tokens
            .issue_with_expiry(&principal(Role::Admin, Some(Uuid::new_v4())), Duration::seconds(-5))
            .unwrap();
        assert!(tokens.verify(&token).is_none());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = service("one").issue(&principal(Role::User, Some(Uuid::new_v4()))).unwrap();
        assert!(service("two").verify(&token).is_none());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = service("secret");
        let token = tokens.issue(&principal(Role::Admin, Some(Uuid::new_v4()))).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = parts[1].chars().rev().collect();
        assert!(tokens.verify(&parts.join(".")).is_none());
        assert!(tokens.verify("not-a-token").is_none());
        assert!(tokens.verify("").is_none());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenService::new("", Duration::days(1)), Err(TokenError::InvalidSecret)));
    }
}
