//! Cookie-backed login sessions.
//!
//! A successful sign-in yields two identity channels carrying the same claims:
//! a server-side session referenced by the `sms_session` cookie, and a bearer
//! token for clients that call the API directly.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{password, Principal, TokenService};
use crate::database::models::{Session, User};
use crate::database::{Store, StoreError};
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "sms_session";

/// Outcome of a successful sign-in
#[derive(Debug)]
pub struct SignIn {
    pub session: Session,
    pub user: User,
    pub access_token: String,
}

#[derive(Clone)]
pub struct SessionProvider {
    store: Arc<dyn Store>,
    tokens: TokenService,
    max_age: Duration,
    secure_cookies: bool,
}

impl SessionProvider {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenService,
        max_age: Duration,
        secure_cookies: bool,
    ) -> Self {
        Self {
            store,
            tokens,
            max_age,
            secure_cookies,
        }
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown emails and wrong passwords produce the same error.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, ApiError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            tracing::warn!("Login failed for unknown email");
            return Err(invalid_credentials());
        };

        let hash = user.password_hash.clone();
        let attempt = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&hash, &attempt))
                .await
                .map_err(|e| {
                    tracing::error!("Password verification task failed: {}", e);
                    ApiError::internal_server_error("Internal Server Error")
                })?;
        if !matches {
            tracing::warn!(user_id = %user.id, "Login failed: password mismatch");
            return Err(invalid_credentials());
        }

        let session = self.store.create_session(user.id, Utc::now() + self.max_age).await?;
        let access_token = self.issue_token(&Principal::from(&user))?;
        tracing::info!(user_id = %user.id, role = %user.role, "Signed in");

        Ok(SignIn {
            session,
            user,
            access_token,
        })
    }

    /// Load a live session and its user; expired sessions are removed on sight
    pub async fn resolve(&self, session_id: Uuid) -> Result<Option<(Session, User)>, StoreError> {
        let Some(session) = self.store.find_session(session_id).await? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            self.store.delete_session(session.id).await?;
            tracing::debug!(session_id = %session.id, "Dropped expired session");
            return Ok(None);
        }

        // Reload so cookie claims follow the stored user
        match self.store.find_user(session.user_id).await? {
            Some(user) => Ok(Some((session, user))),
            None => {
                self.store.delete_session(session.id).await?;
                Ok(None)
            }
        }
    }

    pub async fn sign_out(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.store.delete_session(session_id).await
    }

    pub fn issue_token(&self, principal: &Principal) -> Result<String, ApiError> {
        self.tokens.issue(principal).map_err(|e| {
            tracing::error!("Token issuance failed: {}", e);
            ApiError::internal_server_error("Internal Server Error")
        })
    }

    /// Cookie referencing `session`
    pub fn cookie(&self, session: &Session) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, session.id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(time::Duration::seconds(self.max_age.num_seconds()))
            .build()
    }

    /// Expired cookie that clears the session on the client
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(time::Duration::ZERO)
            .build()
    }

    /// Session id carried by the request cookies, if well-formed
    pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid credentials")
}
