//! Administrator provisioning shared by the HTTP handler, the startup
//! bootstrap and the `sms admin create` command.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{hash_password, PasswordError, Scope};
use crate::config::BootstrapConfig;
use crate::database::models::{NewUser, User};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::types::Role;
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Access denied")]
    Denied,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Denied => ApiError::forbidden("Access denied"),
            AccountError::Validation(errors) => errors.into(),
            AccountError::Store(e) => e.into(),
            AccountError::Password(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("Internal Server Error")
            }
            AccountError::Task(e) => {
                tracing::error!("Password hashing task failed: {}", e);
                ApiError::internal_server_error("Internal Server Error")
            }
        }
    }
}

/// Body of `POST /api/user/create-admin`
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdmin {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub school: Option<Uuid>,
}

impl NewAdmin {
    fn role(&self) -> Option<Role> {
        match self.role.parse() {
            Ok(role @ (Role::Admin | Role::Superadmin)) => Some(role),
            _ => None,
        }
    }
}

impl Validate for NewAdmin {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 200);
        errors.require_text("email", &self.email);
        errors.email("email", &self.email);
        errors.require_text("password", &self.password);
        if self.role().is_none() {
            errors.add("role", "Must be one of: admin, superadmin");
        }
        errors.finish()
    }
}

/// Body of `POST /api/user/create-user`
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub school: Option<Uuid>,
}

impl Validate for NewMember {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("email", &self.email);
        errors.email("email", &self.email);
        errors.require_text("username", &self.username);
        errors.min_length("username", self.username.trim(), 3);
        errors.max_length("username", &self.username, 200);
        errors.require_text("password", &self.password);
        errors.require_some("school", &self.school);
        errors.finish()
    }
}

async fn hash_in_background(password: String) -> Result<String, AccountError> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn Store>,
    password_min_length: usize,
}

impl Accounts {
    pub fn new(store: Arc<dyn Store>, password_min_length: usize) -> Self {
        Self {
            store,
            password_min_length,
        }
    }

    /// Create an administrator account on behalf of a caller holding `scope`.
    ///
    /// `Scope::All` is a superadmin or an operator. A school-scoped caller
    /// may only create admins for that school; their own school is the
    /// default when none is given.
    pub async fn provision_admin(
        &self,
        scope: Scope,
        request: NewAdmin,
    ) -> Result<User, AccountError> {
        request.validate()?;
        let role = request.role().ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("role", "Must be one of: admin, superadmin");
            errors
        })?;

        let mut errors = ValidationErrors::new();
        errors.min_length("password", &request.password, self.password_min_length);
        errors.finish()?;

        let school = match (scope, role) {
            (Scope::School(_), Role::Superadmin) | (Scope::Own(_), _) => {
                return Err(AccountError::Denied);
            }
            (Scope::School(own), _) => match request.school {
                Some(requested) if requested != own => return Err(AccountError::Denied),
                _ => Some(own),
            },
            (Scope::All, Role::Superadmin) => None,
            (Scope::All, _) => match request.school {
                Some(school) => Some(school),
                None => {
                    let mut errors = ValidationErrors::new();
                    errors.add("school", "Required for admin accounts");
                    return Err(errors.into());
                }
            },
        };

        let password_hash = hash_in_background(request.password).await?;

        let user = self
            .store
            .create_user(NewUser {
                name: request.name.trim().to_string(),
                email: request.email.trim().to_lowercase(),
                password_hash,
                role,
                school_id: school,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "Provisioned administrator");
        Ok(user)
    }

    /// Self-service registration of a `user` account in an existing school.
    pub async fn register_user(&self, request: NewMember) -> Result<User, AccountError> {
        request.validate()?;
        let mut errors = ValidationErrors::new();
        errors.min_length("password", &request.password, self.password_min_length);
        errors.finish()?;

        let school = request.school.ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("school", "Required");
            errors
        })?;
        let password_hash = hash_in_background(request.password).await?;

        let user = self
            .store
            .create_user(NewUser {
                name: request.username.trim().to_string(),
                email: request.email.trim().to_lowercase(),
                password_hash,
                role: Role::User,
                school_id: Some(school),
            })
            .await?;

        tracing::info!(user_id = %user.id, school_id = %school, "Registered user");
        Ok(user)
    }

    /// Provision the configured superadmin unless the email is already taken.
    ///
    /// Returns the new account, or None when nothing was configured or it
    /// already exists.
    pub async fn bootstrap(&self, config: &BootstrapConfig) -> Result<Option<User>, AccountError> {
        let (Some(email), Some(password)) =
            (&config.superadmin_email, &config.superadmin_password)
        else {
            return Ok(None);
        };

        if self.store.find_user_by_email(&email.trim().to_lowercase()).await?.is_some() {
            tracing::debug!("Bootstrap superadmin already present");
            return Ok(None);
        }

        let request = NewAdmin {
            name: config.superadmin_name.clone(),
            email: email.clone(),
            password: password.clone(),
            role: Role::Superadmin.as_str().to_string(),
            school: None,
        };
        self.provision_admin(Scope::All, request).await.map(Some)
    }
}
