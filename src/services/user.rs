//! User service
//!
//! Dashboard accounts: creation with argon2-hashed passwords, credential
//! checks, and admin-side management. The first account created is always
//! an administrator.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, ListParams, PagedResult, UpdateUserInput, User, UserRole};

use super::error::{ServiceError, ServiceResult};
use super::password::{check_password_strength, hash_password, verify_password};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateUserInput) -> ServiceResult<User> {
        let name = validate_name(&input.name)?;
        let email = validate_email(&input.email)?;
        check_password_strength(&input.password).map_err(ServiceError::ValidationError)?;

        let role = if self.repo.count().await? == 0 {
            UserRole::Admin
        } else {
            input.role
        };

        let now = Utc::now();
        let user = User {
            id: 0,
            name,
            email,
            password_hash: hash_password(&input.password)?,
            role,
            created_at: now,
            updated_at: now,
        };
        let user = self.repo.create(&user).await?;
        tracing::info!("Created user {} with role {}", user.id, user.role);
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<User> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    pub async fn list(&self, params: &ListParams) -> ServiceResult<PagedResult<User>> {
        let (users, total) = self.repo.list(params.offset(), params.limit()).await?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn update(&self, id: i64, input: UpdateUserInput) -> ServiceResult<User> {
        let mut user = self.get_by_id(id).await?;

        if let Some(name) = &input.name {
            user.name = validate_name(name)?;
        }
        if let Some(email) = &input.email {
            user.email = validate_email(email)?;
        }
        if let Some(password) = &input.password {
            check_password_strength(password).map_err(ServiceError::ValidationError)?;
            user.password_hash = hash_password(password)?;
        }
        if let Some(role) = input.role {
            user.role = role;
        }

        Ok(self.repo.update(&user).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.repo.delete(id).await?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// Look up a user by email and check the password.
    ///
    /// Unknown email and wrong password give the same error.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> ServiceResult<User> {
        let user = self
            .repo
            .get_by_email(email.trim())
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(ServiceError::InvalidCredentials);
        }
        Ok(user)
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> ServiceResult<String> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(ServiceError::validation(format!("Invalid email address: {}", email)));
    }
    Ok(email.to_string())
}
