//! User repository
//!
//! Database operations for dashboard users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Passwords arrive here already hashed; this layer never sees plaintext.

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user. `user.id` and timestamps are ignored.
    async fn create(&self, user: &User) -> RepoResult<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> RepoResult<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Overwrite a user's name, email, password hash and role
    async fn update(&self, user: &User) -> RepoResult<User>;

    /// Delete a user
    async fn delete(&self, id: i64) -> RepoResult<()>;

    /// Count total users
    async fn count(&self) -> RepoResult<i64>;

    /// List users ordered by id, with the total count
    async fn list(&self, offset: i64, limit: i64) -> RepoResult<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> RepoResult<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .db_context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to get user by email")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .db_context("Failed to get user by email")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn update(&self, user: &User) -> RepoResult<User> {
        let now = Utc::now();
        let sql = "UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(now)
                .bind(user.id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to update user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(now)
                .bind(user.id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to update user")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("User", user.id));
        }
        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete user")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("User", id));
        }
        Ok(())
    }

    async fn count(&self) -> RepoResult<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(self.pool.sqlite()?)
                .await
                .db_context("Failed to count users"),
            DatabaseDriver::Mysql => sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(self.pool.mysql()?)
                .await
                .db_context("Failed to count users"),
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> RepoResult<(Vec<User>, i64)> {
        let total = self.count().await?;
        let sql = format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_USER);
        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to list users")?;
                rows.iter().map(row_to_user_sqlite).collect::<RepoResult<Vec<_>>>()?
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .db_context("Failed to list users")?;
                rows.iter().map(row_to_user_mysql).collect::<RepoResult<Vec<_>>>()?
            }
        };
        Ok((users, total))
    }
}

const SELECT_USER: &str =
    "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users";

const INSERT_USER: &str = r#"
    INSERT INTO users (name, email, password_hash, role, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

fn parse_role(raw: &str) -> RepoResult<UserRole> {
    UserRole::from_str(raw).map_err(RepositoryError::Storage)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> RepoResult<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> RepoResult<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> RepoResult<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> RepoResult<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn new_user(name: &str, email: &str, role: UserRole) -> User {
        User {
            id: 0,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hashed_password".to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_user() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&new_user("Ada", "ada@example.com", UserRole::Admin))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        let fetched = repo.get_by_email("ada@example.com").await.unwrap().expect("user");
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.role, UserRole::Admin);
        assert_eq!(fetched.password_hash, "hashed_password");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&new_user("Ada", "ada@example.com", UserRole::User)).await.unwrap();
        let err = repo
            .create(&new_user("Imposter", "ada@example.com", UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let repo = setup_test_repo().await;
        let mut user = repo
            .create(&new_user("Ada", "ada@example.com", UserRole::User))
            .await
            .unwrap();

        user.role = UserRole::Admin;
        user.name = "Ada L.".into();
        repo.update(&user).await.unwrap();
        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(fetched.is_admin());
        assert_eq!(fetched.name, "Ada L.");

        repo.delete(user.id).await.unwrap();
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
        assert!(repo.update(&user).await.unwrap_err().is_not_found());
        assert!(repo.delete(user.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_users_paginated() {
        let repo = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&new_user(&format!("U{}", i), &format!("u{}@example.com", i), UserRole::User))
                .await
                .unwrap();
        }

        let (users, total) = repo.list(2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "U2");
        assert_eq!(repo.count().await.unwrap(), 5);
    }
}
