//! Database layer
//!
//! Storage for Inkwell. Two drivers are supported:
//! - SQLite (default, single-file deployment)
//! - MySQL (larger deployments)
//!
//! The driver is selected by configuration. Everything above this module
//! talks to `DynDatabasePool` and the repository traits, never to a concrete
//! pool type.
//!
//! ```ignore
//! use inkwell::config::DatabaseConfig;
//! use inkwell::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use error::{DbContext, RepoResult, RepositoryError};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
