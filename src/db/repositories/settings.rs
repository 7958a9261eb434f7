//! Settings repository
//!
//! Key/value site settings. Reads never fail because a key is missing: a
//! stored value wins, then the configured default, then the empty string.
//! The defaults are handed in at construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{DatabaseDriver, SettingsDefaults};
use crate::db::error::{DbContext, RepoResult};
use crate::db::DynDatabasePool;

use super::in_placeholders;

/// A stored setting row
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Resolved value for every requested key
    async fn get_by_keys(&self, keys: &[&str]) -> RepoResult<BTreeMap<String, String>>;

    /// Resolved value for a single key
    async fn get(&self, key: &str) -> RepoResult<String>;

    /// The stored row for a key, ignoring defaults
    async fn get_stored(&self, key: &str) -> RepoResult<Option<Setting>>;

    /// Every default key plus every stored key, resolved
    async fn get_all(&self) -> RepoResult<BTreeMap<String, String>>;

    /// Upsert a single setting
    async fn set(&self, key: &str, value: &str) -> RepoResult<()>;

    /// Upsert each pair in turn. Pairs written before a failure stay written.
    async fn update_batch(&self, settings: &BTreeMap<String, String>) -> RepoResult<()>;

    /// Remove a stored value so the key falls back to its default
    async fn delete(&self, key: &str) -> RepoResult<()>;

    /// Store the default for every key that has no row yet. Returns how
    /// many rows were inserted; running it again inserts nothing.
    async fn initialize(&self) -> RepoResult<u64>;

    /// The defaults this repository falls back to
    fn defaults(&self) -> &SettingsDefaults;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
    defaults: SettingsDefaults,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool, defaults: SettingsDefaults) -> Self {
        Self { pool, defaults }
    }

    pub fn boxed(pool: DynDatabasePool, defaults: SettingsDefaults) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool, defaults))
    }

    fn resolve(&self, key: &str, stored: Option<&String>) -> String {
        stored
            .cloned()
            .or_else(|| self.defaults.get(key).map(str::to_string))
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get_by_keys(&self, keys: &[&str]) -> RepoResult<BTreeMap<String, String>> {
        let stored = if keys.is_empty() {
            BTreeMap::new()
        } else {
            match self.pool.driver() {
                DatabaseDriver::Sqlite => get_many_sqlite(self.pool.sqlite()?, keys).await?,
                DatabaseDriver::Mysql => get_many_mysql(self.pool.mysql()?, keys).await?,
            }
        };

        Ok(keys
            .iter()
            .map(|key| (key.to_string(), self.resolve(key, stored.get(*key))))
            .collect())
    }

    async fn get(&self, key: &str) -> RepoResult<String> {
        let stored = self.get_stored(key).await?;
        Ok(self.resolve(key, stored.as_ref().map(|s| &s.value)))
    }

    async fn get_stored(&self, key: &str) -> RepoResult<Option<Setting>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sqlite(self.pool.sqlite()?, key).await,
            DatabaseDriver::Mysql => get_mysql(self.pool.mysql()?, key).await,
        }
    }

    async fn get_all(&self) -> RepoResult<BTreeMap<String, String>> {
        let stored = match self.pool.driver() {
            DatabaseDriver::Sqlite => get_all_sqlite(self.pool.sqlite()?).await?,
            DatabaseDriver::Mysql => get_all_mysql(self.pool.mysql()?).await?,
        };

        let mut all: BTreeMap<String, String> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        all.extend(stored.into_iter().map(|s| (s.key, s.value)));
        Ok(all)
    }

    async fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_sqlite(self.pool.sqlite()?, key, value).await,
            DatabaseDriver::Mysql => set_mysql(self.pool.mysql()?, key, value).await,
        }
    }

    async fn update_batch(&self, settings: &BTreeMap<String, String>) -> RepoResult<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepoResult<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM settings WHERE key = ?")
                    .bind(key)
                    .execute(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to delete setting")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM settings WHERE `key` = ?")
                    .bind(key)
                    .execute(self.pool.mysql()?)
                    .await
                    .db_context("Failed to delete setting")?;
            }
        }
        Ok(())
    }

    async fn initialize(&self) -> RepoResult<u64> {
        let mut inserted = 0;
        for (key, value) in self.defaults.iter() {
            inserted += match self.pool.driver() {
                DatabaseDriver::Sqlite => insert_default_sqlite(self.pool.sqlite()?, key, value).await?,
                DatabaseDriver::Mysql => insert_default_mysql(self.pool.mysql()?, key, value).await?,
            };
        }
        if inserted > 0 {
            tracing::info!("Initialized {} default settings", inserted);
        }
        Ok(inserted)
    }

    fn defaults(&self) -> &SettingsDefaults {
        &self.defaults
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_sqlite(pool: &SqlitePool, key: &str) -> RepoResult<Option<Setting>> {
    let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("key"),
        value: r.get("value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn get_many_sqlite(pool: &SqlitePool, keys: &[&str]) -> RepoResult<BTreeMap<String, String>> {
    let sql = format!(
        "SELECT key, value FROM settings WHERE key IN ({})",
        in_placeholders(keys.len())
    );
    let mut query = sqlx::query(&sql);
    for key in keys {
        query = query.bind(*key);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to get settings")?;

    Ok(rows
        .into_iter()
        .map(|r| (r.get("key"), r.get("value")))
        .collect())
}

async fn get_all_sqlite(pool: &SqlitePool) -> RepoResult<Vec<Setting>> {
    let rows = sqlx::query("SELECT key, value, updated_at FROM settings ORDER BY key")
        .fetch_all(pool)
        .await
        .db_context("Failed to list settings")?;

    Ok(rows
        .into_iter()
        .map(|r| Setting {
            key: r.get("key"),
            value: r.get("value"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

async fn set_sqlite(pool: &SqlitePool, key: &str, value: &str) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .db_context("Failed to save setting")?;
    Ok(())
}

async fn insert_default_sqlite(pool: &SqlitePool, key: &str, value: &str) -> RepoResult<u64> {
    let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .db_context("Failed to initialize setting")?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_mysql(pool: &MySqlPool, key: &str) -> RepoResult<Option<Setting>> {
    let row = sqlx::query("SELECT `key`, value, updated_at FROM settings WHERE `key` = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("key"),
        value: r.get("value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn get_many_mysql(pool: &MySqlPool, keys: &[&str]) -> RepoResult<BTreeMap<String, String>> {
    let sql = format!(
        "SELECT `key`, value FROM settings WHERE `key` IN ({})",
        in_placeholders(keys.len())
    );
    let mut query = sqlx::query(&sql);
    for key in keys {
        query = query.bind(*key);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to get settings")?;

    Ok(rows
        .into_iter()
        .map(|r| (r.get("key"), r.get("value")))
        .collect())
}

async fn get_all_mysql(pool: &MySqlPool) -> RepoResult<Vec<Setting>> {
    let rows = sqlx::query("SELECT `key`, value, updated_at FROM settings ORDER BY `key`")
        .fetch_all(pool)
        .await
        .db_context("Failed to list settings")?;

    Ok(rows
        .into_iter()
        .map(|r| Setting {
            key: r.get("key"),
            value: r.get("value"),
            updated_at: r.get("updated_at"),
        })
        .collect())
}

async fn set_mysql(pool: &MySqlPool, key: &str, value: &str) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO settings (`key`, value) VALUES (?, ?)
         ON DUPLICATE KEY UPDATE value = VALUES(value)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .db_context("Failed to save setting")?;
    Ok(())
}

async fn insert_default_mysql(pool: &MySqlPool, key: &str, value: &str) -> RepoResult<u64> {
    let result = sqlx::query("INSERT IGNORE INTO settings (`key`, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .db_context("Failed to initialize setting")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup(defaults: SettingsDefaults) -> SqlxSettingsRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxSettingsRepository::new(pool, defaults)
    }

    fn test_defaults() -> SettingsDefaults {
        SettingsDefaults::empty()
            .with("site_name", "Inkwell")
            .with("posts_per_page", "10")
    }

    #[tokio::test]
    async fn test_get_by_keys_falls_back() {
        let repo = setup(test_defaults()).await;
        repo.set("site_name", "My Blog").await.unwrap();

        let values = repo
            .get_by_keys(&["site_name", "posts_per_page", "nonexistent_key"])
            .await
            .expect("missing keys never fail");
        assert_eq!(values["site_name"], "My Blog");
        assert_eq!(values["posts_per_page"], "10");
        assert_eq!(values["nonexistent_key"], "");
        assert_eq!(values.len(), 3);

        assert!(repo.get_by_keys(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_batch_upserts() {
        let repo = setup(test_defaults()).await;
        let mut batch = BTreeMap::new();
        batch.insert("site_name".to_string(), "First".to_string());
        batch.insert("custom".to_string(), "x".to_string());
        repo.update_batch(&batch).await.unwrap();

        batch.insert("site_name".to_string(), "Second".to_string());
        repo.update_batch(&batch).await.unwrap();

        assert_eq!(repo.get("site_name").await.unwrap(), "Second");
        assert_eq!(repo.get("custom").await.unwrap(), "x");
        assert!(repo.get_stored("custom").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let repo = setup(test_defaults()).await;
        repo.set("site_name", "Kept").await.unwrap();

        assert_eq!(repo.initialize().await.unwrap(), 1);
        assert_eq!(repo.initialize().await.unwrap(), 0);

        assert_eq!(repo.get("site_name").await.unwrap(), "Kept");
        assert_eq!(
            repo.get_stored("posts_per_page").await.unwrap().map(|s| s.value),
            Some("10".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_all_overlays_stored_on_defaults() {
        let repo = setup(test_defaults()).await;
        repo.set("theme", "dark").await.unwrap();
        repo.set("site_name", "Mine").await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all["site_name"], "Mine");
        assert_eq!(all["posts_per_page"], "10");
        assert_eq!(all["theme"], "dark");
    }

    #[tokio::test]
    async fn test_delete_reverts_to_default() {
        let repo = setup(test_defaults()).await;
        repo.set("site_name", "Mine").await.unwrap();
        repo.delete("site_name").await.unwrap();
        assert_eq!(repo.get("site_name").await.unwrap(), "Inkwell");
        assert_eq!(repo.defaults().len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Any key resolves; unknown keys resolve to the empty string.
            #[test]
            fn any_key_resolves(key in "[a-z_]{1,24}") {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let repo = setup(test_defaults()).await;
                    let values = repo.get_by_keys(&[key.as_str()]).await.expect("never fails");
                    let expected = test_defaults().get(&key).unwrap_or("").to_string();
                    prop_assert_eq!(&values[&key], &expected);
                    Ok(())
                });
                result?;
            }
        }
    }
}
