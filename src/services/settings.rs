//! Site settings service
//!
//! Thin layer over the settings repository: key validation, the subset of
//! settings exposed to the public site, and typed accessors for the settings
//! the server itself reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::repositories::SettingsRepository;

use super::error::{ServiceError, ServiceResult};

/// Settings the public `/site` endpoint may reveal
pub const PUBLIC_KEYS: &[&str] = &[
    "site_name",
    "site_description",
    "site_url",
    "posts_per_page",
    "footer_text",
    "comments_enabled",
];

const MAX_KEY_LENGTH: usize = 100;

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Seed missing defaults. Safe to call on every start.
    pub async fn initialize(&self) -> ServiceResult<u64> {
        Ok(self.repo.initialize().await?)
    }

    /// Resolve each key to its stored value, its default, or "".
    pub async fn get_by_keys(&self, keys: &[&str]) -> ServiceResult<BTreeMap<String, String>> {
        Ok(self.repo.get_by_keys(keys).await?)
    }

    pub async fn get(&self, key: &str) -> ServiceResult<String> {
        Ok(self.repo.get(key).await?)
    }

    pub async fn get_all(&self) -> ServiceResult<BTreeMap<String, String>> {
        Ok(self.repo.get_all().await?)
    }

    pub async fn get_public(&self) -> ServiceResult<BTreeMap<String, String>> {
        self.get_by_keys(PUBLIC_KEYS).await
    }

    /// Store several settings. Each key is written on its own; a failure
    /// part-way leaves the earlier keys written.
    pub async fn update(&self, settings: BTreeMap<String, String>) -> ServiceResult<BTreeMap<String, String>> {
        if settings.is_empty() {
            return Err(ServiceError::validation("No settings provided"));
        }
        for key in settings.keys() {
            validate_key(key)?;
        }
        if let Some(per_page) = settings.get("posts_per_page") {
            if per_page.trim().parse::<u32>().map_or(true, |n| n == 0) {
                return Err(ServiceError::validation(
                    "posts_per_page must be a positive integer",
                ));
            }
        }

        self.repo.update_batch(&settings).await?;
        tracing::info!("Updated {} settings", settings.len());

        let keys: Vec<&str> = settings.keys().map(String::as_str).collect();
        self.get_by_keys(&keys).await
    }

    /// Page size for public listings, falling back to 10 when unset or invalid
    pub async fn posts_per_page(&self) -> ServiceResult<u32> {
        let raw = self.get("posts_per_page").await?;
        Ok(raw.trim().parse::<u32>().ok().filter(|n| *n > 0).unwrap_or(10))
    }

    /// Boolean setting; anything but "false" or "0" counts as on. Missing
    /// keys use `default`.
    pub async fn flag(&self, key: &str, default: bool) -> ServiceResult<bool> {
        let raw = self.get(key).await?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(default);
        }
        Ok(!matches!(raw.to_lowercase().as_str(), "false" | "0"))
    }
}

fn validate_key(key: &str) -> ServiceResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if !valid {
        return Err(ServiceError::validation(format!("Invalid setting key: {:?}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsDefaults;
    use crate::db::repositories::SqlxSettingsRepository;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup() -> SettingsService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let defaults = SettingsDefaults::builtin().with("site_name", "Test Blog");
        SettingsService::new(SqlxSettingsRepository::boxed(pool, defaults))
    }

    #[tokio::test]
    async fn test_public_settings_use_defaults() {
        let service = setup().await;
        let public = service.get_public().await.unwrap();

        assert_eq!(public.len(), PUBLIC_KEYS.len());
        assert_eq!(public["site_name"], "Test Blog");
        assert!(!public.contains_key("comment_moderation"));
    }

    #[tokio::test]
    async fn test_update_returns_resolved_values() {
        let service = setup().await;
        let mut changes = BTreeMap::new();
        changes.insert("site_name".to_string(), "Renamed".to_string());
        changes.insert("custom.key".to_string(), "x".to_string());

        let stored = service.update(changes).await.unwrap();
        assert_eq!(stored["site_name"], "Renamed");
        assert_eq!(stored["custom.key"], "x");
        assert_eq!(service.get("site_name").await.unwrap(), "Renamed");
    }

    #[tokio::test]
    async fn test_update_validation() {
        let service = setup().await;
        assert!(service.update(BTreeMap::new()).await.is_err());

        let mut bad_key = BTreeMap::new();
        bad_key.insert("Bad Key".to_string(), "x".to_string());
        assert!(matches!(
            service.update(bad_key).await.unwrap_err(),
            ServiceError::ValidationError(_)
        ));

        let mut bad_page = BTreeMap::new();
        bad_page.insert("posts_per_page".to_string(), "0".to_string());
        assert!(service.update(bad_page).await.is_err());
    }

    #[tokio::test]
    async fn test_typed_accessors() {
        let service = setup().await;
        assert_eq!(service.posts_per_page().await.unwrap(), 10);
        assert!(service.flag("comments_enabled", false).await.unwrap());
        assert!(!service.flag("nonexistent_flag", false).await.unwrap());

        let mut changes = BTreeMap::new();
        changes.insert("comments_enabled".to_string(), "false".to_string());
        changes.insert("posts_per_page".to_string(), "25".to_string());
        service.update(changes).await.unwrap();

        assert!(!service.flag("comments_enabled", true).await.unwrap());
        assert_eq!(service.posts_per_page().await.unwrap(), 25);
    }
}
