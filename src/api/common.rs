//! Common API utilities and shared types

use serde::{Deserialize, Serialize};

use crate::models::{ListParams, PagedResult};

// ============================================================================
// Pagination
// ============================================================================

pub fn default_page() -> u32 {
    1
}

/// Default page size for admin listings
pub fn default_per_page() -> u32 {
    20
}

/// Pagination query for admin lists
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// One page of items with navigation metadata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<PagedResult<T>> for PageResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        Self {
            total_pages: result.total_pages(),
            has_next: result.has_next(),
            has_prev: result.has_prev(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            items: result.items,
        }
    }
}

impl<T> PageResponse<T> {
    /// An empty page, used when a filter refers to something that does not exist
    pub fn empty(params: &ListParams) -> Self {
        PagedResult::new(Vec::new(), 0, params).into()
    }
}

/// Split a comma-separated query value, dropping blanks
pub fn split_csv(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}
