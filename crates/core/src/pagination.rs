//! Pagination primitives shared by store listings and the API layer.

use serde::{Deserialize, Serialize};

/// Pagination parameters for listing queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Build from optional query parameters; the limit is capped at 100.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(20).min(100),
            offset: offset.unwrap_or(0),
        }
    }

    /// Build from 1-based page/limit query parameters.
    pub fn from_page(page: Option<u32>, limit: Option<u32>) -> Self {
        let limit = limit.unwrap_or(20).min(100);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit,
            offset: (page - 1) * limit,
        }
    }
}

/// One page of a listing, with the total across all pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items matching the query (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    /// Whether more items exist past this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = (pagination.offset as u64 + items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
            has_more: self.has_more,
        }
    }
}
