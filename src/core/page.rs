//! Paged collections returned by browse-style actions

use serde::Serialize;

/// A page of results with its pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Transform every item, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PageMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Ensure limit is at least 1 to avoid division by zero
        let limit = limit.max(1);
        let page = page.max(1);
        let pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1) * limit;

        Self {
            page,
            limit,
            total,
            pages,
            has_next: start + limit < total,
            has_prev: page > 1,
        }
    }
}
