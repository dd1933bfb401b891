//! Paginated list results.

use serde::{Deserialize, Serialize};

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page (1-indexed).
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total number of items across all pages.
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Metadata for a single page holding every item.
    #[must_use]
    pub fn single(count: usize) -> Self {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Self {
            page: 1,
            limit: count,
            total: u64::from(count),
            total_pages: 1,
        }
    }

    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Whether an earlier page exists.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Wrap a complete, unpaginated list.
    #[must_use]
    pub fn unpaginated(items: Vec<T>) -> Self {
        let pagination = Pagination::single(items.len());
        Self { items, pagination }
    }

    /// Whether the page holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_flags() {
        let middle = Pagination {
            page: 2,
            limit: 12,
            total: 40,
            total_pages: 4,
        };
        assert!(middle.has_next());
        assert!(middle.has_prev());

        let last = Pagination { page: 4, ..middle };
        assert!(!last.has_next());
    }

    #[test]
    fn test_unpaginated_single_page() {
        let page = Page::unpaginated(vec![1, 2, 3]);
        assert_eq!(page.pagination.total, 3);
        assert!(!page.pagination.has_next());
    }
}
