//! Pagination types.

use serde::{Deserialize, Serialize};

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items in backend order.
    pub items: Vec<T>,
    /// Whether another page follows this one.
    #[serde(default)]
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Build a page.
    pub fn new(items: Vec<T>, has_next_page: bool) -> Self {
        Self {
            items,
            has_next_page,
        }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, false)
    }
}

/// Order in which the backend returns comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first (display order).
    #[default]
    Asc,
    /// Newest first.
    Desc,
}
