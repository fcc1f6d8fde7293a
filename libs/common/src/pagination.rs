//! Limit/offset pagination shared by every list endpoint

use serde::Deserialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Query parameters accepted by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }.normalized()
    }

    /// Clamp the limit into `1..=MAX_LIMIT` and the offset to non-negative
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }

    /// Apply the window to an already ordered iterator
    pub fn apply<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let page = self.normalized();
        items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect()
    }
}
