use serde::Serialize;

use crate::errors::ServiceError;

pub const MAX_PAGE_SIZE: i64 = 1000;
pub const MAX_WINDOW_SIZE: i64 = 100;

/// A 1-based page request with the width of the page-number window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub current: i64,
    pub size: i64,
    pub window: i64,
}

impl PageQuery {
    pub fn new(current: i64, size: i64, window: i64) -> Result<Self, ServiceError> {
        if current < 1 || size < 1 || window < 1 {
            return Err(ServiceError::BadRequest(format!(
                "Pagination values must be positive: page {current}, size {size}, window {window}"
            )));
        }
        if size > MAX_PAGE_SIZE || window > MAX_WINDOW_SIZE {
            return Err(ServiceError::BadRequest(format!(
                "Pagination too large: size {size} (max {MAX_PAGE_SIZE}), window {window} (max {MAX_WINDOW_SIZE})"
            )));
        }
        if (current - 1).checked_mul(size).is_none() {
            return Err(ServiceError::BadRequest(format!("Page {current} is out of range")));
        }
        Ok(Self {
            current,
            size,
            window,
        })
    }

    /// Bounded by `new`.
    pub fn offset(&self) -> i64 {
        (self.current - 1) * self.size
    }

    pub fn limit(&self) -> i64 {
        self.size
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub pagination_page_count: i64,
    pub pagination_page_nums: Vec<i64>,
}

impl Pagination {
    /// Page count for `total` records plus a window of page numbers around
    /// the current page, clipped to `[1, page_count]`.
    pub fn new(query: &PageQuery, total: i64) -> Self {
        let page_count = total / query.size + i64::from(total % query.size != 0);
        Self {
            pagination_page_count: page_count,
            pagination_page_nums: window(query.current, page_count, query.window),
        }
    }
}

fn window(current: i64, page_count: i64, size: i64) -> Vec<i64> {
    if page_count < size {
        return (1..=page_count).collect();
    }
    let first = (current.saturating_add(1) - size / 2)
        .max(1)
        .min(page_count - size + 1);
    (first..=first + (size - 1)).collect()
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub pagination: Pagination,
    pub items: Vec<T>,
}
