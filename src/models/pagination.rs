//! Page requests and paginated responses

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

use super::{item::ItemDetails, request::RequestDetails};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Validated 1-indexed page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }
        if limit < 1 {
            return Err(AppError::Validation("Limit must be at least 1".to_string()));
        }
        let limit = limit.min(MAX_LIMIT);

        // The offset must fit the store's OFFSET argument
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::Validation(format!("Page {} is out of range", page)));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }

    /// Slice an already sorted in-memory result set
    pub fn slice<T: Clone>(&self, all: &[T]) -> Vec<T> {
        all.iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(ItemPage = Page<ItemDetails>, RequestPage = Page<RequestDetails>)]
pub struct Page<T> {
    /// Records on this page, newest first
    pub data: Vec<T>,
    /// Number of records on this page
    pub count: usize,
    /// Number of records matching the filter
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            count: data.len(),
            data,
            total,
            total_pages: request.total_pages(total),
            current_page: request.page,
        }
    }
}
