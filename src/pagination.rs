use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// PaginationParam
///
/// The `page` / `perPage` query parameters accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaginationParam {
    /// 1-based page number. Out-of-range values are clamped.
    pub page: Option<i64>,
    /// Items per page, between 1 and 100. Defaults to 10.
    pub per_page: Option<i64>,
}

impl PaginationParam {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> Result<i64, ApiError> {
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::validation(format!(
                "perPage must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(per_page)
    }

    /// window
    ///
    /// Validates `perPage` and computes the page window over `total_count` items.
    pub fn window(&self, total_count: i64) -> Result<PageWindow, ApiError> {
        Ok(PageWindow::compute(self.page(), self.per_page()?, total_count))
    }
}

/// PageWindow
///
/// A computed page over a collection of `total_count` items. The requested page
/// is clamped into `[1, page_count]`; an empty collection always sits on page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
    pub page_count: i64,
    pub total_count: i64,
}

impl PageWindow {
    pub fn compute(requested_page: i64, per_page: i64, total_count: i64) -> Self {
        let per_page = per_page.max(1);
        let total_count = total_count.max(0);
        let page_count = (total_count + per_page - 1) / per_page;
        // `clamp` panics when the upper bound is 0.
        let page = requested_page.min(page_count).max(1);
        Self {
            page,
            per_page,
            page_count,
            total_count,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn page_items_count(&self) -> i64 {
        (self.total_count - self.offset()).clamp(0, self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn pagination(&self) -> Pagination {
        if self.is_empty() {
            return Pagination::default();
        }
        Pagination {
            page: Some(self.page),
            per_page: Some(self.per_page),
            page_count: Some(self.page_count),
            page_items_count: Some(self.page_items_count()),
            total_count: Some(self.total_count),
        }
    }

    /// slice
    ///
    /// Cuts an already loaded collection down to this window.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.per_page as usize)
            .collect()
    }
}

/// Pagination
///
/// Serialized alongside `data` in list responses. Every field is omitted for an
/// empty collection, which renders as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_items_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
}

/// paginate
///
/// In-memory pagination: the whole collection is loaded, then sliced.
pub fn paginate<T>(items: Vec<T>, param: &PaginationParam) -> Result<(Vec<T>, PageWindow), ApiError> {
    let window = param.window(items.len() as i64)?;
    Ok((window.slice(items), window))
}
