use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` sorts descending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// `?page=` / `?page_size=` as sent by clients. Both are optional and kept raw
/// so malformed values surface as API errors instead of extractor rejections.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A resolved page request: 1-based page number and a clamped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// A non-numeric page is a 404 "Invalid page."; a malformed size falls back to the default.
    pub fn resolve(params: &PageParams, default_size: u32) -> Result<Self, AppError> {
        let page = match params.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| AppError::NotFound("Invalid page.".to_string()))?
                .max(1),
        };
        let page_size = params
            .page_size
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|&size| size > 0)
            .unwrap_or(default_size)
            .min(MAX_PAGE_SIZE);
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn total_pages(&self, count: i64) -> u32 {
        let size = i64::from(self.page_size);
        u32::try_from((count + size - 1) / size).unwrap_or(u32::MAX)
    }

    /// Page 1 always exists; any later page must hold at least one row.
    pub fn check(&self, count: i64) -> Result<(), AppError> {
        if self.page > 1 && self.page > self.total_pages(count) {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// `path` and `query` are those of the current request; links keep every other parameter.
    pub fn new(results: Vec<T>, count: i64, request: PageRequest, path: &str, query: Option<&str>) -> Self {
        let total_pages = request.total_pages(count);
        let next = (request.page < total_pages).then(|| page_link(path, query, request.page + 1));
        let previous = (request.page > 1).then(|| page_link(path, query, request.page - 1));
        Self {
            count,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            next,
            previous,
            results,
        }
    }
}

fn page_link(path: &str, query: Option<&str>, page: u32) -> String {
    let mut pairs: Vec<&str> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "page" && !pair.starts_with("page="))
        .collect();
    let page_pair = format!("page={page}");
    pairs.push(&page_pair);
    format!("{path}?{}", pairs.join("&"))
}
