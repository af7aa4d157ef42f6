//! Pagination for list endpoints
//!
//! Two query styles share one response envelope:
//! - `?page=N` (1-indexed, configured page size)
//! - `?limit=L&offset=O` (chosen whenever `limit` is present)
//!
//! Responses look like `{"count", "next", "previous", "results"}` where
//! `next`/`previous` are the request path with the paging parameter adjusted.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Upper bound on `?limit=`
pub const MAX_LIMIT: i64 = 1000;

/// Query parameters for paginated lists
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Number { page: i64 },
    LimitOffset,
}

/// Resolved LIMIT/OFFSET window for a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
    style: Style,
}

/// Paginated response envelope
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl PageQuery {
    /// Turn the query into a LIMIT/OFFSET window
    ///
    /// Page numbers below 1, or too large to address, are rejected. A
    /// missing or non-positive `limit` falls back to the page size and is
    /// capped at [`MAX_LIMIT`]; a negative `offset` becomes 0.
    pub fn resolve(&self, page_size: u32) -> ApiResult<PageRequest> {
        let page_size = i64::from(page_size.max(1));

        if let Some(limit) = self.limit {
            let limit = if limit > 0 { limit.min(MAX_LIMIT) } else { page_size };
            return Ok(PageRequest {
                limit,
                offset: self.offset.unwrap_or(0).max(0),
                style: Style::LimitOffset,
            });
        }

        let page = self.page.unwrap_or(1);
        let offset = (page >= 1)
            .then(|| (page - 1).checked_mul(page_size))
            .flatten()
            .ok_or_else(|| ApiError::NotFound("Invalid page.".to_string()))?;

        Ok(PageRequest {
            limit: page_size,
            offset,
            style: Style::Number { page },
        })
    }
}

impl PageRequest {
    /// Wrap query results in the response envelope
    ///
    /// A page number past the last page is a 404; page 1 of an empty list is
    /// not.
    pub fn finish<T>(self, results: Vec<T>, count: i64, uri: &Uri) -> ApiResult<Page<T>> {
        match self.style {
            Style::Number { page } => {
                let total_pages = (count.saturating_add(self.limit - 1) / self.limit).max(1);
                if page > total_pages {
                    return Err(ApiError::NotFound("Invalid page.".to_string()));
                }

                let next = (page < total_pages)
                    .then(|| with_query_param(uri, "page", Some((page + 1).to_string())));
                let previous = (page > 1).then(|| {
                    let value = (page > 2).then(|| (page - 1).to_string());
                    with_query_param(uri, "page", value)
                });

                Ok(Page { count, next, previous, results })
            }
            Style::LimitOffset => {
                let end = self.offset.saturating_add(self.limit);
                let next = (end < count)
                    .then(|| with_query_param(uri, "offset", Some(end.to_string())));
                let previous = (self.offset > 0).then(|| {
                    let offset = self.offset.saturating_sub(self.limit).max(0);
                    let value = (offset > 0).then(|| offset.to_string());
                    with_query_param(uri, "offset", value)
                });

                Ok(Page { count, next, previous, results })
            }
        }
    }
}

/// Path and query of `uri` with `key` replaced (or removed when `value` is None)
///
/// The query is decoded and re-encoded, so links come back normalised.
fn with_query_param(uri: &Uri, key: &str, value: Option<String>) -> String {
    let mut pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(uri.query().unwrap_or("")).unwrap_or_default();
    pairs.retain(|(name, _)| name != key);

    if let Some(value) = value {
        pairs.push((key.to_string(), value));
    }

    match serde_urlencoded::to_string(&pairs) {
        Ok(query) if !query.is_empty() => format!("{}?{}", uri.path(), query),
        _ => uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn by_page(page: i64) -> PageQuery {
        PageQuery { page: Some(page), ..Default::default() }
    }

    #[test]
    fn test_default_is_first_page() {
        let request = PageQuery::default().resolve(10).unwrap();
        assert_eq!(request.limit, 10);
        assert_eq!(request.offset, 0);
    }

    #[test]
    fn test_page_number_offset() {
        let request = by_page(3).resolve(10).unwrap();
        assert_eq!(request.offset, 20);
    }

    #[test]
    fn test_page_zero_rejected() {
        assert!(by_page(0).resolve(10).is_err());
    }

    #[test]
    fn test_page_links() {
        let request = by_page(2).resolve(10).unwrap();
        let page = request
            .finish(vec![1, 2], 25, &uri("/api/v1/titles/?name=dune&page=2"))
            .unwrap();

        assert_eq!(page.count, 25);
        assert_eq!(page.next.as_deref(), Some("/api/v1/titles/?name=dune&page=3"));
        // Page 1 link drops the parameter
        assert_eq!(page.previous.as_deref(), Some("/api/v1/titles/?name=dune"));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page = by_page(3)
            .resolve(10)
            .unwrap()
            .finish(vec![1], 21, &uri("/x/?page=3"))
            .unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/x/?page=2"));
    }

    #[test]
    fn test_page_past_end_is_not_found() {
        let result = by_page(4)
            .resolve(10)
            .unwrap()
            .finish(Vec::<i32>::new(), 21, &uri("/x/?page=4"));
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_empty_list_first_page_ok() {
        let page = PageQuery::default()
            .resolve(10)
            .unwrap()
            .finish(Vec::<i32>::new(), 0, &uri("/x/"))
            .unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn test_limit_offset_links() {
        let query = PageQuery { limit: Some(5), offset: Some(5), ..Default::default() };
        let request = query.resolve(10).unwrap();
        assert_eq!((request.limit, request.offset), (5, 5));

        let page = request
            .finish(vec![1; 5], 12, &uri("/x/?limit=5&offset=5"))
            .unwrap();
        assert_eq!(page.next.as_deref(), Some("/x/?limit=5&offset=10"));
        assert_eq!(page.previous.as_deref(), Some("/x/?limit=5"));
    }

    #[test]
    fn test_huge_page_rejected_without_overflow() {
        let result = by_page(i64::MAX).resolve(10);
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_huge_limit_capped() {
        let query = PageQuery { limit: Some(i64::MAX), offset: Some(1), ..Default::default() };
        let request = query.resolve(10).unwrap();
        assert_eq!((request.limit, request.offset), (MAX_LIMIT, 1));

        let page = request
            .finish(vec![1; 2], 3, &uri("/x/?limit=9223372036854775807&offset=1"))
            .unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/x/?limit=9223372036854775807"));
    }

    #[test]
    fn test_huge_offset_has_no_next() {
        let query = PageQuery { limit: Some(5), offset: Some(i64::MAX), ..Default::default() };
        let page = query
            .resolve(10)
            .unwrap()
            .finish(Vec::<i32>::new(), 3, &uri("/x/?limit=5&offset=9223372036854775807"))
            .unwrap();
        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("/x/?limit=5&offset=9223372036854775802")
        );
    }

    #[test]
    fn test_links_are_reencoded() {
        let page = by_page(1)
            .resolve(10)
            .unwrap()
            .finish(vec![1], 25, &uri("/x/?name=the%20dune&page=1&page=1"))
            .unwrap();
        assert_eq!(page.next.as_deref(), Some("/x/?name=the+dune&page=2"));
    }

    #[test]
    fn test_limit_offset_sanitized() {
        let query = PageQuery { limit: Some(0), offset: Some(-3), ..Default::default() };
        let request = query.resolve(7).unwrap();
        assert_eq!((request.limit, request.offset), (7, 0));
    }
}
