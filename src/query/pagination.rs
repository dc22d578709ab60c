//! Offset pagination and listing metadata

use serde::{Deserialize, Serialize};

/// Page size bounds applied to caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Page size used when the caller gives a page but no size (default: 10)
    pub default_page_size: i64,
    /// Upper bound for caller-supplied page sizes (default: 100)
    pub max_page_size: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    page_size: i64,
}

impl Pagination {
    /// Page is clamped to >= 1, page size to `1..=max_page_size`.
    pub fn new(page: Option<i64>, page_size: Option<i64>, limits: PageLimits) -> Self {
        let max = limits.max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(limits.default_page_size).clamp(1, max),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Rows to skip before this page; saturates for absurdly large pages
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Rows in this page
    pub fn take(&self) -> i64 {
        self.page_size
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        PaginationMeta {
            total,
            page_count: page_count(total, self.page_size),
            page: self.page,
        }
    }
}

/// Number of pages needed for `total` rows; zero rows means zero pages.
pub fn page_count(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

/// Metadata accompanying a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: i64,
    pub page_count: i64,
    pub page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_and_take() {
        let p = Pagination::new(Some(2), Some(5), PageLimits::default());
        assert_eq!(p.skip(), 5);
        assert_eq!(p.take(), 5);

        let first = Pagination::new(None, None, PageLimits::default());
        assert_eq!(first.skip(), 0);
        assert_eq!(first.take(), 10);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(23, 5), 5);
        assert_eq!(page_count(25, 5), 5);
        assert_eq!(page_count(26, 5), 6);
        assert_eq!(page_count(0, 5), 0);
        assert_eq!(page_count(1, 10), 1);
    }

    #[test]
    fn test_clamping() {
        let limits = PageLimits {
            default_page_size: 10,
            max_page_size: 50,
        };
        let p = Pagination::new(Some(0), Some(500), limits);
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 50);
        assert_eq!(p.skip(), 0);

        let p = Pagination::new(Some(-4), Some(0), limits);
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 1);
    }

    #[test]
    fn test_huge_page_saturates() {
        let p = Pagination::new(Some(i64::MAX), Some(10), PageLimits::default());
        assert_eq!(p.page(), i64::MAX);
        assert_eq!(p.skip(), i64::MAX);
        assert_eq!(p.meta(3).page_count, 1);
    }

    #[test]
    fn test_meta() {
        let meta = Pagination::new(Some(3), Some(5), PageLimits::default()).meta(23);
        assert_eq!(
            meta,
            PaginationMeta {
                total: 23,
                page_count: 5,
                page: 3
            }
        );
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["pageCount"], 5);
    }
}
