//! Page normalisation shared by every listing.

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 50;

/// Normalised page request. `page` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Non-positive or missing values fall back to defaults; page size is
    /// capped to [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|p| *p > 0).map(|p| p as u64).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .map(|s| (s as u64).min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self { page, page_size }
    }

    /// Rows to skip, bounded to what a `BIGINT` offset can hold.
    pub fn skip(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.page_size)
            .min(i64::MAX as u64)
    }

    /// Rows to read.
    pub fn limit(&self) -> u64 {
        self.page_size
    }

    /// Pages needed to hold `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}
