use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 50;

/// Raw `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// A resolved, 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self::from_params(PageParams {
            page: Some(page),
            per_page: Some(per_page),
        })
    }

    pub fn first() -> Self {
        Self::from_params(PageParams::default())
    }

    /// Out-of-range values are clamped rather than rejected.
    pub fn from_params(params: PageParams) -> Self {
        let page = params.page.unwrap_or(1).max(1);
        let per_page = match params.per_page {
            Some(n) if n >= 1 => n.min(MAX_PER_PAGE),
            _ => DEFAULT_PER_PAGE,
        };
        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Saturates for absurd page numbers; such a window is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn info(&self, total: i64) -> PageInfo {
        let pages = if total == 0 {
            0
        } else {
            (total + self.per_page - 1) / self.per_page
        };
        PageInfo {
            page: self.page,
            per_page: self.per_page,
            total,
            pages,
            has_next: self.page < pages,
            has_prev: self.page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(Page::first(), Page { page: 1, per_page: 20 });
        assert_eq!(Page::new(0, 500), Page { page: 1, per_page: 50 });
        assert_eq!(Page::new(-3, 0), Page { page: 1, per_page: 20 });
    }

    #[test]
    fn offsets_are_disjoint_windows() {
        let first = Page::new(1, 10);
        let second = Page::new(2, 10);
        assert_eq!(first.offset(), 0);
        assert_eq!(second.offset(), 10);
        assert_eq!(first.offset() + first.limit(), second.offset());
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Page::from_params(PageParams {
            page: Some(i64::MAX),
            per_page: Some(50),
        });
        assert_eq!(page.offset(), i64::MAX);
        let info = page.info(3);
        assert_eq!(info.pages, 1);
        assert!(!info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn page_info_counts_pages() {
        let info = Page::new(2, 10).info(25);
        assert_eq!(info.pages, 3);
        assert!(info.has_next);
        assert!(info.has_prev);

        let empty = Page::first().info(0);
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
