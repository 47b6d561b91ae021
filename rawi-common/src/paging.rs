//! Pagination types for listing endpoints

use serde::{Deserialize, Serialize};

const MAX_PAGE_SIZE: i64 = 100;

/// Page request taken from query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PagingParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// Page description returned alongside the items
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMetadata {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PagingParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PagingParams {
    /// Page size clamped to the allowed range
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// Build the metadata block for a listing of `total_count` rows
    pub fn meta(&self, total_count: i64) -> PaginationMetadata {
        let page_size = self.limit();
        PaginationMetadata {
            page: self.page.max(1),
            page_size,
            total_count,
            total_pages: (total_count + page_size - 1) / page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_limit() {
        let paging = PagingParams {
            page: 3,
            page_size: 20,
        };
        assert_eq!(paging.limit(), 20);
        assert_eq!(paging.offset(), 40);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let paging = PagingParams {
            page: 0,
            page_size: 1000,
        };
        assert_eq!(paging.limit(), MAX_PAGE_SIZE);
        assert_eq!(paging.offset(), 0);
    }

    #[test]
    fn metadata_rounds_pages_up() {
        let paging = PagingParams {
            page: 1,
            page_size: 20,
        };
        let meta = paging.meta(41);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total_count, 41);
    }
}
