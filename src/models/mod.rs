/// Domain records shared by the stores, services and routes.

mod post;
mod user;

pub use post::{Post, PostStatus};
pub use user::{ProfileUpdate, Role, User, UserResponse, UserStatus};

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Page selection from query parameters, normalised before use
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Rows to skip; saturates instead of overflowing for absurd page numbers
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(request: &PageRequest, total: i64) -> Self {
        let per_page = request.page_size();
        Self {
            page: request.page(),
            per_page,
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

/// Paginated list body
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_normalisation() {
        let request = PageRequest::new(0, 500);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);

        let request = PageRequest::new(3, 20);
        assert_eq!(request.offset(), 40);
    }

    #[test]
    fn test_huge_page_number_does_not_overflow() {
        let request = PageRequest::new(i64::MAX, 100);
        assert_eq!(request.offset(), i64::MAX);

        let meta = PageMeta::new(&request, 5);
        assert_eq!(meta.page, i64::MAX);
        assert_eq!(meta.total_pages, 1);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let meta = PageMeta::new(&PageRequest::new(1, 10), 21);
        assert_eq!(meta.total_pages, 3);
        let meta = PageMeta::new(&PageRequest::default(), 0);
        assert_eq!(meta.total_pages, 0);
    }
}
