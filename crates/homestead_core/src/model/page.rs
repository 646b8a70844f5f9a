//! Offset pagination shared by household and transaction listings.

use serde::Serialize;

/// Households returned per listing page.
pub const HOUSEHOLD_PAGE_SIZE: u32 = 50;
/// Transactions returned per listing page.
pub const TRANSACTION_PAGE_SIZE: u32 = 10;

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub items: Vec<T>,
}

/// Resolved `LIMIT`/`OFFSET` for a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
}

impl PageWindow {
    /// Page numbers start at 1; `0` is treated as the first page.
    pub fn new(page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        Self {
            page,
            limit: page_size,
            offset: u64::from(page - 1) * u64::from(page_size),
        }
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        let pages = total.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::PageWindow;

    #[test]
    fn page_zero_is_first_page() {
        let window = PageWindow::new(0, 10);
        assert_eq!(window.page, 1);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn offset_and_total_pages() {
        let window = PageWindow::new(3, 10);
        assert_eq!(window.offset, 20);
        assert_eq!(window.total_pages(0), 0);
        assert_eq!(window.total_pages(10), 1);
        assert_eq!(window.total_pages(21), 3);
    }
}
