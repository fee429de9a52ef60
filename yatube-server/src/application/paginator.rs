use serde::Serialize;

pub const POSTS_PER_PAGE: u32 = 10;

/// Splits a listing of `total` items into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u32,
}

impl Paginator {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// There is always at least one page, possibly empty.
    pub fn num_pages(&self, total: i64) -> u32 {
        let total = total.max(0) as u64;
        let per_page = u64::from(self.per_page);
        total.div_ceil(per_page).max(1) as u32
    }

    /// Missing or non-numeric → first page; out of range → last page.
    pub fn page_number(&self, requested: Option<&str>, total: i64) -> u32 {
        let last = self.num_pages(total);
        match requested.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && n <= i64::from(last) => n as u32,
            Some(Ok(_)) => last,
        }
    }

    /// Row window of page `number`: `(limit, offset)`.
    pub fn window(&self, number: u32) -> (i64, i64) {
        let limit = i64::from(self.per_page);
        (limit, i64::from(number.saturating_sub(1)) * limit)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(POSTS_PER_PAGE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u32>,
    pub next_page_number: Option<u32>,
    pub page_range: Vec<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u32, num_pages: u32, total: i64) -> Self {
        let has_previous = number > 1;
        let has_next = number < num_pages;
        Self {
            items,
            number,
            num_pages,
            total,
            has_previous,
            has_next,
            previous_page_number: has_previous.then(|| number - 1),
            next_page_number: has_next.then(|| number + 1),
            page_range: (1..=num_pages).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_pages() {
        let paginator = Paginator::default();
        assert_eq!(paginator.num_pages(0), 1);
        assert_eq!(paginator.num_pages(10), 1);
        assert_eq!(paginator.num_pages(11), 2);
        assert_eq!(paginator.num_pages(20), 2);
        assert_eq!(paginator.num_pages(21), 3);
    }

    #[test]
    fn resolves_requested_page() {
        let paginator = Paginator::default();
        assert_eq!(paginator.page_number(None, 15), 1);
        assert_eq!(paginator.page_number(Some("2"), 15), 2);
        assert_eq!(paginator.page_number(Some("abc"), 15), 1);
        assert_eq!(paginator.page_number(Some("99"), 15), 2);
        assert_eq!(paginator.page_number(Some("0"), 15), 2);
        assert_eq!(paginator.page_number(Some("-1"), 15), 2);
        assert_eq!(paginator.page_number(Some("3"), 0), 1);
    }

    #[test]
    fn window_offsets() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(1), (10, 0));
        assert_eq!(paginator.window(3), (10, 20));
    }

    #[test]
    fn page_navigation() {
        let page = Page::new(vec![1, 2, 3], 2, 3, 23);
        assert!(page.has_previous);
        assert!(page.has_next);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.next_page_number, Some(3));
        assert_eq!(page.page_range, vec![1, 2, 3]);
        assert_eq!(page.len(), 3);

        let only = Page::<i32>::new(vec![], 1, 1, 0);
        assert!(!only.has_previous && !only.has_next);
        assert!(only.is_empty());
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(Paginator::new(0).per_page(), 1);
    }
}
