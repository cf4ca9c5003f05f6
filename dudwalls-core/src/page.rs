//! Pagination over query results.
//!
//! The Dudwalls API returns whole collections, so pages are cut client-side
//! from the sorted, filtered result of a query. [`PaginationParams`] selects a
//! window and [`Page`] carries it together with navigation metadata.

use serde::{Deserialize, Serialize};

/// One page of results.
///
/// # Example
///
/// ```ignore
/// use dudwalls::page::PaginationParams;
///
/// let page = PaginationParams::new(2, 10).paginate((1..=25).collect::<Vec<_>>());
///
/// assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
/// assert_eq!(page.count, 25);
/// assert_eq!(page.next_page, Some(3));
/// assert_eq!(page.previous_page, Some(1));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Number of items across all pages.
    pub count: usize,
    /// The page size the page was cut with.
    pub per_page: usize,
    /// The next page number, if there are more items.
    pub next_page: Option<usize>,
    /// The previous page number, if this is not the first page.
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Number of pages needed to show `count` items.
    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }

        self.count.div_ceil(self.per_page)
    }

    /// Converts the items while keeping the navigation metadata.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            per_page: self.per_page,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }

    /// Like [`map`](Page::map) for fallible conversions.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            count: self.count,
            per_page: self.per_page,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            per_page: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Which page to retrieve and how large pages are.
///
/// Pages are 1-indexed; a page number of `0` is treated as `1`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    ///
    /// # Arguments
    ///
    /// * `page` - The page number (1-indexed)
    /// * `per_page` - Number of items per page
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    fn page_number(&self) -> usize {
        self.page.max(1)
    }

    /// Number of items before this page.
    pub fn offset(&self) -> usize {
        (self.page_number() - 1).saturating_mul(self.per_page)
    }

    /// Cuts this page out of `items`.
    ///
    /// An offset past the end yields an empty page that still reports the
    /// total count.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let count = items.len();
        let page = self.page_number();
        let end = self.offset().saturating_add(self.per_page).min(count);

        let items = items
            .into_iter()
            .skip(self.offset())
            .take(self.per_page)
            .collect();

        Page {
            items,
            count,
            per_page: self.per_page,
            next_page: (end < count).then_some(page + 1),
            previous_page: (page > 1).then(|| page - 1),
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_middle_page() {
        let page = PaginationParams::new(2, 10).paginate((1..=25).collect::<Vec<_>>());

        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.count, 25);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PaginationParams::new(3, 10).paginate((1..=25).collect::<Vec<_>>());

        assert_eq!(page.items, (21..=25).collect::<Vec<_>>());
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn page_zero_is_first_page() {
        let params = PaginationParams::new(0, 5);
        assert_eq!(params.offset(), 0);

        let page = params.paginate(vec!['a', 'b', 'c']);
        assert_eq!(page.items, vec!['a', 'b', 'c']);
        assert_eq!(page.previous_page, None);
    }

    #[test]
    fn out_of_range_page_is_empty_but_counted() {
        let page = PaginationParams::new(9, 10).paginate(vec![1, 2, 3]);

        assert!(page.items.is_empty());
        assert_eq!(page.count, 3);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(8));
    }

    #[test]
    fn map_keeps_metadata() {
        let page = PaginationParams::new(1, 2).paginate(vec![1, 2, 3]).map(|n| n * 10);

        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.next_page, Some(2));
    }

    #[test]
    fn try_map_stops_at_first_error() {
        let page = PaginationParams::new(1, 3).paginate(vec!["1", "x", "3"]);

        assert!(page.clone().try_map(str::parse::<u8>).is_err());

        let parsed = PaginationParams::new(2, 2).paginate(vec!["1", "2", "3"]).try_map(str::parse::<u8>).unwrap();
        assert_eq!(parsed.items, vec![3]);
        assert_eq!(parsed.count, 3);
        assert_eq!(parsed.previous_page, Some(1));
    }
}
