//! Sorting and offset paging for repository reads.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tenantry_core::{Row, SortDirection};

/// Default page size when a caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Ordered list of `(field, direction)` pairs. Earlier entries take priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub orders: Vec<(String, SortDirection)>,
}

impl Sort {
    #[must_use]
    pub fn unsorted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by(field: &str, direction: SortDirection) -> Self {
        Self::unsorted().then(field, direction)
    }

    #[must_use]
    pub fn then(mut self, field: &str, direction: SortDirection) -> Self {
        self.orders.push((field.to_string(), direction));
        self
    }

    #[must_use]
    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    /// Compares two rows field by field. Missing or incomparable values sort
    /// after present ones regardless of direction.
    pub fn compare(&self, a: &dyn Row, b: &dyn Row) -> Ordering {
        for (field, direction) in &self.orders {
            let ordering = match (a.column(field), b.column(field)) {
                (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                    let ordering = x.compare(&y).unwrap_or(Ordering::Equal);
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                }
                (Some(x), _) if !x.is_null() => Ordering::Less,
                (_, Some(y)) if !y.is_null() => Ordering::Greater,
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    #[serde(default)]
    pub sort: Sort,
}

impl PageRequest {
    /// Page `page` of `size` items. `size` is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort: Sort::unsorted(),
        }
    }

    #[must_use]
    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::of(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    /// Cuts the requested window out of an already filtered and ordered list.
    pub fn slice(items: Vec<T>, request: &PageRequest) -> Self {
        let total_elements = items.len() as u64;
        let content = items
            .into_iter()
            .skip(request.offset())
            .take(request.size as usize)
            .collect();
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }
}
