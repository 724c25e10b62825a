//! Paginated read results.
//!
//! A [`Page`] carries one window of results together with the number of items
//! that matched before the window was applied.

use serde::{Deserialize, Serialize};

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// use docvault_core::page::Page;
///
/// let page = Page::paginate(vec![1, 2, 3, 4], Some(1), Some(2));
///
/// assert_eq!(page.items, vec![2, 3]);
/// assert_eq!(page.total, 4);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Number of items that matched before `skip` and `limit` were applied.
    pub total: usize,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Applies `skip` then `limit` to the full result set.
    ///
    /// A `skip` at or beyond the end yields an empty page. A `limit` of zero
    /// means no limit.
    pub fn paginate(items: Vec<T>, skip: Option<usize>, limit: Option<usize>) -> Self {
        let total = items.len();
        let skip = skip.unwrap_or(0);

        if skip >= total {
            return Page::builder(Vec::new()).with_total(total).build();
        }

        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(usize::MAX);

        Page::builder(
            items
                .into_iter()
                .skip(skip)
                .take(limit)
                .collect(),
        )
        .with_total(total)
        .build()
    }

    /// Transforms every item, keeping the total.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }

    /// Number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if this page holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Builder for constructing [`Page`] instances.
pub struct PageBuilder<T> {
    items: Vec<T>,
    total: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self { items, total: None }
    }

    /// Sets the total count of matching items. Defaults to the page length.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        let total = self.total.unwrap_or(self.items.len());

        Page {
            items: self.items,
            total,
        }
    }
}
