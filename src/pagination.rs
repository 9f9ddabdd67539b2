//! Page selection over grouped report rows.
//!
//! A report row is a group of consecutive records sharing a bucket, so a page
//! cannot be cut by record offsets. Instead the time labels of all records are
//! streamed once (newest first), groups are counted, and the page is turned
//! into a `[min_when, max_when]` filter for the expensive record fetch.

use log::debug;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// 1-based page number; pages past the end fall back to the last one.
    Number(usize),
    Last,
}

impl From<i64> for PageRequest {
    /// `-1` asks for the last page, other values below 1 for the first.
    fn from(number: i64) -> Self {
        match number {
            -1 => PageRequest::Last,
            n if n < 1 => PageRequest::Number(1),
            n => PageRequest::Number(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

/// Time filter and display counters of one page of grouped rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow<T> {
    /// `(min_when, max_when)` of the page, `None` for an empty record set.
    pub bounds: Option<(T, T)>,
    pub total_rows: usize,
    pub total_pages: usize,
    pub page_number: usize,
    pub first_shown: usize,
    pub last_shown: usize,
}

impl<T: PartialOrd> PageWindow<T> {
    /// Row filter: `min_when <= when <= max_when`.
    pub fn contains(&self, when: &T) -> bool {
        match &self.bounds {
            Some((min, max)) => min <= when && when <= max,
            None => false,
        }
    }
}

/// Finds the page `target` among `(group_key, when)` items sorted newest first.
///
/// Consecutive items with equal keys form one row. The whole stream is read
/// to learn the totals, but only the bounds of two pages are kept. The first
/// error of the stream is returned as is.
pub fn slice_pages<K, T, E, I>(
    items: I,
    target: PageRequest,
    page_size: NonZeroUsize,
) -> Result<PageWindow<T>, E>
where
    I: IntoIterator<Item = Result<(K, T), E>>,
    K: PartialEq,
    T: PartialOrd + Clone,
{
    let page_size = page_size.get();
    let target_number = match target {
        PageRequest::Number(n) => Some(n.max(1)),
        PageRequest::Last => None,
    };

    let mut locked: Option<(T, T)> = None;
    let mut current: Option<(T, T)> = None;
    let mut current_page = 0usize;
    let mut group_count = 0usize;
    let mut current_key: Option<K> = None;

    for item in items {
        let (key, when) = item?;

        if current_key.as_ref() != Some(&key) {
            if group_count % page_size == 0 {
                if target_number == Some(current_page) {
                    // the page just finished is the requested one
                    locked = current.take();
                }
                current_page += 1;
                current = Some((when.clone(), when.clone()));
            }
            group_count += 1;
            current_key = Some(key);
        }

        if let Some((min, max)) = current.as_mut() {
            if when < *min {
                *min = when;
            } else if when > *max {
                *max = when;
            }
        }
    }

    let total_rows = group_count;
    let total_pages = current_page;

    let (bounds, page_number) = match (locked, target_number) {
        (Some(bounds), Some(number)) => (Some(bounds), number),
        _ => (current, total_pages.max(1)),
    };

    let (first_shown, last_shown) = if total_rows == 0 {
        (0, 0)
    } else {
        let slice_stop = page_number * page_size;
        (slice_stop - page_size + 1, total_rows.min(slice_stop))
    };

    debug!(
        "Page {}/{} (requested {:?}): rows {}..={} of {}",
        page_number, total_pages, target, first_shown, last_shown, total_rows
    );

    Ok(PageWindow {
        bounds,
        total_rows,
        total_pages,
        page_number,
        first_shown,
        last_shown,
    })
}
