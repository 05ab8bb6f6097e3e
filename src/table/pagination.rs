//! Page arithmetic for `Table::paginate`.

use crate::record::{Entity, Record};
use serde::Serialize;
use std::fmt;

/// Largest offset SQLite reads as an integer literal.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Clamps page and page size to at least 1 and returns them with the row
/// offset of the page, capped at `i64::MAX`.
pub fn clamp(page: i64, per_page: i64) -> (u64, u64, u64) {
    let page = page.max(1) as u64;
    let per_page = per_page.max(1) as u64;
    let offset = (page - 1).saturating_mul(per_page).min(MAX_OFFSET);
    (page, per_page, offset)
}

/// Pagination metadata, serialized alongside the page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    /// 1-based index of the first row on this page, 0 when the page is empty
    pub from: u64,
    /// 1-based index of the last row on this page, 0 when the page is empty
    pub to: u64,
    /// Rows on this page
    pub count: u64,
    pub has_more_pages: bool,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

impl PageMeta {
    /// Builds metadata for an already clamped `page`/`per_page`, the total
    /// number of matching rows and the rows actually fetched.
    pub fn compute(page: u64, per_page: u64, total: u64, count: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page);

        if total == 0 {
            return PageMeta {
                current_page: page,
                per_page,
                total,
                last_page,
                from: 0,
                to: 0,
                count,
                has_more_pages: false,
                next_page: None,
                prev_page: None,
            };
        }

        let offset = (page - 1).saturating_mul(per_page);
        let (from, to) = if count == 0 {
            (0, 0)
        } else {
            (offset + 1, offset + count)
        };
        let has_more_pages = page < last_page;
        // past the end, "previous" points back at the last real page
        let prev_page = if page > last_page {
            Some(last_page)
        } else if page > 1 {
            Some(page - 1)
        } else {
            None
        };

        PageMeta {
            current_page: page,
            per_page,
            total,
            last_page,
            from,
            to,
            count,
            has_more_pages,
            next_page: has_more_pages.then_some(page + 1),
            prev_page,
        }
    }
}

/// One page of records plus its metadata.
#[derive(Serialize)]
#[serde(bound = "")]
pub struct Page<E: Entity> {
    pub data: Vec<Record<E>>,
    pub meta: PageMeta,
}

impl<E: Entity> Clone for Page<E> {
    fn clone(&self) -> Self {
        Page {
            data: self.data.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl<E: Entity> fmt::Debug for Page<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("data", &self.data)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(0, 0), (1, 1, 0));
        assert_eq!(clamp(-3, 10), (1, 10, 0));
        assert_eq!(clamp(3, 10), (3, 10, 20));
    }

    #[test]
    fn test_clamp_caps_offset() {
        assert_eq!(clamp(i64::MAX, 2), (i64::MAX as u64, 2, i64::MAX as u64));
        assert_eq!(clamp(2, i64::MAX), (2, i64::MAX as u64, i64::MAX as u64));
    }

    #[test]
    fn test_page_is_debug_and_clone_for_plain_entities() {
        struct Marker;
        impl Entity for Marker {}

        let page: Page<Marker> = Page {
            data: vec![Record::empty()],
            meta: PageMeta::compute(1, 10, 1, 1),
        };
        let copy = page.clone();
        assert_eq!(copy.meta, page.meta);
        assert_eq!(copy.data, page.data);
        assert!(format!("{:?}", copy).starts_with("Page { data: [Record"));
    }

    #[test]
    fn test_last_partial_page() {
        let meta = PageMeta::compute(3, 10, 25, 5);
        assert_eq!(meta.last_page, 3);
        assert_eq!((meta.from, meta.to), (21, 25));
        assert!(!meta.has_more_pages);
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.prev_page, Some(2));
    }

    #[test]
    fn test_first_page() {
        let meta = PageMeta::compute(1, 10, 25, 10);
        assert_eq!((meta.from, meta.to), (1, 10));
        assert!(meta.has_more_pages);
        assert_eq!(meta.next_page, Some(2));
        assert_eq!(meta.prev_page, None);
    }

    #[test]
    fn test_empty_result() {
        let meta = PageMeta::compute(1, 10, 0, 0);
        assert_eq!(meta.last_page, 0);
        assert_eq!((meta.from, meta.to), (0, 0));
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.prev_page, None);
    }

    #[test]
    fn test_page_past_the_end() {
        let meta = PageMeta::compute(7, 10, 25, 0);
        assert_eq!((meta.from, meta.to), (0, 0));
        assert!(!meta.has_more_pages);
        assert_eq!(meta.prev_page, Some(3));
    }

    #[test]
    fn test_meta_serialization() {
        let meta = PageMeta::compute(2, 2, 3, 1);
        insta::assert_snapshot!(
            serde_json::to_string(&meta).unwrap(),
            @r#"{"current_page":2,"per_page":2,"total":3,"last_page":2,"from":3,"to":3,"count":1,"has_more_pages":false,"next_page":null,"prev_page":1}"#
        );
    }
}
