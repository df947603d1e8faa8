//! Post-fetch windowing over a result group.
//!
//! Windowing runs after the batch result has been grouped per key, so every
//! parent gets its own window over its own children. Two shapes are
//! supported: offset/limit ([`slice_offset_limit`]) and page/perPage
//! ([`paginate`]).

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

#[cfg(test)]
mod window_proptest;

/// Default page size when a request does not supply one.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Offset/limit window arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetLimit {
    /// Items to skip from the start of the group. Defaults to 0.
    pub skip: Option<usize>,
    /// Maximum number of items. `None` or 0 means unbounded.
    pub limit: Option<usize>,
}

impl OffsetLimit {
    pub fn new(skip: Option<usize>, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }

    /// Fills an absent limit with `default`.
    pub fn with_default_limit(mut self, default: Option<usize>) -> Self {
        if self.limit.is_none() {
            self.limit = default;
        }
        self
    }
}

/// Returns `group[skip..skip + limit]`, clipped to the group's length.
///
/// An absent group yields an empty window.
pub fn slice_offset_limit<R: Clone>(group: Option<&[R]>, window: OffsetLimit) -> Vec<R> {
    let Some(group) = group else {
        return Vec::new();
    };
    let start = window.skip.unwrap_or(0).min(group.len());
    let end = match window.limit {
        Some(limit) if limit > 0 => start.saturating_add(limit).min(group.len()),
        _ => group.len(),
    };
    group[start..end].to_vec()
}

/// Page/perPage window arguments. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl PageArgs {
    pub fn new(page: Option<usize>, per_page: Option<usize>) -> Self {
        Self { page, per_page }
    }
}

/// Page metadata, recomputed for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: usize,
    pub per_page: usize,
    pub item_count: usize,
    pub page_count: usize,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// One page of a result group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<R> {
    pub items: Vec<R>,
    /// Size of the whole group, not of this page.
    pub count: usize,
    pub page_info: PageInfo,
}

/// Cuts one page out of `group`.
///
/// `page` defaults to 1 (0 is read as 1) and is clamped to the page count,
/// so a request past the end returns the last page. An empty or absent group
/// has no pages to clamp to: it keeps the requested page and reports a page
/// count of 0. `per_page` defaults to `default_per_page`; a zero page size is
/// rejected.
pub fn paginate<R: Clone>(
    group: Option<&[R]>,
    args: PageArgs,
    default_per_page: usize,
) -> LoadResult<Page<R>> {
    let per_page = validate_per_page(args, default_per_page)?;

    let group = group.unwrap_or(&[]);
    let item_count = group.len();
    let page_count = item_count.div_ceil(per_page);
    let requested = args.page.unwrap_or(1).max(1);
    let page = if item_count == 0 {
        requested
    } else {
        requested.min(page_count)
    };

    let start = ((page - 1) * per_page).min(item_count);
    let end = (start + per_page).min(item_count);

    Ok(Page {
        items: group[start..end].to_vec(),
        count: item_count,
        page_info: PageInfo {
            current_page: page,
            per_page,
            item_count,
            page_count,
            has_previous_page: page > 1,
            has_next_page: page < page_count,
        },
    })
}

/// Resolves the effective page size, rejecting zero.
pub fn validate_per_page(args: PageArgs, default_per_page: usize) -> LoadResult<usize> {
    let per_page = args.per_page.unwrap_or(default_per_page);
    if per_page == 0 {
        return Err(LoadError::InvalidWindow {
            message: "perPage must be at least 1".to_string(),
        });
    }
    Ok(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten() -> Vec<u32> {
        (0..10).collect()
    }

    // ============================================================
    // Section 1: Offset/Limit
    // ============================================================

    #[test]
    fn test_offset_limit_inside_group() {
        // Arrange
        let items = ten();

        // Act
        let window = slice_offset_limit(Some(&items[..]), OffsetLimit::new(Some(3), Some(4)));

        // Assert
        assert_eq!(window, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_offset_limit_clipped_at_end() {
        let items = ten();
        let window = slice_offset_limit(Some(&items[..]), OffsetLimit::new(Some(8), Some(5)));
        assert_eq!(window, vec![8, 9]);
    }

    #[test]
    fn test_offset_limit_defaults_return_whole_group() {
        let items = ten();
        assert_eq!(slice_offset_limit(Some(&items[..]), OffsetLimit::default()), items);
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let items = ten();
        let window = slice_offset_limit(Some(&items[..]), OffsetLimit::new(Some(7), Some(0)));
        assert_eq!(window, vec![7, 8, 9]);
    }

    #[test]
    fn test_skip_past_end_is_empty() {
        let items = ten();
        let window = slice_offset_limit(Some(&items[..]), OffsetLimit::new(Some(42), Some(3)));
        assert!(window.is_empty());
    }

    #[test]
    fn test_absent_group_is_empty() {
        let window = slice_offset_limit::<u32>(None, OffsetLimit::new(Some(1), Some(2)));
        assert!(window.is_empty());
    }

    #[test]
    fn test_default_limit_only_fills_absent_limit() {
        let filled = OffsetLimit::new(None, None).with_default_limit(Some(5));
        let kept = OffsetLimit::new(None, Some(2)).with_default_limit(Some(5));
        assert_eq!(filled.limit, Some(5));
        assert_eq!(kept.limit, Some(2));
    }

    // ============================================================
    // Section 2: Page/PerPage
    // ============================================================

    #[test]
    fn test_last_page_of_twenty_five() {
        // Arrange
        let items: Vec<u32> = (0..25).collect();

        // Act
        let page = paginate(Some(&items[..]), PageArgs::new(Some(3), Some(10)), DEFAULT_PER_PAGE).unwrap();

        // Assert
        assert_eq!(page.items, (20..25).collect::<Vec<_>>());
        assert_eq!(page.count, 25);
        assert_eq!(page.page_info.page_count, 3);
        assert_eq!(page.page_info.current_page, 3);
        assert!(!page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
    }

    #[test]
    fn test_page_past_end_is_clamped_to_last_page() {
        let items: Vec<u32> = (0..25).collect();

        let page = paginate(Some(&items[..]), PageArgs::new(Some(9), Some(10)), DEFAULT_PER_PAGE).unwrap();

        assert_eq!(page.page_info.current_page, 3);
        assert_eq!(page.items.len(), 5);
    }

    #[test]
    fn test_page_defaults() {
        let items: Vec<u32> = (0..45).collect();

        let page = paginate(Some(&items[..]), PageArgs::default(), DEFAULT_PER_PAGE).unwrap();

        assert_eq!(page.page_info.current_page, 1);
        assert_eq!(page.page_info.per_page, 20);
        assert_eq!(page.page_info.page_count, 3);
        assert_eq!(page.items, (0..20).collect::<Vec<_>>());
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
    }

    #[test]
    fn test_page_zero_reads_as_first_page() {
        let items = ten();
        let page = paginate(Some(&items[..]), PageArgs::new(Some(0), Some(4)), DEFAULT_PER_PAGE).unwrap();
        assert_eq!(page.page_info.current_page, 1);
        assert_eq!(page.items, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_childless_parent_keeps_requested_page() {
        // Act
        let page = paginate::<u32>(None, PageArgs::new(Some(2), Some(5)), DEFAULT_PER_PAGE).unwrap();

        // Assert
        assert!(page.items.is_empty());
        assert_eq!(page.count, 0);
        assert_eq!(page.page_info.current_page, 2);
        assert_eq!(page.page_info.page_count, 0);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_childless_parent_defaults_to_first_page() {
        let empty: Vec<u32> = Vec::new();

        let absent = paginate::<u32>(None, PageArgs::default(), DEFAULT_PER_PAGE).unwrap();
        let present = paginate(Some(&empty[..]), PageArgs::new(Some(0), None), DEFAULT_PER_PAGE).unwrap();

        assert_eq!(absent.page_info.current_page, 1);
        assert!(!absent.page_info.has_previous_page);
        assert_eq!(absent, present);
    }

    #[test]
    fn test_zero_per_page_is_rejected() {
        let items = ten();
        let err = paginate(Some(&items[..]), PageArgs::new(Some(1), Some(0)), DEFAULT_PER_PAGE).unwrap_err();
        assert!(matches!(err, LoadError::InvalidWindow { .. }));
        assert!(validate_per_page(PageArgs::default(), 0).is_err());
        assert_eq!(validate_per_page(PageArgs::default(), DEFAULT_PER_PAGE).unwrap(), 20);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let items = ten();
        let page = paginate(Some(&items[..]), PageArgs::new(Some(2), Some(4)), DEFAULT_PER_PAGE).unwrap();

        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["count"], 10);
        assert_eq!(json["pageInfo"]["currentPage"], 2);
        assert_eq!(json["pageInfo"]["perPage"], 4);
        assert_eq!(json["pageInfo"]["itemCount"], 10);
        assert_eq!(json["pageInfo"]["pageCount"], 3);
        assert_eq!(json["pageInfo"]["hasPreviousPage"], true);
        assert_eq!(json["pageInfo"]["hasNextPage"], true);
    }
}
