//! Property-based tests for windowing.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::window::{paginate, slice_offset_limit, OffsetLimit, PageArgs};

    fn group_strategy() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(any::<u32>(), 0..80)
    }

    proptest! {
        #[test]
        fn test_offset_limit_is_a_contiguous_slice(
            group in group_strategy(),
            skip in 0usize..100,
            limit in 0usize..100,
        ) {
            let window = slice_offset_limit(Some(&group[..]), OffsetLimit::new(Some(skip), Some(limit)));

            let start = skip.min(group.len());
            prop_assert_eq!(&window[..], &group[start..start + window.len()]);
            if limit > 0 {
                prop_assert!(window.len() <= limit);
            } else {
                prop_assert_eq!(window.len(), group.len() - start);
            }
        }

        #[test]
        fn test_pages_cover_group_exactly_once(
            group in group_strategy(),
            per_page in 1usize..30,
        ) {
            let first = paginate(Some(&group[..]), PageArgs::new(Some(1), Some(per_page)), 20).unwrap();
            let pages = first.page_info.page_count;

            let mut seen = Vec::new();
            for page in 1..=pages {
                let page = paginate(Some(&group[..]), PageArgs::new(Some(page), Some(per_page)), 20).unwrap();
                prop_assert!(page.items.len() <= per_page);
                prop_assert_eq!(page.count, group.len());
                seen.extend(page.items);
            }
            prop_assert_eq!(seen, group);
        }

        #[test]
        fn test_page_info_is_consistent(
            group in group_strategy(),
            page in 0usize..20,
            per_page in 1usize..30,
        ) {
            let result = paginate(Some(&group[..]), PageArgs::new(Some(page), Some(per_page)), 20).unwrap();
            let info = result.page_info;

            prop_assert_eq!(info.item_count, group.len());
            prop_assert_eq!(info.page_count, group.len().div_ceil(per_page));
            prop_assert!(info.current_page >= 1);
            prop_assert_eq!(info.has_previous_page, info.current_page > 1);
            prop_assert_eq!(info.has_next_page, info.current_page < info.page_count);
            if group.is_empty() {
                prop_assert_eq!(info.current_page, page.max(1));
                prop_assert!(result.items.is_empty());
            } else {
                prop_assert!(info.current_page <= info.page_count);
            }
        }
    }
}
