use std::collections::BTreeSet;

use anitemp_edit_model::{EditList, Segment, Transition, TransitionSpec};
use proptest::prelude::*;

proptest! {
    #[test]
    fn snapshot_preserves_input_order(ids in proptest::collection::btree_set(0u32..10_000, 0..40)) {
        // Unique ids arrive sorted; reverse so list order differs from id order.
        let mut ordered: Vec<u32> = ids.into_iter().collect();
        ordered.reverse();
        let segments: Vec<Segment> = ordered
            .iter()
            .map(|id| Segment::remote(*id, format!("/clip{id}.mp4")))
            .collect();

        let list = EditList::new(segments).unwrap();
        let snapshot_ids: Vec<u32> = list.snapshot().iter().map(|s| s.id).collect();
        prop_assert_eq!(snapshot_ids, ordered);
    }

    #[test]
    fn any_duplicate_id_is_rejected(ids in proptest::collection::vec(0u32..20, 2..30)) {
        let unique: BTreeSet<u32> = ids.iter().copied().collect();
        let segments: Vec<Segment> = ids.iter().map(|id| Segment::remote(*id, "x.mp4")).collect();
        let result = EditList::new(segments);
        prop_assert_eq!(result.is_ok(), unique.len() == ids.len());
    }

    #[test]
    fn tags_outside_catalog_never_resolve(tag in "[a-zA-Z]{0,12}") {
        let known = Transition::ALL
            .iter()
            .any(|t| t.tag() == tag.to_ascii_lowercase());
        prop_assert_eq!(TransitionSpec::new(tag.clone()).kind().is_some(), known);
    }
}
