//! Property tests: output order and progress shape hold for any edit list.

mod support;

use std::collections::HashMap;

use proptest::prelude::*;

use anitemp_edit_model::Transition;

use support::*;

fn tag_strategy() -> impl Strategy<Value = Option<String>> {
    let known: Vec<String> = Transition::ALL.iter().map(|t| t.tag().to_string()).collect();
    prop_oneof![
        Just(None),
        proptest::sample::select(known).prop_map(Some),
        "[a-z]{3,8}x".prop_map(Some),
    ]
}

fn run(tags: Vec<Option<String>>, delays: Vec<u64>) -> (String, Vec<u8>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let delays_ms: HashMap<String, u64> = delays
        .iter()
        .enumerate()
        .map(|(i, ms)| (format!("processed{i}.mp4"), *ms))
        .collect();
    let h = harness(Script {
        delays_ms,
        ..Script::default()
    });

    let segments: Vec<_> = tags
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            let seg = inline_segment(i as u32 + 1);
            match tag {
                Some(tag) => with_tag(seg, tag),
                None => seg,
            }
        })
        .collect();

    let (callback, seen) = progress_sink();
    let handle = runtime
        .block_on(h.composer.generate(&segments, callback))
        .unwrap();
    let output = contents(&handle);
    let seen = seen.lock().unwrap().clone();
    (output, seen)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn output_follows_input_order(
        tags in proptest::collection::vec(tag_strategy(), 1..6),
        delays in proptest::collection::vec(0u64..15, 6),
    ) {
        let (output, _) = run(tags.clone(), delays);
        let parts: Vec<&str> = output.split('|').collect();
        prop_assert_eq!(parts.len(), tags.len());

        for (i, (part, tag)) in parts.iter().zip(&tags).enumerate() {
            let body = format!("norm:seg{}", i + 1);
            let recognized = tag.as_deref().and_then(Transition::from_tag).is_some();
            if recognized {
                prop_assert_eq!(*part, format!("proc:{body}"));
            } else {
                prop_assert_eq!(*part, body);
            }
        }
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100(
        tags in proptest::collection::vec(tag_strategy(), 1..5),
    ) {
        let (_, seen) = run(tags, vec![0; 5]);
        prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        prop_assert_eq!(seen.last().copied(), Some(100));
        prop_assert!(seen[..seen.len() - 1].iter().all(|p| *p <= 99));
    }
}
