//! Property-based tests for the profiling engine.
//!
//! Core properties covered:
//! 1. Balanced begin/end nesting always drains the in-flight stack
//! 2. Counting is independent across lines and units
//! 3. Arbitrary synthetic keys and line indices never panic or corrupt
//! 4. Capacity growth preserves previously recorded aggregates

use proptest::prelude::*;

use perfilar::registry::Profiler;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_balanced_nesting_drains_stack(
        line in 1usize..100,
        depth in 1usize..40,
    ) {
        // Property: recursive self-nesting of one line, in LIFO order,
        // leaves no begin unmatched and counts every entry.
        let profiler = Profiler::new();
        profiler.toggle(true);

        for _ in 0..depth {
            profiler.begin("<prop>", line);
        }
        for _ in 0..depth {
            profiler.end("<prop>", line);
        }

        prop_assert_eq!(profiler.counters(), (depth as u64, depth as u64));
        prop_assert_eq!(profiler.unit_count(), 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_counting_is_independent_across_lines(
        pairs in prop::collection::vec((1usize..300, 1u64..6), 1..12),
    ) {
        // Property: interleaving begin/end pairs across many lines never
        // bleeds counts between them.
        let profiler = Profiler::new();
        profiler.toggle(true);

        let mut expected = 0u64;
        for (line, calls) in &pairs {
            for _ in 0..*calls {
                profiler.begin("<prop>", *line);
            }
            for _ in 0..*calls {
                profiler.end("<prop>", *line);
            }
            expected += calls;
        }

        prop_assert_eq!(profiler.counters(), (expected, expected));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_arbitrary_synthetic_keys_never_panic(
        keys in prop::collection::vec("<[a-z]{1,8}>", 1..8),
        lines in prop::collection::vec(1usize..500, 1..20),
        stray_ends in prop::collection::vec("<[a-z]{1,8}>", 0..4),
    ) {
        // Property: any mix of begins, ends, and ends for units that were
        // never begun is absorbed without panicking.
        let profiler = Profiler::new();
        profiler.toggle(true);

        for key in &keys {
            for line in &lines {
                profiler.begin(key, *line);
                profiler.end(key, *line);
            }
        }
        for key in &stray_ends {
            profiler.end(key, 1);
        }

        let (begins, ends) = profiler.counters();
        let expected = (keys.len() * lines.len()) as u64;
        prop_assert_eq!(begins, expected);
        // Stray ends only count when their key collided with a begun one
        // and a begin was still in flight; matched ends can never exceed
        // begins.
        prop_assert!(ends <= begins);
        prop_assert!(profiler.unit_count() <= keys.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_growth_preserves_recorded_counts(
        low_line in 1usize..50,
        high_line in 200usize..1000,
        calls in 1u64..8,
    ) {
        // Property: growing a dynamic unit past its capacity keeps every
        // aggregate recorded before the reallocation.
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("growth.profile");
        let profiler = Profiler::new();
        profiler.set_output_pattern(report.to_str().unwrap());
        profiler.toggle(true);

        for _ in 0..calls {
            profiler.begin("<eval>", low_line);
            profiler.end("<eval>", low_line);
        }
        profiler.begin("<eval>", high_line);
        profiler.end("<eval>", high_line);

        profiler.save(None).unwrap();
        let contents = std::fs::read_to_string(&report).unwrap();
        let records: Vec<&str> = contents.lines().collect();
        prop_assert_eq!(records.len(), 2);

        let low = records
            .iter()
            .find(|r| r.ends_with(&format!("<eval>:{}", low_line)))
            .expect("low line record missing after growth");
        let expected_prefix = format!("{} ", calls);
        prop_assert!(low.starts_with(&expected_prefix));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_disabled_profiler_ignores_everything(
        keys in prop::collection::vec("<[a-z]{1,8}>", 1..8),
        lines in prop::collection::vec(1usize..500, 1..20),
    ) {
        // Property: with the switch off, no call sequence creates state.
        let profiler = Profiler::new();
        for key in &keys {
            for line in &lines {
                profiler.begin(key, *line);
                profiler.end(key, *line);
            }
        }
        prop_assert_eq!(profiler.unit_count(), 0);
        prop_assert_eq!(profiler.counters(), (0, 0));
    }
}
