//! Property-based tests for the retention rule and category classification.
//!
//! Verifies:
//! - Category mismatch always skips, whatever the age
//! - MOVE exactly when the floor-truncated age reaches the threshold
//! - Lowering the threshold never turns a MOVE into a SKIP
//! - Extension lookup ignores case and directory names

use camino::Utf8PathBuf;
use proptest::prelude::*;
use safepurge::FileEntry;
use safepurge::services::retention::age_in_days;
use safepurge::services::{CategoryCatalog, DecisionReason, RetentionPolicy, Verdict};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 86_400;

fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_900_000_000)
}

fn entry(category: Option<&str>, age_secs: u64) -> FileEntry {
    FileEntry {
        path: Utf8PathBuf::from("/data/file.bin"),
        size: 1,
        modified: now() - Duration::from_secs(age_secs),
        category: category.map(Arc::from),
    }
}

fn arb_category() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("documents")),
        Just(Some("videos")),
        Just(Some("images")),
    ]
}

proptest! {
    #[test]
    fn category_mismatch_always_skips(
        age_secs in 0u64..=3_650 * SECS_PER_DAY,
        retention in 0u64..=3_650,
    ) {
        let decision = RetentionPolicy::new(retention, now()).classify(&entry(None, age_secs));
        prop_assert_eq!(decision.verdict, Verdict::Skip);
        prop_assert_eq!(decision.reason, DecisionReason::CategoryMismatch);
    }

    #[test]
    fn move_iff_age_reaches_threshold(
        category in arb_category(),
        age_secs in 0u64..=3_650 * SECS_PER_DAY,
        retention in 0u64..=3_650,
    ) {
        let decision = RetentionPolicy::new(retention, now()).classify(&entry(category, age_secs));
        let expected_age = age_secs / SECS_PER_DAY;

        prop_assert_eq!(decision.age_days, expected_age);
        let should_move = category.is_some() && expected_age >= retention;
        prop_assert_eq!(decision.verdict == Verdict::Move, should_move);
    }

    #[test]
    fn lower_threshold_never_unmoves(
        age_secs in 0u64..=3_650 * SECS_PER_DAY,
        retention in 0u64..=3_650,
        lower_by in 0u64..=3_650,
    ) {
        let file = entry(Some("documents"), age_secs);
        let strict = RetentionPolicy::new(retention, now()).classify(&file);
        let lenient =
            RetentionPolicy::new(retention.saturating_sub(lower_by), now()).classify(&file);

        if strict.verdict == Verdict::Move {
            prop_assert_eq!(lenient.verdict, Verdict::Move);
        }
    }

    #[test]
    fn zero_retention_moves_every_matching_file(age_secs in 0u64..=SECS_PER_DAY * 30) {
        let decision = RetentionPolicy::new(0, now()).classify(&entry(Some("images"), age_secs));
        prop_assert_eq!(decision.verdict, Verdict::Move);
    }

    #[test]
    fn future_timestamps_are_zero_days_old(ahead_secs in 1u64..=SECS_PER_DAY * 365) {
        let modified = now() + Duration::from_secs(ahead_secs);
        prop_assert_eq!(age_in_days(now(), modified), 0);
    }

    #[test]
    fn extension_lookup_ignores_case_and_directories(
        dir in "[a-zA-Z0-9_]{1,12}(\\.[a-z]{1,4})?",
        stem in "[a-zA-Z0-9_ -]{1,16}",
        upper in any::<bool>(),
    ) {
        let selection = CategoryCatalog::builtin().select(&["documents"]).unwrap();
        let ext = if upper { "PDF" } else { "pdf" };
        let path = Utf8PathBuf::from(format!("/home/{}/{}.{}", dir, stem, ext));
        let classified = selection.classify(&path);
        prop_assert_eq!(classified.as_deref(), Some("documents"));

        let unmatched = Utf8PathBuf::from(format!("/home/{}/{}.exe", dir, stem));
        prop_assert_eq!(selection.classify(&unmatched), None);
    }
}
