//! Property tests for the reconciliation pass.

use ctlsync_reconcile::{reconcile, CapabilityKey, MappingRow, MasterLookup, TagSet};
use proptest::prelude::*;
use std::collections::HashMap;

/// Capability names drawn from a small alphabet so keys collide often,
/// decorated with the whitespace and trailing colon normalization strips.
fn capability_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[A-D]{1,2}").expect("Invalid regex"),
        prop::bool::ANY,
        prop::bool::ANY,
    )
        .prop_map(|(name, colon, pad)| {
            let mut raw = name;
            if colon {
                raw.push(':');
            }
            if pad {
                raw = format!("  {raw} ");
            }
            raw
        })
}

fn tag_cell_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[A-C]{2}-[1-4]").expect("Invalid regex"),
        0..5,
    )
    .prop_map(|tags| tags.join("\n"))
}

fn rows_strategy(max: usize) -> impl Strategy<Value = Vec<MappingRow>> {
    prop::collection::vec(
        (capability_strategy(), tag_cell_strategy())
            .prop_map(|(cap, tags)| MappingRow::new(cap, tags)),
        0..max,
    )
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

    #[test]
    fn reconcile_is_idempotent(master in rows_strategy(12), target in rows_strategy(12)) {
        let first = reconcile(&master, &target);
        let second = reconcile(&master, &first.rows);

        prop_assert!(second.stats.is_noop());
        prop_assert_eq!(second.stats.tags_added, 0);
        prop_assert_eq!(second.rows, first.rows);
    }

    #[test]
    fn reconcile_only_adds(master in rows_strategy(12), target in rows_strategy(12)) {
        let result = reconcile(&master, &target);

        prop_assert_eq!(result.rows.len(), target.len());
        for (before, after) in target.iter().zip(&result.rows) {
            prop_assert_eq!(&before.capability, &after.capability);
            prop_assert!(after.tag_set().is_superset(&before.tag_set()));
        }

        let added: usize = result.stats.changes.iter().map(|c| c.added.len()).sum();
        prop_assert_eq!(added, result.stats.tags_added);
        prop_assert_eq!(result.stats.changes.len(), result.stats.rows_updated);
    }

    #[test]
    fn unchanged_rows_are_identical(master in rows_strategy(12), target in rows_strategy(12)) {
        let result = reconcile(&master, &target);
        let changed: Vec<usize> = result.stats.changes.iter().map(|c| c.index).collect();

        for (index, (before, after)) in target.iter().zip(&result.rows).enumerate() {
            if !changed.contains(&index) {
                prop_assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn unmatched_keys_are_distinct_and_absent_from_master(
        master in rows_strategy(6),
        target in rows_strategy(16),
    ) {
        let lookup = MasterLookup::build(&master);
        let result = lookup.reconcile(&target);

        let mut seen = std::collections::HashSet::new();
        for key in &result.stats.unmatched {
            prop_assert!(seen.insert(key.clone()), "duplicate unmatched key {}", key);
            let normalized = CapabilityKey::normalize(key).expect("unmatched keys are never blank");
            prop_assert!(lookup.get(&normalized).is_none());
        }
    }

    #[test]
    fn master_lookup_unions_every_row(master in rows_strategy(16)) {
        let lookup = MasterLookup::build(&master);

        let mut expected: HashMap<CapabilityKey, TagSet> = HashMap::new();
        for row in &master {
            if let Some(key) = row.key() {
                expected.entry(key).or_default().union_with(&row.tag_set());
            }
        }

        prop_assert_eq!(lookup.len(), expected.len());
        for (key, tags) in &expected {
            prop_assert_eq!(lookup.get(key), Some(tags));
        }
    }
}
