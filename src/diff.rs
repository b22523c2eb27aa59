//! Change detection between the previous and current snapshot.
//!
//! Diffing is keyed by the partitions present in the *current* snapshot:
//! a partition whose fetch failed outright is simply absent and produces
//! no events, so its previous items are neither new nor removed until the
//! source recovers.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{Category, ChangeEvent, ChangeMap, Snapshot};

/// Compare two snapshots and classify the differences per partition.
///
/// Price comparison is exact string equality on `price_new`. Removed events
/// are only emitted when the stored `part` is a tracked category; anything
/// else is dropped silently (stale entries from older configurations).
pub fn compare(previous: &Snapshot, current: &Snapshot) -> ChangeMap {
    let mut changes = ChangeMap::new();

    for (key, items) in current {
        let prev_items = previous.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let prev_by_url: HashMap<&str, &crate::models::ProductRecord> =
            prev_items.iter().map(|i| (i.url.as_str(), i)).collect();

        let mut diffs = Vec::new();
        for item in items {
            match prev_by_url.get(item.url.as_str()) {
                None => diffs.push(ChangeEvent::New { item: item.clone() }),
                Some(prev) if prev.price_new != item.price_new => {
                    diffs.push(ChangeEvent::PriceChanged {
                        url: item.url.clone(),
                        name: item.name.clone(),
                        old: prev.price_new.clone(),
                        new: item.price_new.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        let current_urls: HashSet<&str> = items.iter().map(|i| i.url.as_str()).collect();
        for prev in prev_items {
            if current_urls.contains(prev.url.as_str()) {
                continue;
            }
            if Category::from_str(&prev.part).is_some() {
                diffs.push(ChangeEvent::Removed { item: prev.clone() });
            } else {
                debug!(
                    "skipping out-of-scope removed item: {} (part: {})",
                    prev.name, prev.part
                );
            }
        }

        if !diffs.is_empty() {
            changes.insert(key.clone(), diffs);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductRecord;

    fn deck(url: &str, price_new: &str, price_old: &str) -> ProductRecord {
        ProductRecord::new(
            format!("Deck {url}"),
            url.to_string(),
            price_new.to_string(),
            Some(price_old.to_string()),
            Category::Decks,
            "StoreA",
        )
    }

    fn snapshot_with(key: &str, items: Vec<ProductRecord>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(key.to_string(), items);
        snapshot
    }

    #[test]
    fn test_identical_snapshots_yield_no_changes() {
        let snapshot = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.00", "80.00")]);
        assert!(compare(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_price_change_carries_verbatim_values() {
        let previous = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.00", "80.00")]);
        let current = snapshot_with("StoreA_Decks", vec![deck("/d1", "35.00", "80.00")]);

        let changes = compare(&previous, &current);
        assert_eq!(changes.len(), 1);
        let events = &changes["StoreA_Decks"];
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChangeEvent::PriceChanged { url, old, new, .. } => {
                assert_eq!(url, "/d1");
                assert_eq!(old, "40.00");
                assert_eq!(new, "35.00");
            }
            other => panic!("expected PriceChanged, got {other:?}"),
        }
    }

    #[test]
    fn test_string_comparison_flags_reformatted_price() {
        let previous = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.00", "80.00")]);
        let current = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.0", "80.00")]);

        let changes = compare(&previous, &current);
        assert_eq!(changes["StoreA_Decks"].len(), 1);
        assert!(matches!(
            changes["StoreA_Decks"][0],
            ChangeEvent::PriceChanged { .. }
        ));
    }

    #[test]
    fn test_new_item_yields_exactly_one_new_event() {
        let previous = snapshot_with("StoreA_Decks", vec![]);
        let current = snapshot_with("StoreA_Decks", vec![deck("/d2", "22.00", "44.00")]);

        let changes = compare(&previous, &current);
        let events = &changes["StoreA_Decks"];
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChangeEvent::New { item } => assert_eq!(item.url, "/d2"),
            other => panic!("expected New, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_item_with_tracked_category_is_removed() {
        let previous = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.00", "80.00")]);
        let current = snapshot_with("StoreA_Decks", vec![]);

        let changes = compare(&previous, &current);
        let events = &changes["StoreA_Decks"];
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChangeEvent::Removed { item } => assert_eq!(item.url, "/d1"),
            other => panic!("expected Removed, got {other:?}"),
        }
    }

    #[test]
    fn test_untracked_part_never_yields_removed() {
        let mut stale = deck("/t1", "9.99", "19.99");
        stale.part = "Apparel".to_string();
        let previous = snapshot_with("StoreA_Decks", vec![stale]);
        let current = snapshot_with("StoreA_Decks", vec![]);

        assert!(compare(&previous, &current).is_empty());
    }

    #[test]
    fn test_partition_only_in_previous_emits_nothing() {
        let previous = snapshot_with("StoreA_Decks", vec![deck("/d1", "40.00", "80.00")]);
        let current = Snapshot::new();

        assert!(compare(&previous, &current).is_empty());
    }

    #[test]
    fn test_partitions_with_no_events_are_omitted() {
        let unchanged = deck("/d1", "40.00", "80.00");
        let mut previous = snapshot_with("StoreA_Decks", vec![unchanged.clone()]);
        previous.insert("StoreB_Wheels".to_string(), vec![]);
        let mut current = snapshot_with("StoreA_Decks", vec![unchanged]);
        current.insert(
            "StoreB_Wheels".to_string(),
            vec![ProductRecord::new(
                "OJ Super Juice".into(),
                "/w1".into(),
                "24.95".into(),
                None,
                Category::Wheels,
                "StoreB",
            )],
        );

        let changes = compare(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key("StoreB_Wheels"));
    }

    #[test]
    fn test_mixed_changes_in_one_partition() {
        let previous = snapshot_with(
            "StoreA_Decks",
            vec![deck("/keep", "40.00", "80.00"), deck("/gone", "30.00", "60.00")],
        );
        let current = snapshot_with(
            "StoreA_Decks",
            vec![deck("/keep", "35.00", "80.00"), deck("/fresh", "20.00", "40.00")],
        );

        let events = &compare(&previous, &current)["StoreA_Decks"];
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ChangeEvent::PriceChanged { url, .. } if url == "/keep"));
        assert!(matches!(&events[1], ChangeEvent::New { item } if item.url == "/fresh"));
        assert!(matches!(&events[2], ChangeEvent::Removed { item } if item.url == "/gone"));
    }
}
