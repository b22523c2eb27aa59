//! Change events produced by comparing two snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ProductRecord;

/// A classified difference between the previous and current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Product URL not present in the previous run.
    New { item: ProductRecord },
    /// Same URL, different `price_new`. Comparison is literal string
    /// equality, so a reformatted price counts as a change.
    #[serde(rename = "price_change")]
    PriceChanged {
        url: String,
        name: String,
        old: String,
        new: String,
    },
    /// Product URL no longer listed. Only emitted for tracked categories.
    Removed { item: ProductRecord },
}

/// Change events grouped by partition key; keys with no events are omitted.
pub type ChangeMap = BTreeMap<String, Vec<ChangeEvent>>;
