//! Product records and the persisted snapshot shape.
//!
//! A snapshot maps a `"{store}_{category}"` partition key to the products
//! seen on that listing page, in discovery order. The JSON field names are
//! load-bearing: the previous run's file must round-trip exactly for the
//! diff to be meaningful.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tracked hardware categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Decks,
    Wheels,
    Trucks,
    Bearings,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decks => "Decks",
            Self::Wheels => "Wheels",
            Self::Trucks => "Trucks",
            Self::Bearings => "Bearings",
        }
    }

    /// Parse the persisted `part` string. Old snapshot files may carry
    /// values outside the tracked set; those return `None`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Decks" => Some(Self::Decks),
            "Wheels" => Some(Self::Wheels),
            "Trucks" => Some(Self::Trucks),
            "Bearings" => Some(Self::Bearings),
            _ => None,
        }
    }

    pub const ALL: [Category; 4] = [
        Category::Decks,
        Category::Wheels,
        Category::Trucks,
        Category::Bearings,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product found on a listing page.
///
/// Identity is the absolute `url`. Prices are kept as the scraped strings;
/// price comparison across runs is literal, not numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub url: String,
    pub price_new: String,
    pub price_old: Option<String>,
    pub availability: String,
    /// Category string; kept as text so unknown values in old snapshot
    /// files survive a round-trip.
    pub part: String,
    pub store: String,
}

/// Listing pages never expose live stock state.
pub const AVAILABILITY_PLACEHOLDER: &str = "Check store";

impl ProductRecord {
    pub fn new(
        name: String,
        url: String,
        price_new: String,
        price_old: Option<String>,
        category: Category,
        store: &str,
    ) -> Self {
        Self {
            name,
            url,
            price_new,
            price_old,
            availability: AVAILABILITY_PLACEHOLDER.to_string(),
            part: category.as_str().to_string(),
            store: store.to_string(),
        }
    }
}

/// Full product state from one run, keyed by `"{store}_{category}"`.
pub type Snapshot = BTreeMap<String, Vec<ProductRecord>>;

/// Percent off, rounded to the nearest integer.
///
/// Returns `None` when either price is missing or unparseable, or when the
/// original price is non-positive.
pub fn discount_percent(price_new: &str, price_old: Option<&str>) -> Option<i64> {
    let new: f64 = price_new.trim().parse().ok()?;
    let old: f64 = price_old?.trim().parse().ok()?;
    if old <= 0.0 {
        return None;
    }
    Some((((old - new) / old) * 100.0).round() as i64)
}
