//! The monitored sale listings: four stores, four hardware categories each.

use crate::extract::Store;
use crate::models::Category;

/// One sale listing page to track.
#[derive(Debug, Clone, Copy)]
pub struct SourceConfig {
    pub store: Store,
    pub category: Category,
    pub url: &'static str,
}

impl SourceConfig {
    const fn new(store: Store, category: Category, url: &'static str) -> Self {
        Self {
            store,
            category,
            url,
        }
    }

    /// Snapshot key for this listing, `{store}_{category}`.
    pub fn partition_key(&self) -> String {
        format!("{}_{}", self.store.name(), self.category.as_str())
    }
}

/// Every listing the tracker watches, in run order.
pub fn configured() -> &'static [SourceConfig] {
    use Category::*;
    use Store::*;

    const SOURCES: &[SourceConfig] = &[
        SourceConfig::new(Zumiez, Decks, "https://www.zumiez.com/skate/skateboard-decks.html?customFilters=promotion_flag:Sale"),
        SourceConfig::new(Zumiez, Wheels, "https://www.zumiez.com/skate/skateboard-wheels.html?customFilters=promotion_flag:Sale"),
        SourceConfig::new(Zumiez, Trucks, "https://www.zumiez.com/skate/skateboard-trucks.html?customFilters=promotion_flag:Sale"),
        SourceConfig::new(Zumiez, Bearings, "https://www.zumiez.com/skate/skateboard-bearings.html?customFilters=promotion_flag:Sale"),

        SourceConfig::new(SkateWarehouse, Decks, "https://www.skatewarehouse.com/Clearance_Skateboard_Decks/catpage-SALEDECK.html"),
        SourceConfig::new(SkateWarehouse, Wheels, "https://www.skatewarehouse.com/Clearance_Skateboard_Wheels/catpage-SALEWHEELS.html"),
        SourceConfig::new(SkateWarehouse, Trucks, "https://www.skatewarehouse.com/Clearance_Skateboard_Trucks/catpage-SALETRUCKS.html"),
        SourceConfig::new(SkateWarehouse, Bearings, "https://www.skatewarehouse.com/Clearance_Skateboard_Bearings/catpage-SALEBEARINGS.html"),

        SourceConfig::new(Ccs, Decks, "https://shop.ccs.com/collections/clearance/skateboard-deck"),
        SourceConfig::new(Ccs, Wheels, "https://shop.ccs.com/collections/clearance/skateboard-wheels"),
        SourceConfig::new(Ccs, Trucks, "https://shop.ccs.com/collections/clearance/skateboard-trucks"),
        SourceConfig::new(Ccs, Bearings, "https://shop.ccs.com/collections/clearance/bearings"),

        SourceConfig::new(Tactics, Decks, "https://www.tactics.com/skateboard-decks/sale"),
        SourceConfig::new(Tactics, Wheels, "https://www.tactics.com/skateboard-wheels/sale"),
        SourceConfig::new(Tactics, Trucks, "https://www.tactics.com/skateboard-trucks/sale"),
        SourceConfig::new(Tactics, Bearings, "https://www.tactics.com/skateboard-bearings/sale"),
    ];
    SOURCES
}
