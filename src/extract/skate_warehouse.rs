//! SkateWarehouse listing pages carry no stable grid classes, so this
//! variant scans product anchors and parses name and prices out of the
//! anchor text itself.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{
    deck_discount_ok, dollar_cents_prices, element_text, name_has_any, resolve_url, Store,
    WHEEL_BRANDS,
};
use crate::models::{Category, ProductRecord};

/// Truck brands worth tracking on this store.
const TRUCK_BRANDS: &[&str] = &["Independent", "Indy", "Ace"];

/// An anchor is only a product candidate when its href mentions a hardware
/// type or a known brand.
const HREF_PART_TOKENS: &[&str] = &["wheels", "truck", "bearings", "deck"];
const HREF_BRAND_TOKENS: &[&str] = &["bones", "spitfire", "independent", "bronson"];

fn category_token(category: Category) -> &'static str {
    match category {
        Category::Decks => "Deck",
        Category::Wheels => "Wheels",
        Category::Trucks => "Truck",
        Category::Bearings => "Bearings",
    }
}

pub(super) fn parse(html: &str, category: Category) -> Vec<ProductRecord> {
    let doc = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for anchor in doc.select(&anchor_sel) {
        let text = element_text(anchor);
        let href = anchor.value().attr("href").unwrap_or("");
        let href_lower = href.to_lowercase();

        if !HREF_PART_TOKENS.iter().any(|t| href_lower.contains(t))
            && !HREF_BRAND_TOKENS.iter().any(|t| href_lower.contains(t))
        {
            continue;
        }
        if !text.contains(category_token(category)) {
            continue;
        }

        let url = resolve_url(Store::SkateWarehouse.base_url(), href);
        if seen.contains(&url) {
            debug!("duplicate URL skipped: {url}");
            continue;
        }

        let prices = dollar_cents_prices(&text);
        let Some(price_new) = prices.first().cloned() else {
            continue;
        };

        // The anchor text runs name and prices together; the name is
        // whatever precedes the first price.
        let name = text
            .split(&format!("${price_new}"))
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() {
            warn!("no name found for {url}");
            continue;
        }

        if category == Category::Wheels && !name_has_any(&name, WHEEL_BRANDS) {
            debug!("skipping wheels outside brand list: {name}");
            continue;
        }
        if category == Category::Trucks && !name_has_any(&name, TRUCK_BRANDS) {
            debug!("skipping trucks outside brand list: {name}");
            continue;
        }

        let price_old = prices.get(1).cloned();
        if category == Category::Decks
            && !deck_discount_ok(&name, &price_new, price_old.as_deref())
        {
            continue;
        }

        seen.insert(url.clone());
        debug!("parsed product: {name}");
        products.push(ProductRecord::new(
            name,
            url,
            price_new,
            price_old,
            category,
            Store::SkateWarehouse.name(),
        ));
    }

    products
}
