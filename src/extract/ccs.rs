//! CCS listing pages: Shopify-style `.product-item` cards with a fallback
//! to bare product links. The grid mixes apparel into hardware collections,
//! so a keyword exclusion runs before the category check.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{
    attr_text, deck_discount_ok, dollar_prices, first_amount, img_alt, name_has_any, resolve_url,
    select_text, Store, WHEEL_BRANDS,
};
use crate::models::{Category, ProductRecord};

/// Apparel and accessory terms that disqualify a candidate outright.
const NON_SKATE_KEYWORDS: &[&str] = &[
    "hat", "cap", "shirt", "tee", "hoodie", "jacket", "pant", "short", "shoe", "sneaker", "sock",
    "backpack", "bag", "beanie", "glove",
];

/// The requested category must be named in the product name or URL.
fn matches_category(category: Category, name_lower: &str, href_lower: &str) -> bool {
    match category {
        Category::Decks => name_lower.contains("deck") || href_lower.contains("deck"),
        Category::Wheels => name_lower.contains("wheel") || href_lower.contains("wheel"),
        // "Trucker" hats survive the keyword exclusion when named
        // creatively, so the name check rejects them explicitly.
        Category::Trucks => {
            (name_lower.contains("truck") && !name_lower.contains("trucker"))
                || href_lower.contains("truck")
        }
        Category::Bearings => name_lower.contains("bearing") || href_lower.contains("bearing"),
    }
}

pub(super) fn parse(html: &str, category: Category) -> Vec<ProductRecord> {
    let doc = Html::parse_document(html);
    let container_sel = Selector::parse(".product-item, [class*='product-item']").unwrap();
    let product_link_sel = Selector::parse("a[href*='/products/']").unwrap();
    let title_sel = Selector::parse(".product-item__title").unwrap();
    let current_sel = Selector::parse(".product-item__price-current").unwrap();
    let compare_sel = Selector::parse(".product-item__price-compare").unwrap();
    let any_price_sel = Selector::parse(".product-item__price").unwrap();

    let mut containers: Vec<ElementRef> = doc.select(&container_sel).collect();
    debug!("found {} product containers", containers.len());
    if containers.is_empty() {
        containers = doc.select(&product_link_sel).collect();
        debug!("fallback: found {} product links", containers.len());
    }

    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for container in containers {
        let link = if container.value().name() == "a" {
            Some(container)
        } else {
            container.select(&product_link_sel).next()
        };
        let Some(link) = link else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or("");
        if href.is_empty() {
            continue;
        }
        let url = resolve_url(Store::Ccs.base_url(), href);
        if !seen.insert(url.clone()) {
            continue;
        }

        let Some(name) = select_text(container, &title_sel)
            .or_else(|| img_alt(container))
            .or_else(|| attr_text(link, "title"))
            .or_else(|| attr_text(link, "aria-label"))
        else {
            continue;
        };

        let name_lower = name.to_lowercase();
        let href_lower = url.to_lowercase();

        if NON_SKATE_KEYWORDS.iter().any(|k| name_lower.contains(k)) {
            debug!("skipping non-skate product: {name}");
            continue;
        }
        if !matches_category(category, &name_lower, &href_lower) {
            continue;
        }

        let mut price_new = select_text(container, &current_sel).and_then(|t| first_amount(&t));
        let mut price_old = select_text(container, &compare_sel).and_then(|t| first_amount(&t));

        // Some card layouts only render a combined price block; first
        // amount is the sale price, second the compare price.
        if price_new.is_none() {
            if let Some(text) = select_text(container, &any_price_sel) {
                let amounts = dollar_prices(&text);
                price_new = amounts.first().cloned();
                if amounts.len() > 1 {
                    price_old = Some(amounts[1].clone());
                }
            }
        }
        let Some(price_new) = price_new else {
            continue;
        };

        if category == Category::Decks
            && !deck_discount_ok(&name, &price_new, price_old.as_deref())
        {
            continue;
        }
        if category == Category::Wheels && !name_has_any(&name, WHEEL_BRANDS) {
            continue;
        }

        debug!("parsed product: {name}");
        products.push(ProductRecord::new(
            name,
            url,
            price_new,
            price_old,
            category,
            Store::Ccs.name(),
        ));
    }

    products
}
