//! Zumiez listing pages: `li.ProductCard` grid with dedicated price
//! sub-elements.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{
    deck_discount_ok, img_alt, name_has_any, resolve_url, select_text, Store, WHEEL_BRANDS,
};
use crate::models::{Category, ProductRecord};

pub(super) fn parse(html: &str, category: Category) -> Vec<ProductRecord> {
    let doc = Html::parse_document(html);
    let card_sel = Selector::parse("li.ProductCard").unwrap();
    let link_sel = Selector::parse("a.ProductCard-Link").unwrap();
    let name_sel = Selector::parse(".ProductCard-Name").unwrap();
    let sale_sel = Selector::parse(".ProductPrice-PriceValue").unwrap();
    let compare_sel = Selector::parse(".ProductCardPrice-HighPrice").unwrap();

    let cards: Vec<_> = doc.select(&card_sel).collect();
    debug!("found {} product containers", cards.len());

    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for card in cards {
        let Some(link) = card.select(&link_sel).next() else {
            warn!("no link found for product card");
            continue;
        };
        let href = link.value().attr("href").unwrap_or("");
        let url = resolve_url(Store::Zumiez.base_url(), href);
        if !seen.insert(url.clone()) {
            debug!("duplicate URL skipped: {url}");
            continue;
        }

        // Name element first, image alt text as fallback.
        let Some(name) = select_text(card, &name_sel).or_else(|| img_alt(link)) else {
            warn!("no name found for {url}");
            continue;
        };

        if category == Category::Wheels && !name_has_any(&name, WHEEL_BRANDS) {
            debug!("skipping wheels outside brand list: {name}");
            continue;
        }

        let sale_price = select_text(card, &sale_sel).map(|t| t.replace('$', ""));
        let original_price = select_text(card, &compare_sel).map(|t| t.replace('$', ""));
        let Some(price_new) = sale_price.filter(|p| !p.is_empty()) else {
            warn!("no sale price found for {url}");
            continue;
        };

        if category == Category::Decks
            && !deck_discount_ok(&name, &price_new, original_price.as_deref())
        {
            continue;
        }

        debug!("parsed product: {name}");
        products.push(ProductRecord::new(
            name,
            url,
            price_new,
            original_price,
            category,
            Store::Zumiez.name(),
        ));
    }

    products
}
