//! Tactics listing pages. Grid classes vary across page templates, so the
//! container selector is a union of every known layout. Original prices are
//! usually not printed; when a promo bug advertises a percentage off, the
//! original is reconstructed from the sale price.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::debug;

use super::{
    deck_discount_ok, dollar_prices, element_text, img_alt, name_has_any, promo_percent,
    resolve_url, select_text, Store, WHEEL_BRANDS,
};
use crate::models::{Category, ProductRecord};

pub(super) fn parse(html: &str, category: Category) -> Vec<ProductRecord> {
    let doc = Html::parse_document(html);
    let container_sel = Selector::parse(
        ".browse-grid-item, .product-thumb, .product-card, article.product, [data-product]",
    )
    .unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let name_sel = Selector::parse(
        ".browse-grid-item-brand, .product-thumb__title, [class*='brand']",
    )
    .unwrap();
    let price_sel =
        Selector::parse(".browse-grid-item-price, .sale-price, [class*='price']").unwrap();
    let promo_sel =
        Selector::parse(".browse-grid-item-promo-bug, .discount, [class*='promo']").unwrap();

    let containers: Vec<_> = doc.select(&container_sel).collect();
    debug!("found {} product containers", containers.len());

    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for container in containers {
        let link = container.select(&anchor_sel).next().or_else(|| {
            (container.value().name() == "a").then_some(container)
        });
        let Some(link) = link else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or("");
        if href.is_empty() {
            continue;
        }
        let url = resolve_url(Store::Tactics.base_url(), href);
        if !seen.insert(url.clone()) {
            debug!("duplicate URL skipped: {url}");
            continue;
        }

        // The product image alt carries the full name; the brand element
        // only gives a partial label.
        let Some(name) = img_alt(container).or_else(|| select_text(container, &name_sel)) else {
            continue;
        };

        let mut price_new = select_text(container, &price_sel)
            .and_then(|t| dollar_prices(&t).first().cloned());
        let mut price_old = None;

        if let Some(new) = &price_new {
            if let Some(promo) = select_text(container, &promo_sel) {
                if let Some(pct) = promo_percent(&promo).filter(|p| *p < 100) {
                    if let Ok(new_val) = new.parse::<f64>() {
                        let original = new_val / (1.0 - f64::from(pct) / 100.0);
                        price_old = Some(format!("{original:.2}"));
                    }
                }
            }
        }

        // No dedicated price element: fish amounts out of the whole card.
        if price_new.is_none() {
            let amounts = dollar_prices(&element_text(container));
            price_new = amounts.first().cloned();
            if amounts.len() > 1 {
                price_old = Some(amounts[1].clone());
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
            debug!("skipping wheels outside brand list: {name}");
            continue;
        }

        debug!("parsed product: {name}");
        products.push(ProductRecord::new(
            name,
            url,
            price_new,
            price_old,
            category,
            Store::Tactics.name(),
        ));
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, alt: &str, price: &str, promo: Option<&str>) -> String {
        let promo = promo
            .map(|p| format!(r#"<span class="browse-grid-item-promo-bug">{p}</span>"#))
            .unwrap_or_default();
        format!(
            r#"<div class="browse-grid-item">
                 <a href="{href}"><img alt="{alt}"></a>
                 <span class="browse-grid-item-price">{price}</span>
                 {promo}
               </div>"#
        )
    }

    fn page(items: &[String]) -> String {
        format!("<html><body>{}</body></html>", items.join("\n"))
    }

    #[test]
    fn test_parses_grid_item_with_alt_name() {
        let html = page(&[item(
            "/bones-reds-bearings",
            "Bones Reds Bearings",
            "$19.99",
            None,
        )]);
        let products = parse(&html, Category::Bearings);
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name, "Bones Reds Bearings");
        assert_eq!(p.url, "https://www.tactics.com/bones-reds-bearings");
        assert_eq!(p.price_new, "19.99");
        assert_eq!(p.price_old, None);
        assert_eq!(p.store, "Tactics");
    }

    #[test]
    fn test_promo_percentage_reconstructs_original_price() {
        let html = page(&[item(
            "/spitfire-f4-wheels",
            "Spitfire Formula Four Wheels",
            "$35.00",
            Some("30% off"),
        )]);
        let products = parse(&html, Category::Wheels);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price_new, "35.00");
        assert_eq!(products[0].price_old.as_deref(), Some("50.00"));
    }

    #[test]
    fn test_hundred_percent_promo_leaves_original_unset() {
        let html = page(&[item(
            "/oj-wheels",
            "OJ Super Juice Wheels",
            "$24.99",
            Some("100% satisfaction"),
        )]);
        let products = parse(&html, Category::Wheels);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price_old, None);
    }

    #[test]
    fn test_prices_fished_from_card_text_when_no_price_element() {
        let html = r#"<html><body>
            <div class="product-thumb">
              <a href="/real-deck"><img alt="Real Ishod Deck"></a>
              <div>Now $40.00 was $80.00</div>
            </div>
        </body></html>"#;
        let products = parse(html, Category::Decks);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price_new, "40.00");
        assert_eq!(products[0].price_old.as_deref(), Some("80.00"));
    }

    #[test]
    fn test_deck_discount_gate_uses_reconstructed_price() {
        // 5% promo rounds below the 10% floor.
        let html = page(&[item("/deck-thin", "Baker Deck", "$76.00", Some("5% off"))]);
        assert!(parse(&html, Category::Decks).is_empty());

        let html = page(&[item("/deck-good", "Real Deck", "$40.00", Some("50% off"))]);
        assert_eq!(parse(&html, Category::Decks).len(), 1);
    }

    #[test]
    fn test_wheels_brand_filter_applies() {
        let html = page(&[item("/ricta-wheels", "Ricta Clouds Wheels", "$31.95", None)]);
        assert!(parse(&html, Category::Wheels).is_empty());
    }

    #[test]
    fn test_duplicate_items_collapse() {
        let one = item("/powell-wheels", "Powell Dragon Wheels", "$29.95", None);
        let html = page(&[one.clone(), one]);
        assert_eq!(parse(&html, Category::Wheels).len(), 1);
    }

    #[test]
    fn test_item_without_price_is_skipped() {
        let html = r#"<html><body>
            <div class="browse-grid-item">
              <a href="/mystery"><img alt="Mystery Deck"></a>
            </div>
        </body></html>"#;
        assert!(parse(html, Category::Decks).is_empty());
    }
}
