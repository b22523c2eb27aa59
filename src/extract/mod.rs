//! Per-source extraction of product records from rendered markup.
//!
//! Each storefront gets one variant that differs only in container
//! selectors, base origin, and which sub-elements carry the sale and
//! compare prices. The filtering rules (URL dedup, brand allow-lists,
//! the deck discount gate, price pattern matching) are shared here.
//!
//! Extraction never fails as a whole: a malformed candidate is logged
//! and skipped, and the remaining items are still processed.

mod ccs;
mod skate_warehouse;
mod tactics;
mod zumiez;

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, info};
use url::Url;

use crate::models::{discount_percent, Category, ProductRecord};

/// Monitored storefronts. Dispatch is an explicit table, one parse
/// function per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Zumiez,
    SkateWarehouse,
    Ccs,
    Tactics,
}

impl Store {
    /// Display/persistence name; also the first half of the partition key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zumiez => "Zumiez",
            Self::SkateWarehouse => "SkateWarehouse",
            Self::Ccs => "CCS",
            Self::Tactics => "Tactics",
        }
    }

    /// Origin used to absolutize relative product links.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Zumiez => "https://www.zumiez.com",
            Self::SkateWarehouse => "https://www.skatewarehouse.com",
            Self::Ccs => "https://shop.ccs.com",
            Self::Tactics => "https://www.tactics.com",
        }
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse one listing page into canonical product records.
pub fn parse(store: Store, html: &str, category: Category) -> Vec<ProductRecord> {
    let records = match store {
        Store::Zumiez => zumiez::parse(html, category),
        Store::SkateWarehouse => skate_warehouse::parse(html, category),
        Store::Ccs => ccs::parse(html, category),
        Store::Tactics => tactics::parse(html, category),
    };
    info!("parsed {} {} products from {}", records.len(), category, store);
    records
}

/// Wheel brands worth tracking; applies to every store's Wheels listing.
pub(crate) const WHEEL_BRANDS: &[&str] = &["Bones", "Powell", "Spitfire", "OJ"];

pub(crate) fn name_has_any(name: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| name.contains(t))
}

/// Decks only surface at a rounded discount of 10% or more; a missing or
/// unparseable original price excludes the item.
pub(crate) fn deck_discount_ok(name: &str, price_new: &str, price_old: Option<&str>) -> bool {
    match discount_percent(price_new, price_old) {
        Some(pct) if pct >= 10 => {
            debug!("deck {name}: {pct}% off");
            true
        }
        Some(pct) => {
            debug!("skipping deck under 10% off: {name} ({pct}%)");
            false
        }
        None => {
            debug!("skipping deck with unknown discount: {name}");
            false
        }
    }
}

/// Make a product link absolute against the store origin.
pub(crate) fn resolve_url(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(origin).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{origin}{href}"),
    }
}

/// Visible text of an element with whitespace collapsed.
pub(crate) fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapsed text of the first matching sub-element, `None` if absent or
/// empty.
pub(crate) fn select_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    let text = element_text(scope.select(selector).next()?);
    (!text.is_empty()).then_some(text)
}

/// Alt text of the first `img[alt]` under `scope`.
pub(crate) fn img_alt(scope: ElementRef) -> Option<String> {
    static IMG: OnceLock<Selector> = OnceLock::new();
    let selector = IMG.get_or_init(|| Selector::parse("img[alt]").unwrap());
    scope
        .select(selector)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(String::from)
}

/// A non-empty, trimmed attribute value.
pub(crate) fn attr_text(el: ElementRef, attr: &str) -> Option<String> {
    el.value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn price_cents_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+\.\d{2})").unwrap())
}

fn price_dollar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+\.?\d*)").unwrap())
}

fn price_any_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?(\d+\.?\d*)").unwrap())
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%").unwrap())
}

/// All `$NN.NN` amounts in document order.
pub(crate) fn dollar_cents_prices(text: &str) -> Vec<String> {
    price_cents_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// All `$N`, `$N.`, `$N.NN` amounts in document order.
pub(crate) fn dollar_prices(text: &str) -> Vec<String> {
    price_dollar_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// First numeric amount, dollar sign optional.
pub(crate) fn first_amount(text: &str) -> Option<String> {
    price_any_re()
        .captures(text)
        .map(|c| c[1].to_string())
        .filter(|amount| !amount.is_empty())
}

/// First `NN%` figure in a promo blurb.
pub(crate) fn promo_percent(text: &str) -> Option<u32> {
    percent_re()
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}
