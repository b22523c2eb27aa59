//! Static HTML report rendering.
//!
//! One self-contained page: summary cards, a filterable/sortable deals
//! table, and a table of the changes found on this run. No templating
//! dependency, the page is assembled by string concatenation and the
//! interactivity is a small inline script.

use chrono::Local;

use crate::models::{discount_percent, ChangeEvent, ChangeMap, ProductRecord, Snapshot};
use crate::utils::html::html_escape;

const STORES: &[&str] = &["Zumiez", "SkateWarehouse", "CCS", "Tactics"];
const PARTS: &[&str] = &["Decks", "Wheels", "Trucks", "Bearings"];

fn percent_off_label(price_new: &str, price_old: Option<&str>) -> String {
    match discount_percent(price_new, price_old) {
        Some(pct) => format!("{pct}%"),
        None => "N/A".to_string(),
    }
}

/// Badge intensity for a discount figure.
fn discount_class(price_new: &str, price_old: Option<&str>) -> &'static str {
    match discount_percent(price_new, price_old) {
        Some(pct) if pct >= 40 => "high",
        Some(pct) if pct >= 25 => "medium",
        _ => "low",
    }
}

fn price_old_display(price_old: Option<&str>) -> String {
    match price_old {
        Some(old) => format!("${}", html_escape(old)),
        None => "N/A".to_string(),
    }
}

fn product_row(item: &ProductRecord) -> String {
    format!(
        r#"<tr data-store="{store}" data-part="{part}">
<td><span class="store-badge">{store}</span></td>
<td><span class="part-badge">{part}</span></td>
<td class="product-name"><a href="{url}" target="_blank" rel="noopener">{name}</a></td>
<td class="price price-new">${price_new}</td>
<td class="price price-old">{price_old}</td>
<td><span class="discount {class}">{percent}</span></td>
</tr>
"#,
        store = html_escape(&item.store),
        part = html_escape(&item.part),
        url = html_escape(&item.url),
        name = html_escape(&item.name),
        price_new = html_escape(&item.price_new),
        price_old = price_old_display(item.price_old.as_deref()),
        class = discount_class(&item.price_new, item.price_old.as_deref()),
        percent = percent_off_label(&item.price_new, item.price_old.as_deref()),
    )
}

fn change_row(partition: &str, change: &ChangeEvent, date: &str) -> String {
    // The store name is the partition key up to the first underscore.
    let store = partition.split('_').next().unwrap_or(partition);
    match change {
        ChangeEvent::New { item } => format!(
            r#"<tr class="change-row new">
<td><span class="discount high">New</span></td>
<td>{store}</td>
<td class="product-name"><a href="{url}" target="_blank" rel="noopener">{name}</a></td>
<td class="price price-new">${price_new}</td>
<td class="price price-old">{price_old}</td>
<td><span class="discount {class}">{percent}</span></td>
<td>{date}</td>
</tr>
"#,
            store = html_escape(&item.store),
            url = html_escape(&item.url),
            name = html_escape(&item.name),
            price_new = html_escape(&item.price_new),
            price_old = price_old_display(item.price_old.as_deref()),
            class = discount_class(&item.price_new, item.price_old.as_deref()),
            percent = percent_off_label(&item.price_new, item.price_old.as_deref()),
        ),
        ChangeEvent::PriceChanged {
            url,
            name,
            old,
            new,
        } => format!(
            r#"<tr class="change-row price-change">
<td><span class="discount medium">Price Drop</span></td>
<td>{store}</td>
<td class="product-name"><a href="{url}" target="_blank" rel="noopener">{name}</a></td>
<td class="price price-new">${new}</td>
<td class="price price-old">${old}</td>
<td><span class="discount {class}">{percent}</span></td>
<td>{date}</td>
</tr>
"#,
            store = html_escape(store),
            url = html_escape(url),
            name = html_escape(name),
            new = html_escape(new),
            old = html_escape(old),
            class = discount_class(new, Some(old)),
            percent = percent_off_label(new, Some(old)),
        ),
        ChangeEvent::Removed { item } => format!(
            r#"<tr class="change-row removed">
<td><span class="discount low">Removed</span></td>
<td>{store}</td>
<td class="product-name">{name}</td>
<td class="price">-</td>
<td class="price price-old">{price_old}</td>
<td>-</td>
<td>{date}</td>
</tr>
"#,
            store = html_escape(&item.store),
            name = html_escape(&item.name),
            price_old = price_old_display(item.price_old.as_deref()),
        ),
    }
}

/// Render the full report page for a snapshot and this run's changes.
pub fn render(snapshot: &Snapshot, changes: &ChangeMap) -> String {
    let now = Local::now();
    let date = now.format("%Y-%m-%d").to_string();
    let datetime = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let all_products: Vec<&ProductRecord> = snapshot.values().flatten().collect();
    let total_products = all_products.len();

    let mut page = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Skateboard Sale Tracker | {date}</title>
<style>
{CSS}
</style>
</head>
<body>
<div class="container">
<header>
<h1>Skateboard Sale Tracker</h1>
<p class="updated">Updated {datetime}</p>
</header>
<div class="stats-grid">
<div class="stat-card"><div class="number">{total_products}</div><div class="label">Total Deals</div></div>
"#
    );

    for store in STORES {
        let count = all_products.iter().filter(|p| p.store == *store).count();
        page.push_str(&format!(
            r#"<div class="stat-card"><div class="number">{count}</div><div class="label">{store}</div></div>
"#
        ));
    }
    page.push_str("</div>\n");

    page.push_str(
        r#"<div class="controls">
<input type="text" id="searchInput" placeholder="Search products..." onkeyup="filterProducts()">
<div class="filter-group" id="storeFilters">
<button class="filter-btn active" data-store="all" onclick="filterByStore('all')">All Stores</button>
"#,
    );
    for store in STORES {
        page.push_str(&format!(
            r#"<button class="filter-btn" data-store="{lower}" onclick="filterByStore('{store}')">{store}</button>
"#,
            lower = store.to_lowercase()
        ));
    }
    page.push_str(
        r#"</div>
<div class="filter-group" id="partFilters">
<button class="filter-btn active" data-part="all" onclick="filterByPart('all')">All Parts</button>
"#,
    );
    for part in PARTS {
        page.push_str(&format!(
            r#"<button class="filter-btn" data-part="{lower}" onclick="filterByPart('{part}')">{part}</button>
"#,
            lower = part.to_lowercase()
        ));
    }
    page.push_str("</div>\n</div>\n");

    page.push_str(&format!(
        r#"<div class="section">
<h2>All Deals <span class="badge">{total_products}</span></h2>
<table id="mainTable">
<thead>
<tr>
<th onclick="sortTable('mainTable', 0)">Store</th>
<th onclick="sortTable('mainTable', 1)">Part</th>
<th onclick="sortTable('mainTable', 2)">Product</th>
<th onclick="sortTable('mainTable', 3, true)">Sale Price</th>
<th onclick="sortTable('mainTable', 4, true)">Original</th>
<th onclick="sortTable('mainTable', 5, true)">Discount</th>
</tr>
</thead>
<tbody>
"#
    ));
    for item in &all_products {
        page.push_str(&product_row(item));
    }
    page.push_str("</tbody>\n</table>\n</div>\n");

    if !changes.is_empty() {
        let total_changes: usize = changes.values().map(Vec::len).sum();
        page.push_str(&format!(
            r#"<div class="section changes-section">
<h2>Recent Changes <span class="badge">{total_changes}</span></h2>
<table id="changesTable">
<thead>
<tr><th>Type</th><th>Store</th><th>Product</th><th>Sale Price</th><th>Original</th><th>Discount</th><th>Date</th></tr>
</thead>
<tbody>
"#
        ));
        for (partition, events) in changes {
            for change in events {
                page.push_str(&change_row(partition, change, &date));
            }
        }
        page.push_str("</tbody>\n</table>\n</div>\n");
    }

    page.push_str(&format!(
        r#"<footer>
<p>Data scraped from Zumiez, Skate Warehouse, CCS, and Tactics</p>
</footer>
</div>
<script>
{SCRIPT}
</script>
</body>
</html>
"#
    ));

    page
}

const CSS: &str = r#"
:root { --primary: #2563eb; --bg: #f8fafc; --text: #0f172a; --muted: #64748b; }
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: system-ui, sans-serif; background: var(--bg); color: var(--text); }
.container { max-width: 1200px; margin: 0 auto; padding: 24px; }
header { margin-bottom: 24px; }
header .updated { color: var(--muted); font-size: 14px; }
.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 12px; margin-bottom: 24px; }
.stat-card { background: #fff; border-radius: 8px; padding: 16px; box-shadow: 0 1px 3px rgba(0,0,0,0.08); }
.stat-card .number { font-size: 28px; font-weight: 700; color: var(--primary); }
.stat-card .label { color: var(--muted); font-size: 13px; }
.controls { display: flex; flex-wrap: wrap; gap: 12px; margin-bottom: 16px; }
#searchInput { flex: 1; min-width: 200px; padding: 8px 12px; border: 1px solid #cbd5e1; border-radius: 6px; }
.filter-btn { padding: 6px 12px; border: 1px solid #cbd5e1; border-radius: 6px; background: #fff; cursor: pointer; }
.filter-btn.active { background: var(--primary); color: #fff; border-color: var(--primary); }
.section { background: #fff; border-radius: 8px; padding: 16px; margin-bottom: 24px; box-shadow: 0 1px 3px rgba(0,0,0,0.08); }
.section h2 { margin-bottom: 12px; font-size: 18px; }
.badge { background: var(--primary); color: #fff; border-radius: 999px; padding: 2px 10px; font-size: 13px; }
table { width: 100%; border-collapse: collapse; }
th { text-align: left; padding: 8px; border-bottom: 2px solid #e2e8f0; cursor: pointer; user-select: none; }
td { padding: 8px; border-bottom: 1px solid #f1f5f9; }
.price-new { font-weight: 600; }
.price-old { color: var(--muted); text-decoration: line-through; }
.discount { border-radius: 4px; padding: 2px 8px; font-size: 13px; font-weight: 600; }
.discount.high { background: #dcfce7; color: #166534; }
.discount.medium { background: #fef9c3; color: #854d0e; }
.discount.low { background: #f1f5f9; color: #475569; }
.store-badge, .part-badge { background: #e2e8f0; border-radius: 4px; padding: 2px 8px; font-size: 13px; }
footer { color: var(--muted); font-size: 13px; text-align: center; }
"#;

const SCRIPT: &str = r#"
let currentStoreFilter = 'all';
let currentPartFilter = 'all';

function filterProducts() {
    const searchTerm = document.getElementById('searchInput').value.toLowerCase().trim();
    document.querySelectorAll('#mainTable tbody tr').forEach(row => {
        const text = row.textContent.toLowerCase();
        const store = (row.dataset.store || '').toLowerCase();
        const part = (row.dataset.part || '').toLowerCase();
        const matchesSearch = searchTerm === '' || text.includes(searchTerm);
        const matchesStore = currentStoreFilter === 'all' || store === currentStoreFilter.toLowerCase();
        const matchesPart = currentPartFilter === 'all' || part === currentPartFilter.toLowerCase();
        row.style.display = matchesSearch && matchesStore && matchesPart ? '' : 'none';
    });
}

function filterByStore(store) {
    currentStoreFilter = store;
    document.querySelectorAll('#storeFilters .filter-btn').forEach(btn => {
        const btnStore = btn.dataset.store || '';
        btn.classList.toggle('active', btnStore === store.toLowerCase() || (store === 'all' && btnStore === 'all'));
    });
    filterProducts();
}

function filterByPart(part) {
    currentPartFilter = part;
    document.querySelectorAll('#partFilters .filter-btn').forEach(btn => {
        const btnPart = btn.dataset.part || '';
        btn.classList.toggle('active', btnPart === part.toLowerCase() || (part === 'all' && btnPart === 'all'));
    });
    filterProducts();
}

function sortTable(tableId, colIndex, isNumeric = false) {
    const table = document.getElementById(tableId);
    const tbody = table.querySelector('tbody');
    const rows = Array.from(tbody.querySelectorAll('tr'));
    const header = table.querySelectorAll('th')[colIndex];
    const isAsc = header.dataset.sort !== 'asc';
    table.querySelectorAll('th').forEach(th => { delete th.dataset.sort; });
    header.dataset.sort = isAsc ? 'asc' : 'desc';
    rows.sort((a, b) => {
        let aVal = a.cells[colIndex].textContent.trim();
        let bVal = b.cells[colIndex].textContent.trim();
        if (isNumeric) {
            aVal = parseFloat(aVal.replace(/[$%,]/g, '')) || 0;
            bVal = parseFloat(bVal.replace(/[$%,]/g, '')) || 0;
            return isAsc ? aVal - bVal : bVal - aVal;
        }
        return isAsc ? aVal.localeCompare(bVal) : bVal.localeCompare(aVal);
    });
    rows.forEach(row => tbody.appendChild(row));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn record(name: &str, price_new: &str, price_old: Option<&str>) -> ProductRecord {
        ProductRecord::new(
            name.to_string(),
            format!("https://store.example/{}", name.replace(' ', "-")),
            price_new.to_string(),
            price_old.map(String::from),
            Category::Decks,
            "Zumiez",
        )
    }

    #[test]
    fn test_report_lists_products_with_discount_badges() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "Zumiez_Decks".into(),
            vec![record("Big Deal Deck", "40.00", Some("80.00"))],
        );

        let page = render(&snapshot, &ChangeMap::new());
        assert!(page.contains("Big Deal Deck"));
        assert!(page.contains(r#"<span class="discount high">50%</span>"#));
        assert!(page.contains(r#"<div class="number">1</div><div class="label">Total Deals</div>"#));
    }

    #[test]
    fn test_product_names_are_escaped() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "Zumiez_Decks".into(),
            vec![record("Deck <8.5\"> & Co", "40.00", None)],
        );

        let page = render(&snapshot, &ChangeMap::new());
        assert!(page.contains("Deck &lt;8.5&quot;&gt; &amp; Co"));
        assert!(!page.contains("Deck <8.5"));
    }

    #[test]
    fn test_missing_original_price_shows_na() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "Zumiez_Decks".into(),
            vec![record("Full Price Deck", "59.95", None)],
        );

        let page = render(&snapshot, &ChangeMap::new());
        assert!(page.contains(r#"<td class="price price-old">N/A</td>"#));
        assert!(page.contains(r#"<span class="discount low">N/A</span>"#));
    }

    #[test]
    fn test_changes_section_rows_per_event_type() {
        let item = record("Fresh Deck", "20.00", Some("40.00"));
        let gone = record("Gone Deck", "30.00", Some("60.00"));
        let mut changes = ChangeMap::new();
        changes.insert(
            "Zumiez_Decks".into(),
            vec![
                ChangeEvent::New { item },
                ChangeEvent::PriceChanged {
                    url: "https://store.example/drop".into(),
                    name: "Dropped Deck".into(),
                    old: "50.00".into(),
                    new: "35.00".into(),
                },
                ChangeEvent::Removed { item: gone },
            ],
        );

        let page = render(&Snapshot::new(), &changes);
        assert!(page.contains("Recent Changes"));
        assert!(page.contains(r#"<span class="discount high">New</span>"#));
        assert!(page.contains(r#"<span class="discount medium">Price Drop</span>"#));
        assert!(page.contains(r#"<span class="discount low">Removed</span>"#));
        assert!(page.contains("Dropped Deck"));
    }

    #[test]
    fn test_no_changes_section_when_nothing_changed() {
        let page = render(&Snapshot::new(), &ChangeMap::new());
        assert!(!page.contains("Recent Changes"));
        assert!(page.contains("Skateboard Sale Tracker"));
    }
}
