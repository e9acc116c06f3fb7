use crate::models::RawChainRow;
use scraper::{ElementRef, Html, Selector};

use super::error::ChainError;

fn selector(s: &str) -> Result<Selector, ChainError> {
    Selector::parse(s).map_err(|e| ChainError::parse(format!("selector {s:?}: {e:?}")))
}

/// Text of an element with runs of whitespace collapsed to one space.
pub fn normalized_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `<div id="quote-table">` holds both the expiry menu and every chain table.
fn quote_table(doc: &Html) -> Result<ElementRef<'_>, ChainError> {
    let sel = selector("div#quote-table")?;
    doc.select(&sel)
        .next()
        .ok_or_else(|| ChainError::parse("quote-table container not found"))
}

// ── Expiry menu ───────────────────────────────────────────────────────────────

/// Raw `value` attributes of the expiry `<option>`s, in page order.
pub fn extract_expiry_values(doc: &Html) -> Result<Vec<String>, ChainError> {
    let quote = quote_table(doc)?;

    let form_sel = selector("div#options_menu form")?;
    let form = quote
        .select(&form_sel)
        .next()
        .ok_or_else(|| ChainError::parse("options_menu form not found"))?;

    let option_sel = selector("option")?;
    form.select(&option_sel)
        .map(|opt| {
            opt.value()
                .attr("value")
                .map(|v| v.trim().to_string())
                .ok_or_else(|| ChainError::parse("expiry option without a value attribute"))
        })
        .collect()
}

// ── Underlying price ──────────────────────────────────────────────────────────

/// `<span id="yfs_l84_^XDE" data-sq="^XDE:value">109.00</span>`
pub fn extract_underlying_price(doc: &Html, symbol: &str) -> Result<String, ChainError> {
    let sel = selector("span[data-sq]")?;
    let wanted = format!("{symbol}:value");

    let span = doc
        .select(&sel)
        .find(|el| el.value().attr("data-sq") == Some(wanted.as_str()))
        .ok_or_else(|| ChainError::parse(format!("price element for {symbol} not found")))?;

    let id = span.value().attr("id").unwrap_or_default();
    if !id.contains(symbol) {
        return Err(ChainError::validation(format!(
            "price element id {id:?} does not mention {symbol}"
        )));
    }

    let price = normalized_text(span);
    if price.is_empty() {
        return Err(ChainError::parse(format!("empty price element for {symbol}")));
    }
    Ok(price)
}

// ── Chain tables ──────────────────────────────────────────────────────────────

/// Every `<tr data-row=…>` of every table under the quote container.
/// Header and spacer rows carry no `data-row` and are skipped.
pub fn extract_raw_rows(doc: &Html) -> Result<Vec<RawChainRow>, ChainError> {
    let quote = quote_table(doc)?;
    let table_sel = selector("table")?;
    let tr_sel = selector("tr")?;

    let mut rows = Vec::new();
    for table in quote.select(&table_sel) {
        for tr in table.select(&tr_sel) {
            let Some(row_id) = tr.value().attr("data-row") else {
                continue;
            };

            // Direct <td> children only
            let cells = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "td")
                .map(normalized_text)
                .collect();

            rows.push(RawChainRow {
                row_id: row_id.trim().to_string(),
                cells,
            });
        }
    }
    Ok(rows)
}
