use crate::models::{ChainRow, ExpiryMenu, OptionType, RawChainRow};
use chrono::{DateTime, NaiveDate, NaiveTime};
use tracing::debug;

use super::error::ChainError;

/// Number of cells a chain row must carry (strike … implied volatility).
const ROW_CELLS: usize = 10;

// ── Symbols ───────────────────────────────────────────────────────────────────

/// Strip a single leading non-alphanumeric marker.
/// "^XDE" → "XDE" | "AAPL" → "AAPL" | "" → ""
pub fn root_symbol(symbol: &str) -> &str {
    match symbol.chars().next() {
        Some(c) if !c.is_alphanumeric() => &symbol[c.len_utf8()..],
        _ => symbol,
    }
}

/// Pieces of `<ROOT><YYMMDD><P|C><strike>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractCode {
    pub expiry_date: NaiveDate,
    pub option_type: OptionType,
}

/// Decode a contract symbol against its root. The strike tail is not parsed.
pub fn decode_contract(contract: &str, root: &str) -> Result<ContractCode, ChainError> {
    if !contract.starts_with(root) {
        return Err(ChainError::validation(format!(
            "contract prefix is not symbol: {root} vs {contract}"
        )));
    }

    let r = root.len();
    let date_part = contract
        .get(r..r + 6)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            ChainError::validation(format!("contract {contract} has no YYMMDD after {root}"))
        })?;

    let expiry_date = NaiveDate::parse_from_str(&format!("20{date_part}"), "%Y%m%d")
        .map_err(|e| ChainError::validation(format!("contract {contract}: bad expiry date: {e}")))?;

    let flag = contract[r + 6..].chars().next().unwrap_or(' ');
    let option_type = OptionType::from_flag(flag).ok_or_else(|| {
        ChainError::validation(format!("put_call is not P,C: {flag:?} in {contract}"))
    })?;

    Ok(ContractCode { expiry_date, option_type })
}

// ── Numbers ───────────────────────────────────────────────────────────────────

/// "12.34%" → 0.1234
pub fn parse_percent(s: &str) -> Result<f64, ChainError> {
    let num = s.trim().trim_matches('%').trim();
    num.parse::<f64>()
        .map(|v| v / 100.0)
        .map_err(|_| ChainError::parse(format!("not a percentage: {s:?}")))
}

// ── Expiry menu ───────────────────────────────────────────────────────────────

/// Option `value` (float epoch seconds) → truncated id and its UTC date.
/// Anything not landing on midnight UTC breaks the page contract.
pub fn parse_expiry_value(value: &str) -> Result<(i64, NaiveDate), ChainError> {
    let secs: f64 = value
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ChainError::parse(format!("expiry value is not a timestamp: {value:?}")))?;

    let expiry = secs.trunc() as i64;
    let dt = DateTime::from_timestamp(expiry, 0)
        .ok_or_else(|| ChainError::parse(format!("expiry {expiry} out of range")))?;

    if dt.time() != NaiveTime::MIN {
        return Err(ChainError::validation(format!(
            "Expiration assertion failed: {expiry} {} {}",
            dt.format("%Y-%m-%d"),
            dt.format("%H:%M:%S"),
        )));
    }

    Ok((expiry, dt.date_naive()))
}

pub fn build_expiry_menu<S: AsRef<str>>(values: &[S]) -> Result<ExpiryMenu, ChainError> {
    let mut menu = ExpiryMenu::new();
    for value in values {
        let (expiry, date) = parse_expiry_value(value.as_ref())?;
        debug!("Expiry {}: {}", expiry, date);
        menu.insert(expiry, date);
    }
    Ok(menu)
}

// ── Chain rows ────────────────────────────────────────────────────────────────

/// True when the row belongs to the requested underlying.
pub fn belongs_to(raw: &RawChainRow, root: &str) -> bool {
    raw.contract().is_some_and(|c| c.starts_with(root))
}

/// Decode one kept row.
///
/// Column layout: 0 strike, 1 contract, 2 last, 3 bid, 4 ask, 5 change,
/// 6 %change, 7 volume, 8 open interest, 9 implied volatility.
pub fn raw_row_to_chain_row(
    raw: &RawChainRow,
    symbol: &str,
    price: &str,
    trade_date: NaiveDate,
) -> Result<ChainRow, ChainError> {
    if raw.cells.len() < ROW_CELLS {
        return Err(ChainError::parse(format!(
            "row {} has {} cells, expected {}",
            raw.row_id,
            raw.cells.len(),
            ROW_CELLS
        )));
    }

    let row: i64 = raw
        .row_id
        .parse()
        .map_err(|_| ChainError::parse(format!("bad data-row marker {:?}", raw.row_id)))?;

    let cell = |i: usize| raw.cells[i].clone();
    let contract = cell(1);
    let code = decode_contract(&contract, root_symbol(symbol))?;

    Ok(ChainRow {
        row,
        trade_date,
        expiry_date: code.expiry_date,
        underlying_price: price.to_string(),
        option_type: code.option_type,
        strike: cell(0),
        contract,
        last: cell(2),
        bid: cell(3),
        ask: cell(4),
        change: cell(5),
        pct_change: parse_percent(&raw.cells[6])?,
        volume: cell(7),
        open_interest: cell(8),
        implied_vol: parse_percent(&raw.cells[9])?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
