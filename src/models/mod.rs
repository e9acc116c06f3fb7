use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// Published CSV column order.
pub const COLUMNS: [&str; 15] = [
    "ROW", "TRADE_DT", "EXPR_DT", "UNDL_PRC", "PC", "STRK_PRC", "OPT_SYMBOL", "LAST", "L_BID",
    "L_ASK", "CHANGE", "PCT_CHANGE", "VOL", "OIT", "IVOL",
];

// ── Expiry menu ───────────────────────────────────────────────────────────────

/// Expiry id (epoch seconds at midnight UTC) → calendar date, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryMenu {
    entries: BTreeMap<i64, NaiveDate>,
}

impl ExpiryMenu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, expiry: i64, date: NaiveDate) {
        self.entries.insert(expiry, date);
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, NaiveDate)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Option type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Put,
    Call,
}

impl OptionType {
    pub fn from_flag(c: char) -> Option<Self> {
        match c {
            'P' => Some(Self::Put),
            'C' => Some(Self::Call),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Put => 'P',
            Self::Call => 'C',
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// ── Chain row ─────────────────────────────────────────────────────────────────

/// One option contract for one trade date. Price-like fields keep the page's
/// text verbatim; the two percentage fields are stored as fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub row: i64,
    pub trade_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub underlying_price: String,
    pub option_type: OptionType,
    pub strike: String,
    pub contract: String,
    pub last: String,
    pub bid: String,
    pub ask: String,
    pub change: String,
    pub pct_change: f64,
    pub volume: String,
    pub open_interest: String,
    pub implied_vol: f64,
}

impl ChainRow {
    /// Fields in `COLUMNS` order, formatted for output.
    pub fn to_record(&self) -> [String; 15] {
        [
            self.row.to_string(),
            self.trade_date.format("%Y%m%d").to_string(),
            self.expiry_date.format("%Y%m%d").to_string(),
            self.underlying_price.clone(),
            self.option_type.to_string(),
            self.strike.clone(),
            self.contract.clone(),
            self.last.clone(),
            self.bid.clone(),
            self.ask.clone(),
            self.change.clone(),
            format_fraction(self.pct_change),
            self.volume.clone(),
            self.open_interest.clone(),
            format_fraction(self.implied_vol),
        ]
    }
}

/// Two fixed decimals: 0.1234 → "0.12".
pub fn format_fraction(x: f64) -> String {
    format!("{:.2}", x)
}

// ── Raw scraped rows ──────────────────────────────────────────────────────────

/// One `<tr data-row=…>` as found on the page, before any decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawChainRow {
    pub row_id: String,
    pub cells: Vec<String>,
}

impl RawChainRow {
    pub fn contract(&self) -> Option<&str> {
        self.cells.get(1).map(String::as_str)
    }
}
