pub mod cleaner;
pub mod error;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::{ChainRow, ExpiryMenu};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

use self::cleaner::{belongs_to, build_expiry_menu, raw_row_to_chain_row, root_symbol};
use self::error::ChainError;
use self::http_client::HttpClient;
use self::parsers::{extract_expiry_values, extract_raw_rows, extract_underlying_price};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source. `expiry` is `None` for the nearest expiry.
#[async_trait]
pub trait OptionPageSource: Send + Sync {
    async fn fetch_page(&self, symbol: &str, expiry: Option<i64>) -> Result<String, ChainError>;
}

// ── Yahoo scraper ─────────────────────────────────────────────────────────────

pub struct YahooScraper {
    client: HttpClient,
    base_url: Url,
}

impl YahooScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL {:?}", config.base_url))?;
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
        })
    }

    /// e.g. ^XDE → /q/op?s=%5EXDE+Options&date=1718841600
    pub fn page_url(&self, symbol: &str, expiry: Option<i64>) -> String {
        let mut url = self.base_url.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("s", &format!("{symbol} Options"));
            if let Some(expiry) = expiry {
                q.append_pair("date", &expiry.to_string());
            }
        }
        url.into()
    }
}

#[async_trait]
impl OptionPageSource for YahooScraper {
    async fn fetch_page(&self, symbol: &str, expiry: Option<i64>) -> Result<String, ChainError> {
        let url = self.page_url(symbol, expiry);
        info!("Fetch data from {}", url);
        self.client.get_text(&url).await
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Expiry dates offered by the page's date selector.
pub fn extract_expiry_menu(doc: &Html, symbol: &str) -> Result<ExpiryMenu, ChainError> {
    let values = extract_expiry_values(doc)?;
    let menu = build_expiry_menu(&values)?;
    debug!("{}: {} expiries on menu", symbol, menu.len());
    Ok(menu)
}

/// Decoded rows of every chain table whose contract belongs to `symbol`.
pub fn extract_chain_rows(
    doc: &Html,
    symbol: &str,
    price: &str,
    trade_date: NaiveDate,
) -> Result<Vec<ChainRow>, ChainError> {
    let root = root_symbol(symbol);
    let raw_rows = extract_raw_rows(doc)?;
    let total = raw_rows.len();

    let rows = raw_rows
        .iter()
        .filter(|raw| belongs_to(raw, root))
        .map(|raw| raw_row_to_chain_row(raw, symbol, price, trade_date))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("{}: kept {} of {} marked rows", symbol, rows.len(), total);
    Ok(rows)
}

// ── Client ────────────────────────────────────────────────────────────────────

/// The two calls the orchestrator makes. Each either succeeds whole or fails
/// with a single error.
pub struct OptionChainClient<S> {
    source: S,
    trade_date: NaiveDate,
}

impl<S: OptionPageSource> OptionChainClient<S> {
    pub fn new(source: S, trade_date: NaiveDate) -> Self {
        Self { source, trade_date }
    }

    pub async fn get_expiry_menu(&self, symbol: &str) -> Result<ExpiryMenu, ChainError> {
        let html = self.source.fetch_page(symbol, None).await?;
        let doc = Html::parse_document(&html);
        debug!("Html content is parsed");
        extract_expiry_menu(&doc, symbol)
    }

    pub async fn get_chain_rows(
        &self,
        symbol: &str,
        expiry: i64,
    ) -> Result<Vec<ChainRow>, ChainError> {
        let html = self.source.fetch_page(symbol, Some(expiry)).await?;
        parse_chain_page(&html, symbol, self.trade_date)
    }
}

fn parse_chain_page(
    html: &str,
    symbol: &str,
    trade_date: NaiveDate,
) -> Result<Vec<ChainRow>, ChainError> {
    let doc = Html::parse_document(html);
    debug!("Html content is parsed");
    let price = extract_underlying_price(&doc, symbol)?;
    extract_chain_rows(&doc, symbol, &price, trade_date)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::OptionType;

    /// One expiry, one XYZ call, one foreign row and a header row.
    pub(crate) const XYZ_PAGE: &str = r#"
        <html><body>
          <span id="yfs_l84_xyz_XYZ" data-sq="XYZ:value">101.50</span>
          <div id="quote-table">
            <div id="options_menu"><form><select>
              <option value="1718841600">June 20, 2024</option>
            </select></form></div>
            <table>
              <tr><th>Strike</th><th>Contract Name</th><th>Last</th></tr>
              <tr data-row="0">
                <td>100.00</td><td>XYZ240620C00100000</td><td>5.20</td><td>5.10</td>
                <td>5.30</td><td>0.10%</td><td>1.00%</td><td>120</td><td>340</td>
                <td>25.00%</td>
              </tr>
              <tr data-row="1">
                <td>50.00</td><td>ABC240620P00050000</td><td>1.00</td><td>0.90</td>
                <td>1.10</td><td>0.00</td><td>0.00%</td><td>1</td><td>2</td>
                <td>bogus</td>
              </tr>
            </table>
          </div>
        </body></html>
    "#;

    pub(crate) struct StaticSource(pub &'static str);

    #[async_trait]
    impl OptionPageSource for StaticSource {
        async fn fetch_page(&self, _: &str, _: Option<i64>) -> Result<String, ChainError> {
            Ok(self.0.to_string())
        }
    }

    fn trade_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_end_to_end_extraction() {
        let doc = Html::parse_document(XYZ_PAGE);

        let menu = extract_expiry_menu(&doc, "XYZ").unwrap();
        assert_eq!(menu.len(), 1);
        let (expiry, date) = menu.iter().next().unwrap();
        assert_eq!(expiry, 1_718_841_600);
        assert_eq!(date.to_string(), "2024-06-20");

        let rows = extract_chain_rows(&doc, "XYZ", "101.50", trade_date()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.option_type, OptionType::Call);
        assert_eq!(row.strike, "100.00");
        assert!(row.contract.starts_with("XYZ"));

        let rec = row.to_record();
        assert_eq!(rec[2], "20240620");
        assert_eq!(rec[4], "C");
        assert_eq!(rec[5], "100.00");
        assert_eq!(rec[11], "0.01");
        assert_eq!(rec[14], "0.25");
    }

    #[test]
    fn test_index_marker_is_stripped_for_filtering() {
        let page = XYZ_PAGE.replace("XYZ:value", "^XYZ:value").replace("xyz_XYZ", "xyz_^XYZ");
        let rows = parse_chain_page(&page, "^XYZ", trade_date()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contract, "XYZ240620C00100000");
        assert_eq!(rows[0].underlying_price, "101.50");
    }

    #[test]
    fn test_malformed_kept_row_fails_whole_page() {
        let page = XYZ_PAGE.replace("XYZ240620C00100000", "XYZ240620Q00100000");
        let err = parse_chain_page(&page, "XYZ", trade_date()).unwrap_err();
        assert!(matches!(err, ChainError::Validation(_)));
    }

    #[test]
    fn test_client_entry_points() {
        let client = OptionChainClient::new(StaticSource(XYZ_PAGE), trade_date());

        let menu = tokio_test::block_on(client.get_expiry_menu("XYZ")).unwrap();
        assert_eq!(menu.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec![1_718_841_600]);

        let rows = tokio_test::block_on(client.get_chain_rows("XYZ", 1_718_841_600)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].underlying_price, "101.50");
        assert_eq!(rows[0].trade_date, trade_date());
    }

    #[test]
    fn test_page_url() {
        let scraper = YahooScraper::new(&ScraperConfig::default()).unwrap();
        assert_eq!(
            scraper.page_url("^XDE", None),
            "http://finance.yahoo.com/q/op?s=%5EXDE+Options"
        );
        assert_eq!(
            scraper.page_url("AAPL", Some(1_718_841_600)),
            "http://finance.yahoo.com/q/op?s=AAPL+Options&date=1718841600"
        );
    }
}
