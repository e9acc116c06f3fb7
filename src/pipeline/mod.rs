//! Pipeline orchestrator: expiry menu → per-expiry chain rows.
//!
//! One request is outstanding at a time. Every fetch goes through
//! [`retry_fixed`]; a fetch that exhausts its attempts aborts the whole run.

use crate::config::RetryConfig;
use crate::models::ChainRow;
use crate::scraper::error::ChainError;
use crate::scraper::{OptionChainClient, OptionPageSource};
use std::future::Future;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{info, warn};

// ── Retry ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            delay: cfg.delay(),
        }
    }
}

/// Run `op` up to `max_attempts` times (at least once), sleeping `delay`
/// between attempts. Every error kind is retried; the last one is returned.
pub async fn retry_fixed<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let attempts = policy.max_attempts.max(1);
    let strategy = FixedInterval::new(policy.delay).take(attempts as usize - 1);

    let mut attempt = 0u32;
    Retry::start(strategy, || {
        attempt += 1;
        let n = attempt;
        let fut = op();
        async move {
            fut.await.inspect_err(|e| {
                warn!("{} failed ({} error) on attempt {}/{}: {}", label, e.kind(), n, attempts, e);
            })
        }
    })
    .await
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline<S> {
    client: OptionChainClient<S>,
    retry: RetryPolicy,
}

impl<S: OptionPageSource> Pipeline<S> {
    pub fn new(client: OptionChainClient<S>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub async fn run(&self, symbol: &str) -> Result<PipelineOutput, ChainError> {
        info!("=== Step 1: Fetching expiry menu for {} ===", symbol);
        let menu = retry_fixed(self.retry, "expiry menu", || {
            self.client.get_expiry_menu(symbol)
        })
        .await?;
        if menu.is_empty() {
            warn!("{}: expiry menu is empty, output will carry the header only", symbol);
        } else {
            info!("{} expiries on menu", menu.len());
        }

        info!("=== Step 2: Fetching option chains ===");
        let mut rows = Vec::new();
        for (expiry, date) in menu.iter() {
            let label = format!("chain {} ({})", expiry, date);
            let chain = retry_fixed(self.retry, &label, || {
                self.client.get_chain_rows(symbol, expiry)
            })
            .await?;
            info!("{}: {} rows", date, chain.len());
            rows.extend(chain);
        }

        let output = PipelineOutput {
            expiries: menu.len(),
            rows,
        };
        info!(
            "=== Done: {} expiries | {} rows ===",
            output.expiries,
            output.rows.len()
        );
        Ok(output)
    }
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub expiries: usize,
    pub rows: Vec<ChainRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::tests::{StaticSource, XYZ_PAGE};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }

    fn trade_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    /// Fails the first `failures` fetches, then serves the page.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakySource {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl OptionPageSource for FlakySource {
        async fn fetch_page(&self, _: &str, _: Option<i64>) -> Result<String, ChainError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(ChainError::Network {
                    url: "http://example.invalid".into(),
                    message: format!("connection reset #{n}"),
                });
            }
            Ok(XYZ_PAGE.to_string())
        }
    }

    #[test]
    fn test_retry_recovers_after_two_failures() {
        let flaky = OptionChainClient::new(FlakySource::new(2), trade_date());
        let steady = OptionChainClient::new(StaticSource(XYZ_PAGE), trade_date());

        let got = tokio_test::block_on(retry_fixed(policy(), "menu", || flaky.get_expiry_menu("XYZ"))).unwrap();
        let want = tokio_test::block_on(steady.get_expiry_menu("XYZ")).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn test_retry_gives_up_after_three_failures() {
        let source = FlakySource::new(3);
        let client = OptionChainClient::new(source, trade_date());

        let err = tokio_test::block_on(retry_fixed(policy(), "menu", || client.get_expiry_menu("XYZ")))
            .unwrap_err();
        match err {
            ChainError::Network { message, .. } => assert_eq!(message, "connection reset #3"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_retry_counts_attempts() {
        let calls = AtomicU32::new(0);
        let res: Result<(), ChainError> = tokio_test::block_on(retry_fixed(policy(), "count", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ChainError::Parse("layout changed".into())) }
        }));
        assert!(matches!(res, Err(ChainError::Parse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // zero attempts still runs once
        let once = RetryPolicy { max_attempts: 0, ..policy() };
        let calls = AtomicU32::new(0);
        let res = tokio_test::block_on(retry_fixed(once, "once", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ChainError>(7) }
        }));
        assert_eq!(res.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pipeline_run() {
        let client = OptionChainClient::new(StaticSource(XYZ_PAGE), trade_date());
        let out = tokio_test::block_on(Pipeline::new(client, policy()).run("XYZ")).unwrap();
        assert_eq!(out.expiries, 1);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].contract, "XYZ240620C00100000");
    }

    #[test]
    fn test_pipeline_aborts_when_chain_fetch_exhausts() {
        // the menu page loads, every chain page is broken
        struct BrokenChains(Arc<AtomicU32>);

        #[async_trait]
        impl OptionPageSource for BrokenChains {
            async fn fetch_page(&self, _: &str, expiry: Option<i64>) -> Result<String, ChainError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                match expiry {
                    None => Ok(XYZ_PAGE.to_string()),
                    Some(_) => Ok("<html><body>moved</body></html>".to_string()),
                }
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let client = OptionChainClient::new(BrokenChains(Arc::clone(&calls)), trade_date());
        let err = tokio_test::block_on(Pipeline::new(client, policy()).run("XYZ")).unwrap_err();
        assert!(matches!(err, ChainError::Parse(_)));
        // 1 menu fetch + 3 chain attempts
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
