//! Provider fallback orchestration.
//!
//! The fallback chain is fixed: the BR structured-data provider is primary
//! and the global provider is secondary, for single lookups and for the
//! index batch. Every upstream failure is handled here; callers only see
//! an absent value or a shorter batch.

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::cache::{CacheKey, Cached, MarketCache, RequestKind};
use crate::core::config::{AppConfig, FreshnessConfig, TapeConfig};
use crate::core::error::{EngineError, ResolutionFailure};
use crate::core::provider::MarketDataProvider;
use crate::core::quote::{Fundamentals, Quote};
use crate::core::symbol::{CanonicalSymbol, SymbolCatalog, VenueSet, normalize_ticker};
use crate::providers::brapi::BrapiProvider;
use crate::providers::util::log_failure;
use crate::providers::yahoo_finance::YahooFinanceProvider;

/// How the index batch splits work between the two providers.
#[derive(Debug, Clone, Default)]
pub struct TapePolicy {
    primary_symbols: HashSet<String>,
    enrich_primary: bool,
}

impl TapePolicy {
    pub fn new<I, S>(primary_symbols: I, enrich_primary: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            primary_symbols: primary_symbols
                .into_iter()
                .map(|s| normalize_ticker(s.as_ref()))
                .collect(),
            enrich_primary,
        }
    }

    pub fn from_config(config: &TapeConfig) -> Self {
        Self::new(&config.primary_symbols, config.enrich_primary)
    }

    fn served_by_primary(&self, symbol: &CanonicalSymbol) -> bool {
        self.primary_symbols.contains(symbol.ticker())
    }
}

pub struct Resolver {
    primary: Arc<dyn MarketDataProvider>,
    secondary: Arc<dyn MarketDataProvider>,
    catalog: SymbolCatalog,
    cache: Arc<MarketCache>,
    freshness: FreshnessConfig,
    tape: TapePolicy,
}

impl Resolver {
    pub fn new(
        primary: Arc<dyn MarketDataProvider>,
        secondary: Arc<dyn MarketDataProvider>,
        catalog: SymbolCatalog,
        cache: Arc<MarketCache>,
    ) -> Self {
        Self {
            primary,
            secondary,
            catalog,
            cache,
            freshness: FreshnessConfig::default(),
            tape: TapePolicy::default(),
        }
    }

    pub fn with_freshness(mut self, freshness: FreshnessConfig) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_tape_policy(mut self, tape: TapePolicy) -> Self {
        self.tape = tape;
        self
    }

    /// Wires brapi (primary) and Yahoo Finance (secondary) from `config`.
    pub fn from_config(config: &AppConfig, cache: Arc<MarketCache>) -> Self {
        let primary = BrapiProvider::from_config(&config.providers.brapi, config.timeouts);
        let secondary =
            YahooFinanceProvider::from_config(&config.providers.yahoo, config.timeouts);
        Self::new(
            Arc::new(primary),
            Arc::new(secondary),
            SymbolCatalog::from_config(&config.catalog),
            cache,
        )
        .with_freshness(config.freshness)
        .with_tape_policy(TapePolicy::from_config(&config.tape))
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    /// Quote for one holding, or `None` when no provider could answer.
    pub async fn resolve_quote(
        &self,
        ticker: &str,
        hint: Option<&str>,
    ) -> Result<Option<Quote>, EngineError> {
        let symbol = self.canonical(ticker, hint)?;
        let key = CacheKey::new(RequestKind::Quote, symbol.to_string());

        let cached = self
            .cache
            .get_or_resolve(key, self.freshness.quote(), || async {
                Cached::Quote(self.with_fallback(&symbol, |p, s| p.fetch_quote(s)).await)
            })
            .await;

        Ok(match cached {
            Cached::Quote(quote) => quote,
            other => unexpected_entry(&symbol, other),
        })
    }

    pub async fn resolve_fundamentals(
        &self,
        ticker: &str,
        hint: Option<&str>,
    ) -> Result<Option<Fundamentals>, EngineError> {
        let symbol = self.canonical(ticker, hint)?;
        let key = CacheKey::new(RequestKind::Fundamentals, symbol.to_string());

        let cached = self
            .cache
            .get_or_resolve(key, self.freshness.fundamentals(), || async {
                Cached::Fundamentals(
                    self.with_fallback(&symbol, |p, s| p.fetch_fundamentals(s))
                        .await,
                )
            })
            .await;

        Ok(match cached {
            Cached::Fundamentals(fundamentals) => fundamentals,
            other => unexpected_entry(&symbol, other),
        })
    }

    /// Best-effort multi-symbol quotes for the ticker tape. Unresolved
    /// symbols are omitted, so the result may be shorter than `tickers`.
    pub async fn resolve_index_batch(&self, tickers: &[String]) -> Result<Vec<Quote>, EngineError> {
        let mut seen = HashSet::new();
        let mut symbols = Vec::with_capacity(tickers.len());
        for (position, ticker) in tickers.iter().enumerate() {
            if ticker.trim().is_empty() {
                return Err(EngineError::EmptyBatchTicker(position));
            }
            let symbol = self.catalog.canonicalize_tape(ticker);
            if seen.insert(symbol.ticker().to_string()) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let normalized: Vec<String> = symbols.iter().map(|s| s.ticker().to_string()).collect();
        let key = CacheKey::batch(&normalized);

        let cached = self
            .cache
            .get_or_resolve(key, self.freshness.index_batch(), || async {
                Cached::Batch(self.batch_with_fallback(&symbols).await)
            })
            .await;

        Ok(match cached {
            Cached::Batch(quotes) => quotes,
            other => {
                debug!("Unexpected cache entry for batch: {:?}", other);
                Vec::new()
            }
        })
    }

    fn canonical(&self, ticker: &str, hint: Option<&str>) -> Result<CanonicalSymbol, EngineError> {
        if ticker.trim().is_empty() {
            return Err(EngineError::EmptyTicker);
        }
        Ok(self.catalog.canonicalize(ticker, hint, VenueSet::Br))
    }

    /// Primary, then secondary. No retries beyond that single fallback.
    async fn with_fallback<T, F>(&self, symbol: &CanonicalSymbol, fetch: F) -> Option<T>
    where
        F: for<'a> Fn(
            &'a dyn MarketDataProvider,
            &'a CanonicalSymbol,
        ) -> BoxFuture<'a, Result<T, ResolutionFailure>>,
    {
        match fetch(self.primary.as_ref(), symbol).await {
            Ok(value) => return Some(value),
            Err(failure) => {
                log_failure(&failure, symbol.ticker());
                debug!(
                    "Falling back from {} to {} for {}",
                    self.primary.id(),
                    self.secondary.id(),
                    symbol
                );
            }
        }

        match fetch(self.secondary.as_ref(), symbol).await {
            Ok(value) => Some(value),
            Err(failure) => {
                log_failure(&failure, symbol.ticker());
                info!("No provider could resolve {}", symbol);
                None
            }
        }
    }

    async fn batch_with_fallback(&self, symbols: &[CanonicalSymbol]) -> Vec<Quote> {
        let (primary_subset, remainder): (Vec<CanonicalSymbol>, Vec<CanonicalSymbol>) = symbols
            .iter()
            .cloned()
            .partition(|s| self.tape.served_by_primary(s));

        let secondary_request: Vec<CanonicalSymbol> = if self.tape.enrich_primary {
            symbols.to_vec()
        } else {
            remainder
        };

        let (primary_result, secondary_result) = tokio::join!(
            self.fetch_batch(self.primary.as_ref(), &primary_subset),
            self.fetch_batch(self.secondary.as_ref(), &secondary_request),
        );

        let mut secondary_quotes = secondary_result.unwrap_or_else(|failure| {
            log_failure(&failure, "batch");
            Vec::new()
        });

        match primary_result {
            Ok(primary_quotes) => {
                // Subset symbols the primary could not answer go to the
                // secondary unless enrichment already asked for them.
                let answered: HashSet<&str> =
                    primary_quotes.iter().map(|q| q.symbol.as_str()).collect();
                let unanswered: Vec<CanonicalSymbol> = if self.tape.enrich_primary {
                    Vec::new()
                } else {
                    primary_subset
                        .iter()
                        .filter(|s| !answered.contains(s.ticker()))
                        .cloned()
                        .collect()
                };
                if !unanswered.is_empty() {
                    debug!(
                        "{} left {} symbols unresolved, asking {}",
                        self.primary.id(),
                        unanswered.len(),
                        self.secondary.id()
                    );
                    match self.fetch_batch(self.secondary.as_ref(), &unanswered).await {
                        Ok(quotes) => secondary_quotes.extend(quotes),
                        Err(failure) => log_failure(&failure, "batch"),
                    }
                }
                merge_quotes(symbols, primary_quotes, secondary_quotes)
            }
            Err(failure) => {
                log_failure(&failure, "batch");
                debug!(
                    "Primary subset failed, fetching all {} symbols from {}",
                    symbols.len(),
                    self.secondary.id()
                );
                match self.fetch_batch(self.secondary.as_ref(), symbols).await {
                    Ok(all) => merge_quotes(symbols, all, secondary_quotes),
                    Err(failure) => {
                        log_failure(&failure, "batch");
                        merge_quotes(symbols, secondary_quotes, Vec::new())
                    }
                }
            }
        }
    }

    async fn fetch_batch(
        &self,
        provider: &dyn MarketDataProvider,
        symbols: &[CanonicalSymbol],
    ) -> Result<Vec<Quote>, ResolutionFailure> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        provider.fetch_batch_quotes(symbols).await
    }
}

fn unexpected_entry<T>(symbol: &CanonicalSymbol, entry: Cached) -> Option<T> {
    debug!("Unexpected cache entry for {}: {:?}", symbol, entry);
    None
}

/// Orders quotes like `requested`, preferring the primary's answer and
/// filling a missing logo from the other side.
fn merge_quotes(
    requested: &[CanonicalSymbol],
    primary: Vec<Quote>,
    secondary: Vec<Quote>,
) -> Vec<Quote> {
    let mut primary: HashMap<String, Quote> =
        primary.into_iter().map(|q| (q.symbol.clone(), q)).collect();
    let mut secondary: HashMap<String, Quote> = secondary
        .into_iter()
        .map(|q| (q.symbol.clone(), q))
        .collect();

    requested
        .iter()
        .filter_map(|symbol| {
            let ticker = symbol.ticker();
            match (primary.remove(ticker), secondary.remove(ticker)) {
                (Some(mut quote), Some(other)) => {
                    if quote.logo_url.is_none() {
                        quote.logo_url = other.logo_url;
                    }
                    Some(quote)
                }
                (Some(quote), None) | (None, Some(quote)) => Some(quote),
                (None, None) => None,
            }
        })
        .collect()
}

/// Builds a resolver from `config` and starts the periodic cache sweep when
/// one is configured.
pub fn build_from_config(config: &AppConfig) -> Resolver {
    let cache = Arc::new(MarketCache::new());
    if let Some(secs) = config.cache.sweep_interval_secs.filter(|s| *s > 0) {
        debug!("Sweeping cache every {}s", secs);
        cache.spawn_sweeper(Duration::from_secs(secs));
    }
    Resolver::from_config(config, cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use crate::core::error::ProviderId;
    use crate::providers::util::{fetch_each, with_timeout};

    struct MockProvider {
        id: ProviderId,
        prices: HashMap<String, i64>,
        failure: Option<ResolutionFailure>,
        delay: Option<Duration>,
        budget: Duration,
        /// Served only on the first batch request.
        flaky: Option<&'static str>,
        quote_calls: AtomicUsize,
        fundamentals_calls: AtomicUsize,
        batch_requests: Mutex<Vec<Vec<String>>>,
    }

    impl MockProvider {
        fn new(id: ProviderId, prices: &[(&str, i64)]) -> Self {
            Self {
                id,
                prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
                failure: None,
                delay: None,
                budget: Duration::from_secs(5),
                flaky: None,
                quote_calls: AtomicUsize::new(0),
                fundamentals_calls: AtomicUsize::new(0),
                batch_requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(id: ProviderId, failure: ResolutionFailure) -> Self {
            let mut provider = Self::new(id, &[]);
            provider.failure = Some(failure);
            provider
        }

        fn slow(mut self, delay: Duration, budget: Duration) -> Self {
            self.delay = Some(delay);
            self.budget = budget;
            self
        }

        fn flaky(mut self, ticker: &'static str) -> Self {
            self.flaky = Some(ticker);
            self
        }

        fn quote_calls(&self) -> usize {
            self.quote_calls.load(Ordering::SeqCst)
        }

        fn batch_requests(&self) -> Vec<Vec<String>> {
            self.batch_requests.lock().unwrap().clone()
        }

        async fn lookup(&self, symbol: &CanonicalSymbol) -> Result<Quote, ResolutionFailure> {
            with_timeout(self.id, self.budget, async {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(failure) = &self.failure {
                    return Err(failure.clone());
                }
                self.prices
                    .get(symbol.ticker())
                    .map(|price| Quote {
                        symbol: symbol.ticker().to_string(),
                        price: Decimal::from(*price),
                        change_percent: Decimal::ZERO,
                        as_of: Utc::now(),
                        logo_url: (self.id == "PRIMARY")
                            .then(|| format!("https://logo/{}.svg", symbol.ticker())),
                    })
                    .ok_or_else(|| ResolutionFailure::NotFound {
                        provider: self.id,
                        symbol: symbol.ticker().to_string(),
                    })
            })
            .await
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, ResolutionFailure> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            self.lookup(symbol).await
        }

        async fn fetch_fundamentals(
            &self,
            symbol: &CanonicalSymbol,
        ) -> Result<Fundamentals, ResolutionFailure> {
            self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
            let quote = self.lookup(symbol).await?;
            let mut fundamentals = Fundamentals::default();
            fundamentals.valuation.pe = quote.price;
            Ok(fundamentals)
        }

        async fn fetch_batch_quotes(
            &self,
            symbols: &[CanonicalSymbol],
        ) -> Result<Vec<Quote>, ResolutionFailure> {
            let call = {
                let mut requests = self.batch_requests.lock().unwrap();
                requests.push(symbols.iter().map(|s| s.ticker().to_string()).collect());
                requests.len()
            };
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            let served: Vec<CanonicalSymbol> = symbols
                .iter()
                .filter(|s| call == 1 || self.flaky != Some(s.ticker()))
                .cloned()
                .collect();
            fetch_each(self.id, &served, |s| self.lookup(s)).await
        }
    }

    fn resolver(primary: Arc<MockProvider>, secondary: Arc<MockProvider>) -> Resolver {
        Resolver::new(
            primary,
            secondary,
            SymbolCatalog::new(["SPY"], ["KO"]),
            Arc::new(MarketCache::new()),
        )
        .with_tape_policy(TapePolicy::new(["^BVSP"], false))
    }

    fn tickers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("PETR4", 38)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("PETR4", 40)]));
        let resolver = resolver(primary.clone(), secondary.clone());

        let quote = resolver.resolve_quote("PETR4", None).await.unwrap().unwrap();
        assert_eq!(quote.price, Decimal::from(38));
        assert_eq!(primary.quote_calls(), 1);
        assert_eq!(secondary.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back_to_secondary() {
        let primary = Arc::new(
            MockProvider::new("PRIMARY", &[("AAPL", 1)])
                .slow(Duration::from_millis(300), Duration::from_millis(20)),
        );
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("AAPL", 190)]));
        let resolver = resolver(primary.clone(), secondary.clone());

        let quote = resolver.resolve_quote("AAPL", None).await.unwrap();
        assert_eq!(quote.map(|q| q.price), Some(Decimal::from(190)));
        assert_eq!(primary.quote_calls(), 1);
        assert_eq!(secondary.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back_without_retry() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            ResolutionFailure::RateLimited { provider: "PRIMARY" },
        ));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("VALE3", 60)]));
        let resolver = resolver(primary.clone(), secondary.clone());

        let quote = resolver.resolve_quote("VALE3", None).await.unwrap();
        assert!(quote.is_some());
        assert_eq!(primary.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_returns_none() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            ResolutionFailure::UpstreamError {
                provider: "PRIMARY",
                status: 503,
            },
        ));
        let secondary = Arc::new(MockProvider::failing(
            "SECONDARY",
            ResolutionFailure::Timeout {
                provider: "SECONDARY",
            },
        ));
        let resolver = resolver(primary, secondary);

        assert_eq!(resolver.resolve_quote("PETR4", None).await, Ok(None));
        assert_eq!(resolver.resolve_fundamentals("PETR4", None).await, Ok(None));
    }

    #[tokio::test]
    async fn test_empty_ticker_is_contract_violation() {
        let resolver = resolver(
            Arc::new(MockProvider::new("PRIMARY", &[])),
            Arc::new(MockProvider::new("SECONDARY", &[])),
        );
        assert_eq!(
            resolver.resolve_quote("  ", None).await,
            Err(EngineError::EmptyTicker)
        );
        assert_eq!(
            resolver
                .resolve_index_batch(&tickers(&["^BVSP", ""]))
                .await,
            Err(EngineError::EmptyBatchTicker(1))
        );
    }

    #[tokio::test]
    async fn test_fresh_quote_is_served_from_cache() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("PETR4", 38)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[]));
        let resolver = resolver(primary.clone(), secondary);

        let first = resolver.resolve_quote("PETR4", None).await.unwrap();
        let second = resolver.resolve_quote("petr4", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(primary.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_quote_triggers_one_fresh_call() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("PETR4", 38)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[]));
        let freshness = FreshnessConfig {
            quote_secs: 0,
            ..FreshnessConfig::default()
        };
        let resolver = resolver(primary.clone(), secondary).with_freshness(freshness);

        resolver.resolve_quote("PETR4", None).await.unwrap();
        assert_eq!(primary.quote_calls(), 1);
        resolver.resolve_quote("PETR4", None).await.unwrap();
        assert_eq!(primary.quote_calls(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[]));
        let resolver = resolver(primary.clone(), secondary.clone());

        assert_eq!(resolver.resolve_quote("DEAD3", None).await, Ok(None));
        assert_eq!(resolver.resolve_quote("DEAD3", None).await, Ok(None));
        assert_eq!(primary.quote_calls(), 1);
        assert_eq!(secondary.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_fallback_and_cache() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("AAPL", 30)]));
        let resolver = resolver(primary.clone(), secondary.clone());

        let f = resolver
            .resolve_fundamentals("AAPL", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.valuation.pe, Decimal::from(30));
        resolver.resolve_fundamentals("AAPL", None).await.unwrap();
        assert_eq!(secondary.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_index_batch_omits_bad_symbol() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("^BVSP", 128_000)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("^GSPC", 5_200)]));
        let resolver = resolver(primary.clone(), secondary.clone());

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "BADTICKER", "^GSPC"]))
            .await
            .unwrap();

        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["^BVSP", "^GSPC"]);
        assert_eq!(primary.batch_requests(), vec![tickers(&["^BVSP"])]);
        assert_eq!(
            secondary.batch_requests(),
            vec![tickers(&["BADTICKER", "^GSPC"])]
        );
    }

    #[tokio::test]
    async fn test_index_batch_primary_failure_refetches_everything() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            ResolutionFailure::Timeout { provider: "PRIMARY" },
        ));
        let secondary = Arc::new(MockProvider::new(
            "SECONDARY",
            &[("^BVSP", 127_500), ("^GSPC", 5_200)],
        ));
        let resolver = resolver(primary, secondary.clone());

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^GSPC", "^BVSP"]))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(
            secondary.batch_requests(),
            vec![tickers(&["^GSPC"]), tickers(&["^GSPC", "^BVSP"])]
        );
    }

    #[tokio::test]
    async fn test_index_batch_unanswered_primary_symbols_go_to_secondary() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("^BVSP", 128_000)]));
        let secondary = Arc::new(MockProvider::new(
            "SECONDARY",
            &[("PETR4", 38), ("^GSPC", 5_200)],
        ));
        let resolver = Resolver::new(
            primary,
            secondary.clone(),
            SymbolCatalog::default(),
            Arc::new(MarketCache::new()),
        )
        .with_tape_policy(TapePolicy::new(["^BVSP", "PETR4"], false));

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "PETR4", "^GSPC"]))
            .await
            .unwrap();

        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["^BVSP", "PETR4", "^GSPC"]);
        assert_eq!(
            secondary.batch_requests(),
            vec![tickers(&["^GSPC"]), tickers(&["PETR4"])]
        );
    }

    #[tokio::test]
    async fn test_index_batch_enrichment_skips_second_secondary_request() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("^BVSP", 128_000)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("PETR4", 38)]));
        let resolver = Resolver::new(
            primary,
            secondary.clone(),
            SymbolCatalog::default(),
            Arc::new(MarketCache::new()),
        )
        .with_tape_policy(TapePolicy::new(["PETR4", "^BVSP"], true));

        let quotes = resolver
            .resolve_index_batch(&tickers(&["PETR4", "^BVSP"]))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(secondary.batch_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_index_batch_refetch_keeps_first_secondary_answers() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            ResolutionFailure::Timeout { provider: "PRIMARY" },
        ));
        let secondary = Arc::new(
            MockProvider::new("SECONDARY", &[("^BVSP", 127_500), ("^GSPC", 5_200)])
                .flaky("^GSPC"),
        );
        let resolver = resolver(primary, secondary.clone());

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();

        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["^BVSP", "^GSPC"]);
        assert_eq!(secondary.batch_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_index_batch_everything_down_is_empty() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            ResolutionFailure::Timeout { provider: "PRIMARY" },
        ));
        let secondary = Arc::new(MockProvider::failing(
            "SECONDARY",
            ResolutionFailure::RateLimited {
                provider: "SECONDARY",
            },
        ));
        let resolver = resolver(primary, secondary);

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_index_batch_enrichment_fills_logo_and_keeps_primary_price() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("^BVSP", 128_000)]));
        let secondary = Arc::new(MockProvider::new(
            "SECONDARY",
            &[("^BVSP", 1), ("^GSPC", 5_200)],
        ));
        let resolver = Resolver::new(
            primary,
            secondary.clone(),
            SymbolCatalog::default(),
            Arc::new(MarketCache::new()),
        )
        .with_tape_policy(TapePolicy::new(["^bvsp"], true));

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();

        assert_eq!(quotes[0].symbol, "^BVSP");
        assert_eq!(quotes[0].price, Decimal::from(128_000));
        assert!(quotes[0].logo_url.is_some());
        assert_eq!(quotes[1].price, Decimal::from(5_200));
        assert_eq!(
            secondary.batch_requests(),
            vec![tickers(&["^BVSP", "^GSPC"])]
        );
    }

    #[tokio::test]
    async fn test_index_batch_branches_run_concurrently() {
        let delay = Duration::from_millis(200);
        let primary = Arc::new(
            MockProvider::new("PRIMARY", &[("^BVSP", 1)]).slow(delay, Duration::from_secs(5)),
        );
        let secondary = Arc::new(
            MockProvider::new("SECONDARY", &[("^GSPC", 2)]).slow(delay, Duration::from_secs(5)),
        );
        let resolver = resolver(primary, secondary);

        let started = Instant::now();
        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(quotes.len(), 2);
        assert!(elapsed < Duration::from_millis(380), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_index_batch_timeout_does_not_cancel_sibling() {
        let primary = Arc::new(
            MockProvider::new("PRIMARY", &[("^BVSP", 1)])
                .slow(Duration::from_millis(300), Duration::from_millis(20)),
        );
        let secondary = Arc::new(MockProvider::new(
            "SECONDARY",
            &[("^GSPC", 2), ("^BVSP", 3)],
        ));
        let resolver = resolver(primary, secondary);

        let quotes = resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();

        let prices: Vec<_> = quotes.iter().map(|q| q.price).collect();
        assert_eq!(prices, vec![Decimal::from(3), Decimal::from(2)]);
    }

    #[tokio::test]
    async fn test_index_batch_is_cached_order_insensitive() {
        let primary = Arc::new(MockProvider::new("PRIMARY", &[("^BVSP", 1)]));
        let secondary = Arc::new(MockProvider::new("SECONDARY", &[("^GSPC", 2)]));
        let resolver = resolver(primary.clone(), secondary);

        resolver
            .resolve_index_batch(&tickers(&["^BVSP", "^GSPC"]))
            .await
            .unwrap();
        resolver
            .resolve_index_batch(&tickers(&["^GSPC", "^BVSP", "^gspc"]))
            .await
            .unwrap();
        assert_eq!(primary.batch_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_empty() {
        let resolver = resolver(
            Arc::new(MockProvider::new("PRIMARY", &[])),
            Arc::new(MockProvider::new("SECONDARY", &[])),
        );
        assert_eq!(resolver.resolve_index_batch(&[]).await, Ok(vec![]));
    }

    #[test]
    fn test_merge_prefers_primary() {
        let catalog = SymbolCatalog::default();
        let requested: Vec<_> = ["^A", "^B", "^C"]
            .iter()
            .map(|t| catalog.canonicalize_tape(t))
            .collect();
        let quote = |symbol: &str, price: i64, logo: Option<&str>| Quote {
            symbol: symbol.to_string(),
            price: Decimal::from(price),
            change_percent: Decimal::ZERO,
            as_of: Utc::now(),
            logo_url: logo.map(str::to_string),
        };

        let merged = merge_quotes(
            &requested,
            vec![quote("^B", 1, None)],
            vec![quote("^C", 3, None), quote("^B", 2, Some("logo"))],
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].symbol, "^B");
        assert_eq!(merged[0].price, Decimal::from(1));
        assert_eq!(merged[0].logo_url.as_deref(), Some("logo"));
        assert_eq!(merged[1].symbol, "^C");
    }
}
