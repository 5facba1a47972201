use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::util::{fetch_each, get_json, with_timeout};
use crate::core::config::{TimeoutsConfig, YahooProviderConfig};
use crate::core::error::{ProviderId, ResolutionFailure};
use crate::core::provider::MarketDataProvider;
use crate::core::quote::{FundamentalInputs, Fundamentals, Quote, decimal_or_zero};
use crate::core::symbol::{CanonicalSymbol, Venue};

pub const PROVIDER_ID: ProviderId = "YAHOO";

const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData,balanceSheetHistory,incomeStatementHistory";

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(alias = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    #[serde(alias = "previousClose")]
    previous_close: Option<f64>,
    #[serde(alias = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryItem>>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent.
#[derive(Deserialize, Debug, Default)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryItem {
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    balance_sheet_history: Option<BalanceSheetHistory>,
    income_statement_history: Option<IncomeStatementHistory>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    dividend_yield: Option<RawValue>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    enterprise_value: Option<RawValue>,
    price_to_book: Option<RawValue>,
    book_value: Option<RawValue>,
    enterprise_to_ebitda: Option<RawValue>,
    shares_outstanding: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    ebitda: Option<RawValue>,
    total_cash: Option<RawValue>,
    total_debt: Option<RawValue>,
    gross_margins: Option<RawValue>,
    profit_margins: Option<RawValue>,
    return_on_equity: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BalanceSheetHistory {
    #[serde(default)]
    balance_sheet_statements: Vec<BalanceSheet>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BalanceSheet {
    total_assets: Option<RawValue>,
    total_stockholder_equity: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IncomeStatementHistory {
    #[serde(default)]
    income_statement_history: Vec<IncomeStatement>,
}

#[derive(Deserialize, Debug)]
struct IncomeStatement {
    ebit: Option<RawValue>,
}

// YahooFinanceProvider implementation for MarketDataProvider
pub struct YahooFinanceProvider {
    base_url: String,
    timeouts: TimeoutsConfig,
    client: Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeouts: TimeoutsConfig) -> Self {
        let client = Client::builder()
            .user_agent("marketlens/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeouts,
            client,
        }
    }

    pub fn from_config(config: &YahooProviderConfig, timeouts: TimeoutsConfig) -> Self {
        Self::new(&config.base_url, timeouts)
    }

    /// Yahoo suffixes B3 tickers with `.SA`, quotes crypto as `XXX-USD` and
    /// writes share classes with a dash (`BRK-B`).
    pub fn provider_symbol(symbol: &CanonicalSymbol) -> String {
        match symbol.venue() {
            Venue::Bmfbovespa => format!("{}.SA", symbol.code()),
            Venue::Binance => match symbol.crypto_base() {
                Some(base) => format!("{base}-USD"),
                None => symbol.code().to_string(),
            },
            Venue::Nasdaq | Venue::Nyse | Venue::Amex => symbol.code().replace('.', "-"),
            Venue::Index => symbol.code().to_string(),
        }
    }

    async fn chart(&self, ticker: &str, provider_symbol: &str) -> Result<Quote, ResolutionFailure> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, provider_symbol
        );
        debug!("Requesting price data from {}", url);

        let data: YahooPriceResponse =
            get_json(PROVIDER_ID, self.client.get(&url), provider_symbol, None).await?;
        let meta = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|item| item.meta)
            .ok_or_else(|| ResolutionFailure::NotFound {
                provider: PROVIDER_ID,
                symbol: provider_symbol.to_string(),
            })?;

        let price = meta
            .regular_market_price
            .ok_or_else(|| ResolutionFailure::MalformedResponse {
                provider: PROVIDER_ID,
                message: format!("missing regularMarketPrice for {provider_symbol}"),
            })?;

        let change_percent = meta
            .chart_previous_close
            .or(meta.previous_close)
            .filter(|prev| *prev > 0.0)
            .map(|prev| ((price - prev) / prev) * 100.0);

        let as_of = meta
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            symbol: ticker.to_string(),
            price: decimal_or_zero(Some(price)),
            change_percent: decimal_or_zero(change_percent),
            as_of,
            logo_url: None,
        })
    }

    async fn summary(&self, provider_symbol: &str) -> Result<Fundamentals, ResolutionFailure> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url, provider_symbol, SUMMARY_MODULES
        );
        debug!("Requesting fundamentals from {}", url);

        let data: QuoteSummaryResponse =
            get_json(PROVIDER_ID, self.client.get(&url), provider_symbol, None).await?;
        let item = data
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ResolutionFailure::NotFound {
                provider: PROVIDER_ID,
                symbol: provider_symbol.to_string(),
            })?;

        Ok(Self::to_fundamentals(item))
    }

    fn to_fundamentals(item: QuoteSummaryItem) -> Fundamentals {
        let detail = item.summary_detail;
        let stats = item.default_key_statistics;
        let financial = item.financial_data;
        let balance = item
            .balance_sheet_history
            .and_then(|h| h.balance_sheet_statements.into_iter().next());
        let income = item
            .income_statement_history
            .and_then(|h| h.income_statement_history.into_iter().next());

        FundamentalInputs {
            dividend_yield: detail.as_ref().and_then(|d| raw(&d.dividend_yield)),
            price_earnings: detail.as_ref().and_then(|d| raw(&d.trailing_pe)),
            price_to_book: stats.as_ref().and_then(|s| raw(&s.price_to_book)),
            enterprise_value: stats.as_ref().and_then(|s| raw(&s.enterprise_value)),
            enterprise_to_ebitda: stats.as_ref().and_then(|s| raw(&s.enterprise_to_ebitda)),
            book_value_per_share: stats.as_ref().and_then(|s| raw(&s.book_value)),
            shares_outstanding: stats.as_ref().and_then(|s| raw(&s.shares_outstanding)),
            ebitda: financial.as_ref().and_then(|f| raw(&f.ebitda)),
            ebit: income.as_ref().and_then(|i| raw(&i.ebit)),
            total_debt: financial.as_ref().and_then(|f| raw(&f.total_debt)),
            total_cash: financial.as_ref().and_then(|f| raw(&f.total_cash)),
            total_assets: balance.as_ref().and_then(|b| raw(&b.total_assets)),
            total_equity: balance
                .as_ref()
                .and_then(|b| raw(&b.total_stockholder_equity)),
            gross_margins: financial.as_ref().and_then(|f| raw(&f.gross_margins)),
            profit_margins: financial.as_ref().and_then(|f| raw(&f.profit_margins)),
            return_on_equity: financial.as_ref().and_then(|f| raw(&f.return_on_equity)),
        }
        .into_fundamentals()
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn id(&self) -> ProviderId {
        PROVIDER_ID
    }

    #[instrument(name = "YahooPriceFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, ResolutionFailure> {
        let provider_symbol = Self::provider_symbol(symbol);
        with_timeout(
            PROVIDER_ID,
            self.timeouts.quote(),
            self.chart(symbol.ticker(), &provider_symbol),
        )
        .await
    }

    #[instrument(name = "YahooFundamentalsFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, ResolutionFailure> {
        let provider_symbol = Self::provider_symbol(symbol);
        with_timeout(
            PROVIDER_ID,
            self.timeouts.fundamentals(),
            self.summary(&provider_symbol),
        )
        .await
    }

    async fn fetch_batch_quotes(
        &self,
        symbols: &[CanonicalSymbol],
    ) -> Result<Vec<Quote>, ResolutionFailure> {
        fetch_each(PROVIDER_ID, symbols, |symbol| self.fetch_quote(symbol)).await
    }
}
