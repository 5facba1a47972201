//! BR structured-data provider (brapi.dev).
//!
//! Serves B3 equities, FIIs and the `^BVSP` index through `/api/quote`.
//! Crypto pairs are not served by this endpoint and are reported as not
//! found so the resolver moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::util::{fetch_each, get_json, with_timeout};
use crate::core::config::{BrapiProviderConfig, TimeoutsConfig};
use crate::core::error::{ProviderId, ResolutionFailure};
use crate::core::provider::MarketDataProvider;
use crate::core::quote::{FundamentalInputs, Fundamentals, Quote, decimal_or_zero};
use crate::core::symbol::{CanonicalSymbol, Venue};

pub const PROVIDER_ID: ProviderId = "BRAPI";

const FUNDAMENTAL_MODULES: &str =
    "defaultKeyStatistics,financialData,balanceSheetHistory,incomeStatementHistory";

#[derive(Deserialize, Debug)]
struct BrapiResponse {
    #[serde(default)]
    results: Vec<BrapiQuote>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BrapiQuote {
    symbol: String,
    regular_market_price: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_time: Option<String>,
    #[serde(alias = "logourl")]
    logo_url: Option<String>,
    price_earnings: Option<f64>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    #[serde(default)]
    balance_sheet_history: Vec<BalanceSheet>,
    #[serde(default)]
    income_statement_history: Vec<IncomeStatement>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    enterprise_value: Option<f64>,
    price_to_book: Option<f64>,
    book_value: Option<f64>,
    enterprise_to_ebitda: Option<f64>,
    shares_outstanding: Option<f64>,
    #[serde(alias = "yield")]
    dividend_yield: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    ebitda: Option<f64>,
    total_cash: Option<f64>,
    total_debt: Option<f64>,
    gross_margins: Option<f64>,
    profit_margins: Option<f64>,
    return_on_equity: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BalanceSheet {
    total_assets: Option<f64>,
    total_stockholder_equity: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IncomeStatement {
    ebit: Option<f64>,
}

pub struct BrapiProvider {
    base_url: String,
    token: Option<String>,
    timeouts: TimeoutsConfig,
    client: Client,
}

impl BrapiProvider {
    pub fn new(base_url: &str, token: Option<String>, timeouts: TimeoutsConfig) -> Self {
        let client = Client::builder()
            .user_agent("marketlens/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        BrapiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeouts,
            client,
        }
    }

    pub fn from_config(config: &BrapiProviderConfig, timeouts: TimeoutsConfig) -> Self {
        Self::new(&config.base_url, config.resolved_token(), timeouts)
    }

    /// brapi takes the bare B3/US ticker; crypto pairs live elsewhere.
    fn provider_symbol(symbol: &CanonicalSymbol) -> Result<String, ResolutionFailure> {
        match symbol.venue() {
            Venue::Binance => Err(ResolutionFailure::NotFound {
                provider: PROVIDER_ID,
                symbol: symbol.to_string(),
            }),
            _ => Ok(symbol.code().to_string()),
        }
    }

    async fn request(
        &self,
        provider_symbol: &str,
        modules: Option<&str>,
    ) -> Result<BrapiQuote, ResolutionFailure> {
        let url = format!("{}/api/quote/{}", self.base_url, provider_symbol);
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(modules) = modules {
            params.push(("modules", modules));
        }
        debug!(
            "Requesting brapi data from {} (modules: {})",
            url,
            modules.unwrap_or("none")
        );
        if let Some(token) = self.token.as_deref() {
            params.push(("token", token));
        }

        let response: BrapiResponse = get_json(
            PROVIDER_ID,
            self.client.get(&url).query(&params),
            provider_symbol,
            self.token.as_deref(),
        )
        .await?;

        response
            .results
            .into_iter()
            .find(|r| r.symbol.eq_ignore_ascii_case(provider_symbol))
            .ok_or_else(|| ResolutionFailure::NotFound {
                provider: PROVIDER_ID,
                symbol: provider_symbol.to_string(),
            })
    }

    fn to_quote(ticker: &str, item: BrapiQuote) -> Result<Quote, ResolutionFailure> {
        let price = item
            .regular_market_price
            .ok_or_else(|| ResolutionFailure::MalformedResponse {
                provider: PROVIDER_ID,
                message: format!("missing regularMarketPrice for {}", item.symbol),
            })?;
        let as_of = item
            .regular_market_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            symbol: ticker.to_string(),
            price: decimal_or_zero(Some(price)),
            change_percent: decimal_or_zero(item.regular_market_change_percent),
            as_of,
            logo_url: item.logo_url.filter(|u| !u.is_empty()),
        })
    }

    fn to_fundamentals(item: BrapiQuote) -> Fundamentals {
        let stats = item.default_key_statistics;
        let financial = item.financial_data;
        let balance = item.balance_sheet_history.into_iter().next();
        let income = item.income_statement_history.into_iter().next();

        FundamentalInputs {
            dividend_yield: stats.as_ref().and_then(|s| s.dividend_yield),
            price_earnings: item.price_earnings,
            price_to_book: stats.as_ref().and_then(|s| s.price_to_book),
            enterprise_value: stats.as_ref().and_then(|s| s.enterprise_value),
            enterprise_to_ebitda: stats.as_ref().and_then(|s| s.enterprise_to_ebitda),
            book_value_per_share: stats.as_ref().and_then(|s| s.book_value),
            shares_outstanding: stats.as_ref().and_then(|s| s.shares_outstanding),
            ebitda: financial.as_ref().and_then(|f| f.ebitda),
            ebit: income.and_then(|i| i.ebit),
            total_debt: financial.as_ref().and_then(|f| f.total_debt),
            total_cash: financial.as_ref().and_then(|f| f.total_cash),
            total_assets: balance.as_ref().and_then(|b| b.total_assets),
            total_equity: balance.as_ref().and_then(|b| b.total_stockholder_equity),
            gross_margins: financial.as_ref().and_then(|f| f.gross_margins),
            profit_margins: financial.as_ref().and_then(|f| f.profit_margins),
            return_on_equity: financial.as_ref().and_then(|f| f.return_on_equity),
        }
        .into_fundamentals()
    }
}

#[async_trait]
impl MarketDataProvider for BrapiProvider {
    fn id(&self) -> ProviderId {
        PROVIDER_ID
    }

    #[instrument(name = "BrapiQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, ResolutionFailure> {
        let provider_symbol = Self::provider_symbol(symbol)?;
        with_timeout(PROVIDER_ID, self.timeouts.quote(), async {
            let item = self.request(&provider_symbol, None).await?;
            Self::to_quote(symbol.ticker(), item)
        })
        .await
    }

    #[instrument(name = "BrapiFundamentalsFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, ResolutionFailure> {
        let provider_symbol = Self::provider_symbol(symbol)?;
        with_timeout(PROVIDER_ID, self.timeouts.fundamentals(), async {
            let item = self
                .request(&provider_symbol, Some(FUNDAMENTAL_MODULES))
                .await?;
            Ok(Self::to_fundamentals(item))
        })
        .await
    }

    async fn fetch_batch_quotes(
        &self,
        symbols: &[CanonicalSymbol],
    ) -> Result<Vec<Quote>, ResolutionFailure> {
        fetch_each(PROVIDER_ID, symbols, |symbol| self.fetch_quote(symbol)).await
    }
}
