use futures::future::join_all;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::error::{ProviderId, ResolutionFailure};
use crate::core::quote::Quote;
use crate::core::symbol::CanonicalSymbol;

/// Races `operation` against a timer of `budget`. Losing the race drops
/// only this future; sibling calls keep running.
pub async fn with_timeout<T, Fut>(
    provider: ProviderId,
    budget: Duration,
    operation: Fut,
) -> Result<T, ResolutionFailure>
where
    Fut: Future<Output = Result<T, ResolutionFailure>>,
{
    match tokio::time::timeout(budget, operation).await {
        Ok(result) => result,
        Err(_) => {
            debug!("{} call exceeded {:?}", provider, budget);
            Err(ResolutionFailure::Timeout { provider })
        }
    }
}

/// Maps a transport error. Its rendered message may embed the request URL,
/// so callers strip the URL and [`redact`] before logging.
pub fn classify_transport(provider: ProviderId, err: &reqwest::Error) -> ResolutionFailure {
    if err.is_timeout() {
        ResolutionFailure::Timeout { provider }
    } else if let Some(status) = err.status() {
        classify_status(provider, status, "")
            .unwrap_or(ResolutionFailure::UpstreamError {
                provider,
                status: status.as_u16(),
            })
    } else {
        ResolutionFailure::UpstreamError {
            provider,
            status: 0,
        }
    }
}

/// `None` for 2xx, otherwise the failure the status stands for.
pub fn classify_status(
    provider: ProviderId,
    status: StatusCode,
    symbol: &str,
) -> Option<ResolutionFailure> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(ResolutionFailure::RateLimited { provider })
    } else if status == StatusCode::NOT_FOUND {
        Some(ResolutionFailure::NotFound {
            provider,
            symbol: symbol.to_string(),
        })
    } else {
        Some(ResolutionFailure::UpstreamError {
            provider,
            status: status.as_u16(),
        })
    }
}

/// Sends a prepared request and decodes a JSON body, classifying every
/// failure on the way.
pub async fn get_json<T: DeserializeOwned>(
    provider: ProviderId,
    request: reqwest::RequestBuilder,
    symbol: &str,
    secret: Option<&str>,
) -> Result<T, ResolutionFailure> {
    let response: Response = request.send().await.map_err(|e| {
        let failure = classify_transport(provider, &e);
        debug!(
            "{} request failed for {}: {}",
            provider,
            symbol,
            redact(&e.without_url().to_string(), secret)
        );
        failure
    })?;

    if let Some(failure) = classify_status(provider, response.status(), symbol) {
        return Err(failure);
    }

    let text = response.text().await.map_err(|e| {
        ResolutionFailure::MalformedResponse {
            provider,
            message: redact(&e.without_url().to_string(), secret),
        }
    })?;

    serde_json::from_str(&text).map_err(|e| ResolutionFailure::MalformedResponse {
        provider,
        message: format!("{} for {}", e, symbol),
    })
}

/// Replaces every occurrence of `secret` with a fixed mask.
pub fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    }
}

/// Fetches each symbol concurrently and keeps the successes. Fails only
/// when every symbol failed, reporting the first failure.
pub async fn fetch_each<'a, F, Fut>(
    provider: ProviderId,
    symbols: &'a [CanonicalSymbol],
    fetch: F,
) -> Result<Vec<Quote>, ResolutionFailure>
where
    F: Fn(&'a CanonicalSymbol) -> Fut,
    Fut: Future<Output = Result<Quote, ResolutionFailure>>,
{
    if symbols.is_empty() {
        return Ok(Vec::new());
    }

    let results = join_all(symbols.iter().map(&fetch)).await;

    let mut quotes = Vec::with_capacity(results.len());
    let mut first_failure = None;
    for (symbol, result) in symbols.iter().zip(results) {
        match result {
            Ok(quote) => quotes.push(quote),
            Err(failure) => {
                log_failure(&failure, symbol.ticker());
                first_failure.get_or_insert(failure);
            }
        }
    }

    debug!(
        "{} resolved {} of {} symbols",
        provider,
        quotes.len(),
        symbols.len()
    );
    match first_failure {
        Some(failure) if quotes.is_empty() => Err(failure),
        _ => Ok(quotes),
    }
}

/// Logs a failure at the severity its kind deserves.
pub fn log_failure(failure: &ResolutionFailure, ticker: &str) {
    if failure.is_quiet() {
        debug!(provider = failure.provider(), ticker = %ticker, "{}", failure);
    } else {
        warn!(provider = failure.provider(), ticker = %ticker, "{}", failure);
    }
}
