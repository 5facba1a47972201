//! Uniform contract every upstream adapter implements

use async_trait::async_trait;

use crate::core::error::{ProviderId, ResolutionFailure};
use crate::core::quote::{Fundamentals, Quote};
use crate::core::symbol::CanonicalSymbol;

/// One upstream data provider behind the engine's fetch contract.
///
/// Adapters own request construction, their timeout budgets and the
/// mapping of transport/HTTP errors into [`ResolutionFailure`]. Returned
/// quotes carry the caller's internal ticker, not the provider's symbol.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, ResolutionFailure>;

    async fn fetch_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, ResolutionFailure>;

    /// Best effort: symbols that fail individually are omitted. Only a
    /// request where nothing succeeded is reported as a failure.
    async fn fetch_batch_quotes(
        &self,
        symbols: &[CanonicalSymbol],
    ) -> Result<Vec<Quote>, ResolutionFailure>;
}
