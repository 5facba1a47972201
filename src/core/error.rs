//! Failure taxonomy for upstream lookups and engine contract violations.

use thiserror::Error;

/// Stable identifier of an upstream adapter, e.g. `"BRAPI"`.
pub type ProviderId = &'static str;

/// Why a single adapter call did not produce a value.
///
/// These are expected, degraded outcomes. The resolver consumes them to
/// drive fallback and never hands them to its callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    #[error("{provider}: request timed out")]
    Timeout { provider: ProviderId },

    #[error("{provider}: rate limited")]
    RateLimited { provider: ProviderId },

    /// Non-2xx, non-429 answer. Status 0 marks a transport error with no
    /// HTTP response.
    #[error("{provider}: upstream error (status {status})")]
    UpstreamError { provider: ProviderId, status: u16 },

    #[error("{provider}: symbol not found: {symbol}")]
    NotFound {
        provider: ProviderId,
        symbol: String,
    },

    #[error("{provider}: malformed response: {message}")]
    MalformedResponse {
        provider: ProviderId,
        message: String,
    },
}

impl ResolutionFailure {
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Timeout { provider }
            | Self::RateLimited { provider }
            | Self::UpstreamError { provider, .. }
            | Self::NotFound { provider, .. }
            | Self::MalformedResponse { provider, .. } => *provider,
        }
    }

    /// Failures that are routine enough to log below warning level.
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::NotFound { .. })
    }
}

/// Contract violations by the caller. Upstream unavailability is never
/// reported through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("ticker at position {0} of the batch is empty")]
    EmptyBatchTicker(usize),
}
