//! Venue classification of internal tickers.
//!
//! Maps an internal ticker plus an optional asset-type hint to the
//! venue-qualified symbol charting surfaces and adapters expect. Pure and
//! deterministic: the curated ticker lists are injected through
//! [`SymbolCatalog`] and nothing here performs I/O.

use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::core::config::CatalogConfig;
use crate::core::error::EngineError;

/// Venue family the target surface is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueSet {
    Br,
    Us,
    Crypto,
}

impl FromStr for VenueSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "br" => Ok(VenueSet::Br),
            "us" => Ok(VenueSet::Us),
            "crypto" => Ok(VenueSet::Crypto),
            _ => Err(anyhow::anyhow!("Invalid venue set: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    Bmfbovespa,
    Nasdaq,
    Nyse,
    Amex,
    Binance,
    /// Market indices such as `^BVSP`, rendered without a prefix.
    Index,
}

impl Venue {
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Venue::Bmfbovespa => Some("BMFBOVESPA"),
            Venue::Nasdaq => Some("NASDAQ"),
            Venue::Nyse => Some("NYSE"),
            Venue::Amex => Some("AMEX"),
            Venue::Binance => Some("BINANCE"),
            Venue::Index => None,
        }
    }

    pub fn is_us(&self) -> bool {
        matches!(self, Venue::Nasdaq | Venue::Nyse | Venue::Amex)
    }
}

/// Classification carried by the asset store, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetHint {
    Crypto,
    UsEtf,
    UsReit,
    Other(String),
}

impl AssetHint {
    /// Parses the free-form classification string. Case, spaces, `_` and
    /// `-` are ignored.
    pub fn parse(hint: &str) -> Self {
        let key: String = hint
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "crypto" | "criptomoeda" | "cripto" => AssetHint::Crypto,
            "usetf" | "etfus" => AssetHint::UsEtf,
            "usreit" | "reitus" | "reit" => AssetHint::UsReit,
            _ => AssetHint::Other(hint.trim().to_string()),
        }
    }
}

/// A ticker qualified with the venue it should be looked up on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalSymbol {
    ticker: String,
    venue: Venue,
    code: String,
}

impl CanonicalSymbol {
    /// Internal ticker the caller asked for.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Venue-side code, e.g. `PETR4` or the pair `BTCUSDT`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Crypto base asset for `XXXUSDT` pairs.
    pub fn crypto_base(&self) -> Option<&str> {
        match self.venue {
            Venue::Binance => self.code.strip_suffix(CRYPTO_QUOTE_ASSET),
            _ => None,
        }
    }
}

impl Display for CanonicalSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.venue.prefix() {
            Some(prefix) => write!(f, "{}:{}", prefix, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

const CRYPTO_QUOTE_ASSET: &str = "USDT";

/// Curated exchange lists consulted for digit-free tickers.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    known_etfs: HashSet<String>,
    known_nyse: HashSet<String>,
}

impl SymbolCatalog {
    pub fn new<I, J, S, T>(known_etfs: I, known_nyse: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            known_etfs: known_etfs
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .collect(),
            known_nyse: known_nyse
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.known_etfs, &config.known_nyse)
    }

    /// Qualifies `ticker` for the given venue set. First matching rule wins:
    ///
    /// 1. crypto hint (or no hint on a crypto surface) pairs with USDT
    /// 2. an explicit US listing class picks that class's venue
    /// 3. digit-free tickers are US-style: known ETF, known NYSE, else NASDAQ
    /// 4. anything else is a BR share class on BMFBOVESPA
    pub fn canonicalize(
        &self,
        ticker: &str,
        hint: Option<&str>,
        venue_set: VenueSet,
    ) -> CanonicalSymbol {
        let ticker = normalize_ticker(ticker);
        let hint = hint
            .filter(|h| !h.trim().is_empty())
            .map(AssetHint::parse);

        let is_crypto = match &hint {
            Some(h) => *h == AssetHint::Crypto,
            None => venue_set == VenueSet::Crypto,
        };
        if is_crypto {
            let code = if ticker.ends_with(CRYPTO_QUOTE_ASSET) {
                ticker.clone()
            } else {
                format!("{ticker}{CRYPTO_QUOTE_ASSET}")
            };
            return CanonicalSymbol {
                ticker,
                venue: Venue::Binance,
                code,
            };
        }

        let venue = match hint {
            Some(AssetHint::UsEtf) => Venue::Amex,
            Some(AssetHint::UsReit) => Venue::Nyse,
            _ if !ticker.chars().any(|c| c.is_ascii_digit()) => self.us_venue(&ticker),
            _ => Venue::Bmfbovespa,
        };

        CanonicalSymbol {
            code: ticker.clone(),
            ticker,
            venue,
        }
    }

    /// Tape entries: `^` indices stay verbatim, everything else goes
    /// through [`Self::canonicalize`] without a hint.
    pub fn canonicalize_tape(&self, ticker: &str) -> CanonicalSymbol {
        let normalized = normalize_ticker(ticker);
        if normalized.starts_with('^') {
            return CanonicalSymbol {
                code: normalized.clone(),
                ticker: normalized,
                venue: Venue::Index,
            };
        }
        self.canonicalize(&normalized, None, VenueSet::Br)
    }

    fn us_venue(&self, ticker: &str) -> Venue {
        if self.known_etfs.contains(ticker) {
            Venue::Amex
        } else if self.known_nyse.contains(ticker) {
            Venue::Nyse
        } else {
            Venue::Nasdaq
        }
    }
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Rendered venue-qualified symbol for `ticker`. An empty ticker is a
/// caller error.
pub fn canonicalize_symbol(
    catalog: &SymbolCatalog,
    ticker: &str,
    hint: Option<&str>,
    venue_set: VenueSet,
) -> Result<String, EngineError> {
    if ticker.trim().is_empty() {
        return Err(EngineError::EmptyTicker);
    }
    Ok(catalog.canonicalize(ticker, hint, venue_set).to_string())
}
