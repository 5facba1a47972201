//! Core domain types and shared infrastructure

pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod provider;
pub mod quote;
pub mod symbol;

// Re-export main types for cleaner imports
pub use error::{EngineError, ResolutionFailure};
pub use provider::MarketDataProvider;
pub use quote::{Fundamentals, Quote};
pub use symbol::{CanonicalSymbol, SymbolCatalog, VenueSet};
