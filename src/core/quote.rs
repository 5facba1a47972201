//! Normalized market data records returned by the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Point-in-time price for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Internal ticker as requested by the caller (trimmed, upper-cased).
    pub symbol: String,
    pub price: Decimal,
    pub change_percent: Decimal,
    pub as_of: DateTime<Utc>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub dy: Decimal,
    pub pe: Decimal,
    pub pvp: Decimal,
    pub ev_ebitda: Decimal,
    pub ev_ebit: Decimal,
    pub book_value_per_share: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Debt {
    pub net_debt_to_equity: Decimal,
    pub net_debt_to_ebitda: Decimal,
    pub equity_to_assets: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Efficiency {
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profitability {
    pub roe: Decimal,
    pub roic: Decimal,
}

/// Fundamental indicators grouped the way analysis views consume them.
///
/// Fields the upstream omits are zero; only the outer resolution result can
/// be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fundamentals {
    pub valuation: Valuation,
    pub debt: Debt,
    pub efficiency: Efficiency,
    pub profitability: Profitability,
}

/// Converts an optional upstream float into a decimal, mapping missing or
/// non-finite values to zero.
pub fn decimal_or_zero(value: Option<f64>) -> Decimal {
    value
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ZERO)
}

/// `numerator / denominator`, or zero when either side is missing or the
/// denominator is zero.
pub fn ratio_or_zero(numerator: Option<f64>, denominator: Option<f64>) -> Decimal {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => decimal_or_zero(Some(n / d)),
        _ => Decimal::ZERO,
    }
}

/// Raw fundamentals components as published upstream, before derivation.
///
/// Adapters fill what their payload carries; ratios the provider does not
/// publish are derived here.
#[derive(Debug, Clone, Default)]
pub struct FundamentalInputs {
    pub dividend_yield: Option<f64>,
    pub price_earnings: Option<f64>,
    pub price_to_book: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub enterprise_to_ebitda: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub ebitda: Option<f64>,
    pub ebit: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_equity: Option<f64>,
    pub gross_margins: Option<f64>,
    pub profit_margins: Option<f64>,
    pub return_on_equity: Option<f64>,
}

impl FundamentalInputs {
    fn equity(&self) -> Option<f64> {
        self.total_equity.or(match (self.book_value_per_share, self.shares_outstanding) {
            (Some(bvps), Some(shares)) => Some(bvps * shares),
            _ => None,
        })
    }

    fn net_debt(&self) -> Option<f64> {
        self.total_debt
            .map(|debt| debt - self.total_cash.unwrap_or(0.0))
    }

    pub fn into_fundamentals(self) -> Fundamentals {
        let equity = self.equity();
        let net_debt = self.net_debt();
        let invested_capital = match (equity, net_debt) {
            (Some(e), Some(d)) => Some(e + d),
            (Some(e), None) => Some(e),
            _ => None,
        };

        Fundamentals {
            valuation: Valuation {
                dy: decimal_or_zero(self.dividend_yield),
                pe: decimal_or_zero(self.price_earnings),
                pvp: decimal_or_zero(self.price_to_book),
                ev_ebitda: match self.enterprise_to_ebitda {
                    Some(v) => decimal_or_zero(Some(v)),
                    None => ratio_or_zero(self.enterprise_value, self.ebitda),
                },
                ev_ebit: ratio_or_zero(self.enterprise_value, self.ebit),
                book_value_per_share: decimal_or_zero(self.book_value_per_share),
            },
            debt: Debt {
                net_debt_to_equity: ratio_or_zero(net_debt, equity),
                net_debt_to_ebitda: ratio_or_zero(net_debt, self.ebitda),
                equity_to_assets: ratio_or_zero(equity, self.total_assets),
            },
            efficiency: Efficiency {
                gross_margin: decimal_or_zero(self.gross_margins),
                net_margin: decimal_or_zero(self.profit_margins),
            },
            profitability: Profitability {
                roe: decimal_or_zero(self.return_on_equity),
                roic: ratio_or_zero(self.ebit, invested_capital),
            },
        }
    }
}
