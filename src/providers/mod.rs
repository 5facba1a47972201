pub mod brapi;
pub mod util;
pub mod yahoo_finance;

pub use brapi::BrapiProvider;
pub use yahoo_finance::YahooFinanceProvider;
