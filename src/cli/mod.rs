pub mod fundamentals;
pub mod quote;
pub mod setup;
pub mod symbol;
pub mod tape;
pub mod ui;
