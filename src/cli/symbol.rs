use super::ui;
use crate::core::error::EngineError;
use crate::core::symbol::{SymbolCatalog, VenueSet};
use anyhow::Result;
use comfy_table::Cell;

pub fn run(
    catalog: &SymbolCatalog,
    ticker: &str,
    hint: Option<&str>,
    venue_set: VenueSet,
) -> Result<()> {
    if ticker.trim().is_empty() {
        return Err(EngineError::EmptyTicker.into());
    }
    let symbol = catalog.canonicalize(ticker, hint, venue_set);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Venue"),
        ui::header_cell("Symbol"),
    ]);
    table.add_row(vec![
        Cell::new(symbol.ticker()),
        Cell::new(symbol.venue().prefix().unwrap_or("INDEX")),
        Cell::new(symbol.to_string()),
    ]);
    println!("{table}");
    Ok(())
}
