use super::ui;
use crate::core::quote::Quote;
use crate::resolver::Resolver;
use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn run(resolver: &Resolver, ticker: &str, hint: Option<&str>) -> Result<()> {
    let pb = ui::new_spinner(&format!("Resolving {}", ticker.trim()));
    let quote = resolver.resolve_quote(ticker, hint).await;
    pb.finish_and_clear();

    match quote? {
        Some(quote) => println!("{}", quotes_table(std::slice::from_ref(&quote))),
        None => ui::print_unavailable("quote", ticker),
    }
    Ok(())
}

/// One row per quote, in the given order.
pub fn quotes_table(quotes: &[Quote]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("As of"),
    ]);

    for quote in quotes {
        table.add_row(vec![
            Cell::new(&quote.symbol),
            ui::decimal_cell(quote.price),
            ui::change_cell(quote.change_percent),
            Cell::new(quote.as_of.format("%Y-%m-%d %H:%M UTC").to_string()),
        ]);
    }
    table
}
