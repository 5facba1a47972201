use super::ui;
use crate::core::quote::Fundamentals;
use crate::resolver::Resolver;
use anyhow::Result;
use comfy_table::{Attribute, Cell, Table};
use rust_decimal::Decimal;

pub async fn run(resolver: &Resolver, ticker: &str, hint: Option<&str>) -> Result<()> {
    let pb = ui::new_spinner(&format!("Resolving fundamentals for {}", ticker.trim()));
    let fundamentals = resolver.resolve_fundamentals(ticker, hint).await;
    pb.finish_and_clear();

    match fundamentals? {
        Some(fundamentals) => {
            println!(
                "\nFundamentals: {}",
                ui::style_text(&ticker.trim().to_uppercase(), ui::StyleType::Title)
            );
            println!("{}", fundamentals_table(&fundamentals));
        }
        None => ui::print_unavailable("fundamentals", ticker),
    }
    Ok(())
}

fn rows(f: &Fundamentals) -> Vec<(&'static str, Vec<(&'static str, Decimal)>)> {
    vec![
        (
            "Valuation",
            vec![
                ("Dividend yield", f.valuation.dy),
                ("P/E", f.valuation.pe),
                ("P/BV", f.valuation.pvp),
                ("EV/EBITDA", f.valuation.ev_ebitda),
                ("EV/EBIT", f.valuation.ev_ebit),
                ("Book value / share", f.valuation.book_value_per_share),
            ],
        ),
        (
            "Debt",
            vec![
                ("Net debt / equity", f.debt.net_debt_to_equity),
                ("Net debt / EBITDA", f.debt.net_debt_to_ebitda),
                ("Equity / assets", f.debt.equity_to_assets),
            ],
        ),
        (
            "Efficiency",
            vec![
                ("Gross margin", f.efficiency.gross_margin),
                ("Net margin", f.efficiency.net_margin),
            ],
        ),
        (
            "Profitability",
            vec![
                ("ROE", f.profitability.roe),
                ("ROIC", f.profitability.roic),
            ],
        ),
    ]
}

pub fn fundamentals_table(fundamentals: &Fundamentals) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Group"),
        ui::header_cell("Indicator"),
        ui::header_cell("Value"),
    ]);

    for (group, indicators) in rows(fundamentals) {
        for (i, (name, value)) in indicators.into_iter().enumerate() {
            let group_cell = if i == 0 {
                Cell::new(group).add_attribute(Attribute::Bold)
            } else {
                Cell::new("")
            };
            table.add_row(vec![group_cell, Cell::new(name), ui::decimal_cell(value)]);
        }
    }
    table
}
