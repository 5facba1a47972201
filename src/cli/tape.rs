use super::{quote::quotes_table, ui};
use crate::resolver::Resolver;
use anyhow::Result;

pub async fn run(resolver: &Resolver, tickers: &[String]) -> Result<()> {
    if tickers.is_empty() {
        println!("No tickers configured for the tape.");
        return Ok(());
    }

    let pb = ui::new_spinner(&format!("Resolving {} symbols", tickers.len()));
    let quotes = resolver.resolve_index_batch(tickers).await;
    pb.finish_and_clear();
    let quotes = quotes?;

    if quotes.is_empty() {
        println!(
            "{}",
            ui::style_text("No quotes available for the tape", ui::StyleType::Subtle)
        );
        return Ok(());
    }

    println!("{}", ui::style_text("Market tape", ui::StyleType::Title));
    println!("{}", quotes_table(&quotes));

    if quotes.len() < tickers.len() {
        println!(
            "{}",
            ui::style_text(
                &format!("{} of {} symbols resolved", quotes.len(), tickers.len()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
