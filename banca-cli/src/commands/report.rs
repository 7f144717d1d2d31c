use banca_core::Backoffice;
use banca_lottery::schedule::business_today;
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Sales summary for one business day
    Daily {
        /// Date as YYYY-MM-DD (defaults to the current business day)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_report_command(cmd: ReportCommands, office: &Backoffice) -> anyhow::Result<()> {
    match cmd {
        ReportCommands::Daily { date, json } => {
            let date = date
                .unwrap_or_else(|| business_today(Utc::now(), office.config().business_utc_offset_minutes));
            let summary = office.daily_summary(date).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            let totals = &summary.totals;
            println!("Sales for {}:", summary.date);
            println!("  Tickets: {} ({} cancelled)", totals.ticket_count, summary.cancelled_count);
            println!("  Betting pools with sales: {}", summary.betting_pools_with_sales);
            println!("  Sold: {}", totals.sold);
            println!("  Commissions: {}", totals.commissions);
            println!("  Discounts: {}", totals.discounts);
            println!("  Prizes: {}", totals.prizes);
            println!("  Net: {}", totals.net);
            println!("  Final: {}", totals.final_amount);

            if !summary.draws.is_empty() {
                println!();
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Draw", "Lines", "Sold", "Commissions", "Prizes"]);
                for row in &summary.draws {
                    table.add_row(vec![
                        row.draw_name.clone(),
                        row.line_count.to_string(),
                        row.sold.to_string(),
                        row.commissions.to_string(),
                        row.prizes.to_string(),
                    ]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
