use banca_core::backoffice::{CreateZone, ZoneQuery};
use banca_core::Backoffice;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum ZoneCommands {
    /// List zones
    List {
        /// Include inactive zones
        #[arg(short, long)]
        all: bool,
    },
    /// Create a zone
    Create {
        /// Zone name
        name: String,
    },
    /// Deactivate a zone
    Deactivate {
        /// Zone id
        id: i64,
    },
}

pub async fn handle_zone_command(cmd: ZoneCommands, office: &Backoffice) -> anyhow::Result<()> {
    match cmd {
        ZoneCommands::List { all } => {
            let page = office
                .list_zones(ZoneQuery {
                    include_inactive: all,
                    page_size: Some(100),
                    ..Default::default()
                })
                .await?;

            if page.items.is_empty() {
                println!("No zones found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Id", "Name", "Betting pools", "Active"]);
            for zone in page.items {
                table.add_row(vec![
                    zone.id.to_string(),
                    zone.name,
                    zone.betting_pool_count.to_string(),
                    if zone.is_active { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{}", table);
        }

        ZoneCommands::Create { name } => {
            let zone = office.create_zone(CreateZone { name }).await?;
            println!("Created zone '{}' (id {})", zone.name, zone.id);
        }

        ZoneCommands::Deactivate { id } => {
            office.deactivate_zone(id).await?;
            println!("Zone {} deactivated", id);
        }
    }

    Ok(())
}
