use banca_core::backoffice::{CreatePool, PoolQuery};
use banca_core::Backoffice;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum PoolCommands {
    /// List betting pools
    List {
        /// Only pools in this zone
        #[arg(short, long)]
        zone: Option<i64>,
    },
    /// Create a betting pool
    Create {
        /// Pool name
        name: String,
        /// Zone id
        #[arg(short, long)]
        zone: i64,
        /// Pool code (generated when omitted)
        #[arg(short, long)]
        code: Option<String>,
    },
    /// Show the next generated pool code
    NextCode,
}

pub async fn handle_pool_command(cmd: PoolCommands, office: &Backoffice) -> anyhow::Result<()> {
    match cmd {
        PoolCommands::List { zone } => {
            let page = office
                .list_pools(PoolQuery {
                    zone_id: zone,
                    page_size: Some(100),
                    ..Default::default()
                })
                .await?;

            let shown = page.items.len();
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Id", "Code", "Name", "Zone", "Balance", "Active"]);
            for pool in page.items {
                table.add_row(vec![
                    pool.id.to_string(),
                    pool.code,
                    pool.name,
                    pool.zone_name.unwrap_or_else(|| pool.zone_id.to_string()),
                    pool.balance.to_string(),
                    if pool.is_active { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{}", table);
            println!("{} of {} betting pools", shown, page.total_count);
        }

        PoolCommands::Create { name, zone, code } => {
            let pool = office
                .create_pool(CreatePool {
                    code,
                    name,
                    zone_id: zone,
                    address: None,
                    phone: None,
                    config: None,
                })
                .await?;
            println!("Created betting pool {} '{}' (id {})", pool.code, pool.name, pool.id);
        }

        PoolCommands::NextCode => {
            println!("{}", office.next_pool_code().await?);
        }
    }

    Ok(())
}
