use anyhow::bail;
use banca_core::Backoffice;
use clap::Subcommand;
use dialoguer::Password;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create the first administrator when no users exist
    Bootstrap {
        /// Administrator username
        #[arg(short, long, default_value = "admin")]
        username: String,
        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

pub async fn handle_admin_command(cmd: AdminCommands, office: &Backoffice) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Bootstrap { username, password } => {
            let password = match password {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Administrator password")
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()?,
            };
            if password.len() < 6 {
                bail!("Password must be at least 6 characters");
            }

            match office.bootstrap_admin(&username, &password).await? {
                Some(user) => println!("Created administrator '{}' (id {})", user.username, user.id),
                None => println!("Users already exist, nothing to do"),
            }
        }
    }

    Ok(())
}
