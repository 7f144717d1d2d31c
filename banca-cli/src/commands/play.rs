use banca_lottery::expand_plays;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum PlayCommands {
    /// Expand play notation such as `12.`, `33d66` or `123-10`
    Expand {
        /// One or more plays
        #[arg(required = true)]
        plays: Vec<String>,
    },
}

pub fn handle_play_command(cmd: PlayCommands) -> anyhow::Result<()> {
    match cmd {
        PlayCommands::Expand { plays } => {
            let parsed = expand_plays(plays.iter().map(String::as_str))?;
            for (input, play) in plays.iter().zip(&parsed) {
                println!("{} -> {} ({} numbers)", input, play.bet_type, play.numbers.len());
                println!("  {}", play.numbers.join(" "));
            }
        }
    }

    Ok(())
}
