use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use playcurate_lib::config::CuratorConfig;
use playcurate_lib::Command;

#[derive(Parser)]
#[command(name = "playcurate", version, about = "Curate catalog tracks and keep a rolling play history")]
struct Cli {
    /// Config file, defaults to <config dir>/playcurate/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Pull new plays into the history logs
    Tick,
    /// Back up each log as Copy<name>, then strip unused fields
    Compress,
    /// Print the newest plays
    Recent {
        #[arg(default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CuratorConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let command = match cli.command {
        CliCommand::Tick => Command::Tick,
        CliCommand::Compress => Command::Compress,
        CliCommand::Recent { limit } => Command::Recent { limit },
    };
    playcurate_lib::run(command, &config).context("running command")?;
    Ok(())
}
