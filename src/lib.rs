pub mod catalog;
pub mod config;
pub mod context;
pub mod curation;
pub mod errors;
pub mod fetch;
pub mod history;
pub mod metadata;

use config::CuratorConfig;
use errors::CuratorError;
use history::store::JsonFileStore;
use history::{CatalogRecentSource, RecentPlaySync};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// One sync pass over the recent-play logs.
    Tick,
    /// Back up and compress the stored logs.
    Compress,
    /// Print the newest plays.
    Recent { limit: usize },
}

pub fn run(command: Command, config: &CuratorConfig) -> Result<(), CuratorError> {
    if config.access_token.is_none() && command != Command::Compress {
        log::warn!(
            "No access token configured; set {} or access_token in the config file",
            config::ACCESS_TOKEN_ENV
        );
    }

    let store = JsonFileStore::new(config.data_dir());
    let source = CatalogRecentSource::new(context::catalog_client(config)?);
    let mut sync = RecentPlaySync::new(store, config.history.clone(), Box::new(source));

    match command {
        Command::Tick => {
            let report = sync.tick();
            if let Some(len) = report.combined {
                log::info!("Combined log holds {} plays", len);
            }
        }
        Command::Compress => sync.compress_all()?,
        Command::Recent { limit } => {
            for track in sync.read_recent(limit)? {
                let artist = track.primary_artist().map(|a| a.name.as_str()).unwrap_or("?");
                println!("{}  {} - {}", track.timestamp_raw(), artist, track.name);
            }
        }
    }
    Ok(())
}
