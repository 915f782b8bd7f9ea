//! Incremental sync of recently played tracks into rolling logs.
//!
//! Each tick pulls the newest page of play history per active source and
//! prepends whatever is newer than the stored head:
//!
//! ```text
//! page (newest first):  [t4] [t3] [t2]        stored log: [t3] [t2] ...
//!                              ▲ boundary (first match scanning from the oldest end)
//! new entries:          [t4]  → prepend, truncate to items_limit
//! ```
//!
//! A log holds each track once, at its latest play: a replayed track moves
//! to the head. A gap longer than one page cannot be detected; the whole
//! page is then taken as new. With both sources active a combined log is
//! rebuilt from scratch every tick.

pub mod models;
pub mod store;

use std::collections::HashSet;

use crate::catalog::sources::extract_tracks;
use crate::catalog::{CatalogClient, Track};
use crate::config::HistoryConfig;
use crate::curation::{dedup, order, select};
use crate::errors::CuratorError;
use models::TickReport;
use store::{LogStore, Position};

/// A producer of recently played tracks, newest first.
pub trait PlaySource {
    fn name(&self) -> &str;

    fn fetch_recent(&self, limit: usize) -> Vec<Track>;
}

/// Recently played tracks from the catalog account.
pub struct CatalogRecentSource {
    client: CatalogClient,
}

impl CatalogRecentSource {
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }

    pub fn request_count(&self) -> u64 {
        self.client.request_count()
    }
}

impl PlaySource for CatalogRecentSource {
    fn name(&self) -> &str {
        "catalog"
    }

    fn fetch_recent(&self, limit: usize) -> Vec<Track> {
        let path = format!("me/player/recently-played?limit={}", limit);
        extract_tracks(&self.client.get_items_by_path(&path, 1))
    }
}

/// Index of the stored head within a newest-first page, scanning from the
/// oldest end. Entries before it are candidates for insertion.
pub fn find_boundary(page: &[Track], head: &Track) -> Option<usize> {
    let head_at = head.timestamp_millis();
    page.iter().rposition(|t| t.timestamp_millis() == head_at)
}

/// Entries of `page` strictly newer than `head`, newest first, keeping only
/// the latest play of each track.
pub fn new_entries(page: &[Track], head: Option<&Track>) -> Vec<Track> {
    let candidates = match head.and_then(|head| find_boundary(page, head)) {
        Some(boundary) => &page[..boundary],
        None => page,
    };
    let head_at = head.map(Track::timestamp_millis);

    let mut fresh: Vec<Track> = candidates
        .iter()
        .filter(|t| head_at.map_or(true, |head_at| t.timestamp_millis() > head_at))
        .cloned()
        .collect();
    order::sort_by_timestamp_desc(&mut fresh);
    let mut seen = HashSet::new();
    fresh.retain(|t| seen.insert(t.id.clone()));
    fresh
}

pub struct RecentPlaySync<S: LogStore> {
    store: S,
    config: HistoryConfig,
    primary: Box<dyn PlaySource>,
    secondary: Option<Box<dyn PlaySource>>,
}

impl<S: LogStore> RecentPlaySync<S> {
    pub fn new(store: S, config: HistoryConfig, primary: Box<dyn PlaySource>) -> Self {
        Self {
            store,
            config,
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, source: Box<dyn PlaySource>) -> Self {
        self.secondary = Some(source);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn combined_active(&self) -> bool {
        self.config.both_enabled() && self.secondary.is_some()
    }

    /// One sync pass over every active source. Failures are logged and
    /// the affected log is left as it was.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.config.primary_enabled {
            let name = self.config.primary_log.clone();
            let added = sync_source(&mut self.store, &self.config, &*self.primary, &name);
            report.added.push((name, added));
        }

        if self.config.secondary_enabled {
            match self.secondary.as_deref() {
                Some(source) => {
                    let name = self.config.secondary_log.clone();
                    let added = sync_source(&mut self.store, &self.config, source, &name);
                    report.added.push((name, added));
                }
                None => log::error!(
                    "{}",
                    CuratorError::Config("secondary history source enabled but not attached".to_string())
                ),
            }
        }

        if self.combined_active() {
            match self.rebuild_combined() {
                Ok(len) => report.combined = Some(len),
                Err(e) => log::error!("Combined log not rebuilt: {}", e),
            }
        }

        log::info!("Tick stored {} new plays", report.total_added());
        report
    }

    /// Concatenates both logs, drops duplicate tracks, sorts newest first
    /// and overwrites the combined log.
    fn rebuild_combined(&mut self) -> Result<usize, CuratorError> {
        let mut combined = self.store.read(&self.config.primary_log)?;
        combined.extend(self.store.read(&self.config.secondary_log)?);
        dedup::dedup_tracks(&mut combined);
        order::sort_by_timestamp_desc(&mut combined);
        self.store.write(&self.config.combined_log, &combined)?;
        Ok(combined.len())
    }

    fn active_logs(&self) -> Vec<String> {
        let mut logs = Vec::new();
        if self.config.primary_enabled {
            logs.push(self.config.primary_log.clone());
        }
        if self.config.secondary_enabled {
            logs.push(self.config.secondary_log.clone());
        }
        if self.combined_active() {
            logs.push(self.config.combined_log.clone());
        }
        logs
    }

    /// Backs up each active log as `Copy<name>`, then rewrites it with
    /// compressed records.
    pub fn compress_all(&mut self) -> Result<(), CuratorError> {
        for name in self.active_logs() {
            if !self.store.copy(&name, &format!("Copy{}", name))? {
                log::debug!("Log {} does not exist yet, nothing to compress", name);
                continue;
            }
            let mut items = self.store.read(&name)?;
            items.iter_mut().for_each(Track::compress);
            self.store.write(&name, &items)?;
            log::info!("Compressed {} ({} entries)", name, items.len());
        }
        Ok(())
    }

    /// The newest `limit` plays from the combined log when both sources are
    /// active, else from the single active one. Zero means all.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<Track>, CuratorError> {
        let name = if self.combined_active() {
            &self.config.combined_log
        } else if self.config.primary_enabled {
            &self.config.primary_log
        } else {
            &self.config.secondary_log
        };
        let mut items = self.store.read(name)?;
        if limit > 0 {
            select::keep_first(&mut items, limit);
        }
        Ok(items)
    }
}

fn sync_source<S: LogStore>(store: &mut S, config: &HistoryConfig, source: &dyn PlaySource, log_name: &str) -> usize {
    let stored = match store.read(log_name) {
        Ok(stored) => stored,
        Err(e) => {
            log::error!("Skipping {}: {}", log_name, e);
            return 0;
        }
    };

    let page = source.fetch_recent(config.page_limit);
    if page.is_empty() {
        log::debug!("No recent plays from {}", source.name());
        return 0;
    }

    let mut fresh = new_entries(&page, stored.first());
    if fresh.is_empty() {
        return 0;
    }
    fresh.iter_mut().for_each(Track::compress);
    let added = fresh.len();

    let replayed: HashSet<&str> = fresh.iter().map(|t| t.id.as_str()).collect();
    if stored.iter().any(|t| replayed.contains(t.id.as_str())) {
        let rest: Vec<Track> = stored
            .iter()
            .filter(|t| !replayed.contains(t.id.as_str()))
            .cloned()
            .collect();
        if let Err(e) = store.write(log_name, &rest) {
            log::error!("Failed to drop replayed tracks from {}: {}", log_name, e);
            return 0;
        }
    }

    match store.append_capped(log_name, fresh, Position::Begin, config.items_limit) {
        Ok(len) => {
            log::info!("{}: +{} plays from {}, {} stored", log_name, added, source.name(), len);
            added
        }
        Err(e) => {
            log::error!("Failed to store plays for {}: {}", log_name, e);
            0
        }
    }
}
