use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::CuratorError;
use crate::fetch::{HttpRequest, ResilientFetch};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default page ceiling for `next`-cursor pagination.
pub const MAX_PAGES: usize = 220;

pub const TRACKS_BATCH_SIZE: usize = 50;
pub const ARTISTS_BATCH_SIZE: usize = 50;
pub const ALBUMS_BATCH_SIZE: usize = 20;
// 100 is the documented cap but longer id lists overflow the URL length limit.
pub const AUDIO_FEATURES_BATCH_SIZE: usize = 85;

pub struct CatalogClient {
    fetch: ResilientFetch,
    base_url: String,
    access_token: Option<String>,
}

impl CatalogClient {
    pub fn new(fetch: ResilientFetch, base_url: &str, access_token: Option<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_count(&self) -> u64 {
        self.fetch.request_count()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET with auth. Single-key envelopes such as `{"artists": [...]}` are
    /// unwrapped; paging objects (with `items`) are returned as is.
    pub fn get(&self, url: &str) -> Option<Value> {
        let mut request = HttpRequest::get(url);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = self.fetch.fetch(&request)?;
        Some(Self::unwrap_envelope(response))
    }

    fn unwrap_envelope(response: Value) -> Value {
        match response {
            Value::Object(mut obj) if obj.len() == 1 && !obj.contains_key("items") => {
                let key = obj.keys().next().cloned().unwrap_or_default();
                obj.remove(&key).unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    pub fn get_page(&self, url: &str) -> Option<Value> {
        self.get(url)
    }

    /// Concatenates `items` across pages, following `next` until it is null
    /// or `max_pages` pages (the first included) have been read.
    pub fn get_all_pages(&self, first_page: Value, max_pages: usize) -> Vec<Value> {
        let mut items = Self::page_items(&first_page);
        let mut next = Self::next_url(&first_page);
        let mut count = 1;

        while let Some(url) = next {
            if count >= max_pages {
                log::debug!("Stopped paging at {} pages, more available", count);
                break;
            }
            let Some(page) = self.get_page(&url) else {
                log::warn!("Page {} failed, returning {} items collected so far", url, items.len());
                break;
            };
            items.extend(Self::page_items(&page));
            next = Self::next_url(&page);
            count += 1;
        }

        items
    }

    pub fn get_items_by_path(&self, path: &str, max_pages: usize) -> Vec<Value> {
        match self.get(&self.url(path)) {
            Some(first_page) => self.get_all_pages(first_page, max_pages),
            None => Vec::new(),
        }
    }

    /// One request per `batch_size` ids. The result lines up with `ids`:
    /// ids the catalog could not resolve, malformed records and every id of
    /// a failed batch come back as `None`.
    pub fn get_full_records_by_ids<T>(&self, kind: &str, ids: &[String], batch_size: usize) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut records = Vec::with_capacity(ids.len());
        for batch in ids.chunks(batch_size.max(1)) {
            let joined = batch
                .iter()
                .map(|id| urlencoding::encode(id).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            let url = format!("{}/{}?ids={}", self.base_url, kind, joined);

            let Some(Value::Array(entries)) = self.get(&url) else {
                log::warn!("Batch lookup for {} returned no list ({} ids)", kind, batch.len());
                records.extend(batch.iter().map(|_| None));
                continue;
            };

            let mut entries = entries.into_iter();
            for _ in batch {
                let record = match entries.next().map(|entry| decode_record(kind, entry)) {
                    Some(Ok(record)) => record,
                    Some(Err(e)) => {
                        log::warn!("Skipping {}", e);
                        None
                    }
                    None => None,
                };
                records.push(record);
            }
        }
        records
    }

    fn page_items(page: &Value) -> Vec<Value> {
        page.get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn next_url(page: &Value) -> Option<String> {
        page.get("next").and_then(Value::as_str).map(String::from)
    }
}

/// `null` is an unresolved id. Anything else must deserialize as `T`.
pub fn decode_record<T: DeserializeOwned>(kind: &str, entry: Value) -> Result<Option<T>, CuratorError> {
    if entry.is_null() {
        return Ok(None);
    }
    serde_json::from_value(entry)
        .map(Some)
        .map_err(|e| CuratorError::DataShape(format!("{} record: {}", kind, e)))
}
