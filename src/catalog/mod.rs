pub mod client;
pub mod models;
pub mod sources;

pub use client::CatalogClient;
pub use models::{Album, Artist, AttrValue, Attributes, AudioFeatures, Track};
