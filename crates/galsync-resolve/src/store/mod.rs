use async_trait::async_trait;
use galsync_core::PoolEntry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A record as held by the storage backend, keyed by storage field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// The external record database, seen only through what resolution needs.
///
/// Implementations report transport failures as errors; callers decide at
/// the boundary whether they degrade to "no result" or abort the run.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query_by_exact_title(&self, title: &str) -> Result<Vec<StoredRecord>>;

    /// Every stored `{title, id}`, flattened across pages.
    async fn all_titles(&self) -> Result<Vec<PoolEntry>>;

    async fn record_exists(&self, id: &str) -> Result<bool>;

    /// Update `id` when given, otherwise create. Returns the record id.
    async fn create_or_update(&self, id: Option<&str>, fields: &Map<String, Value>) -> Result<String>;
}

pub mod json_records;

pub use json_records::JsonRecordStore;
