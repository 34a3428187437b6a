use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use galsync_core::storage::write_json_pretty;
use galsync_core::{FieldSchema, PoolEntry, RecordField};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ResolveError, Result};
use crate::store::{RecordStore, StoredRecord};

const UPDATED_AT_FIELD: &str = "updated_at";

/// Record store backed by one JSON file per record: `{dir}/{id}.json`.
pub struct JsonRecordStore {
    dir: PathBuf,
    title_field: String,
}

impl JsonRecordStore {
    pub fn new(dir: impl Into<PathBuf>, schema: &FieldSchema) -> Self {
        Self {
            dir: dir.into(),
            title_field: schema.name(RecordField::Title).to_string(),
        }
    }

    /// Ids name files directly under `dir`; anything that could leave it is rejected.
    fn record_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(ResolveError::NotFound(format!("invalid record id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn title_of<'a>(&self, record: &'a StoredRecord) -> Option<&'a str> {
        record
            .fields
            .get(&self.title_field)
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    async fn list_records(&self) -> Result<Vec<StoredRecord>> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match load_record(&path).await {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid record"),
                }
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

async fn load_record(path: &Path) -> Result<StoredRecord> {
    let contents = tokio::fs::read_to_string(path).await.map_err(io_err)?;
    serde_json::from_str(&contents).map_err(|e| ResolveError::Parse(e.to_string()))
}

fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

fn io_err(e: std::io::Error) -> ResolveError {
    ResolveError::Core(e.into())
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn query_by_exact_title(&self, title: &str) -> Result<Vec<StoredRecord>> {
        let wanted = title.trim();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .list_records()
            .await?
            .into_iter()
            .filter(|r| self.title_of(r) == Some(wanted))
            .collect())
    }

    async fn all_titles(&self) -> Result<Vec<PoolEntry>> {
        Ok(self
            .list_records()
            .await?
            .iter()
            .filter_map(|r| self.title_of(r).map(|t| PoolEntry::new(t, r.id.clone())))
            .collect())
    }

    async fn record_exists(&self, id: &str) -> Result<bool> {
        let Ok(path) = self.record_path(id) else {
            return Ok(false);
        };
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }

    async fn create_or_update(&self, id: Option<&str>, fields: &Map<String, Value>) -> Result<String> {
        let mut record = match id {
            Some(id) => {
                let path = self.record_path(id)?;
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(ResolveError::NotFound(id.to_string()));
                }
                load_record(&path).await?
            }
            None => StoredRecord {
                id: uuid::Uuid::new_v4().to_string(),
                fields: Map::new(),
            },
        };

        for (key, value) in fields {
            record.fields.insert(key.clone(), value.clone());
        }
        record
            .fields
            .insert(UPDATED_AT_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));

        write_json_pretty(&self.record_path(&record.id)?, &record)?;
        Ok(record.id)
    }
}
