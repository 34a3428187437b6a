//! Batch sync of scraped items into the record store.
//!
//! Each item runs duplicate check → subject match → tag processing → brand
//! resolution → create/update. Items run concurrently up to
//! `pipeline.max_concurrent`; every prompt still goes through the session's
//! interaction gate, so only the network-bound steps overlap.
//!
//! A new title is written with its base fields while the duplicate check's
//! record lock is still held, and enriched afterwards. Two items with the
//! same title therefore never both create.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use galsync_core::{RecordField, RecordFields, extract_main_keyword};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dedup::DuplicateOutcome;
use crate::error::Result;
use crate::session::Session;
use crate::sources::SearchSource;
use crate::store::RecordStore;
use crate::taxonomy::SourceTags;

/// One scraped game as handed over by the storefront scrapers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncItem {
    pub title: String,
    /// Keyword for the metadata search; derived from the title when absent.
    pub search_keyword: Option<String>,
    pub brand: Option<String>,
    pub tags: SourceTags,
    /// Further field values keyed by record field key (`summary`, `price`, ...).
    pub fields: BTreeMap<String, Value>,
}

impl SyncItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    fn keyword(&self) -> String {
        match self.search_keyword.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => extract_main_keyword(&self.title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ItemOutcome {
    Created { id: String },
    Updated { id: String },
    Skipped,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    /// `(title, error)` for items that failed without aborting the run.
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    fn record(&mut self, title: String, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created { .. } => self.created.push(title),
            ItemOutcome::Updated { .. } => self.updated.push(title),
            ItemOutcome::Skipped => self.skipped.push(title),
        }
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.skipped.len() + self.failed.len()
    }
}

#[derive(Clone)]
pub struct SyncPipeline {
    session: Arc<Session>,
    store: Arc<dyn RecordStore>,
    source: Option<Arc<dyn SearchSource>>,
}

impl SyncPipeline {
    pub fn new(session: Arc<Session>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            session,
            store,
            source: None,
        }
    }

    /// Enable subject matching against a metadata search source.
    pub fn with_source(mut self, source: Arc<dyn SearchSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Process every item. A fatal error stops the run; any other error
    /// marks the item failed and the run goes on.
    pub async fn run(&self, items: Vec<SyncItem>) -> Result<SyncReport> {
        let limit = self.session.config().pipeline.max_concurrent.max(1);
        let total = items.len();
        info!(items = total, limit, "sync started");

        let mut stream = futures::stream::iter(items)
            .map(|item| async move {
                let result = self.process(&item).await;
                (item.title, result)
            })
            .buffer_unordered(limit);

        let mut report = SyncReport::default();
        while let Some((title, result)) = stream.next().await {
            match result {
                Ok(outcome) => {
                    info!(title = %title, ?outcome, "item done");
                    report.record(title, outcome);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(title = %title, error = %e, "item failed");
                    report.failed.push((title, e.to_string()));
                }
            }
        }

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "sync finished"
        );
        Ok(report)
    }

    pub async fn process(&self, item: &SyncItem) -> Result<ItemOutcome> {
        let title = item.title.trim();
        let mut fields = self.base_fields(item);
        fields.insert(RecordField::Title, Value::String(title.to_string()));

        let Some((id, created)) = self.claim(title, &fields).await? else {
            return Ok(ItemOutcome::Skipped);
        };
        tokio::task::yield_now().await;

        if let Some(source) = &self.source {
            let keyword = item.keyword();
            if let Some(hit) = self.session.match_subject(&keyword, source.as_ref()).await?
                && let Some(url) = hit.url
            {
                fields.insert(RecordField::BangumiUrl, Value::String(url));
            }
            tokio::task::yield_now().await;
        }

        let tags = self.session.process_tags(&item.tags).await?;
        if !tags.is_empty() {
            fields.insert(
                RecordField::Tags,
                Value::Array(tags.into_iter().map(Value::String).collect()),
            );
        }

        if let Some(brand) = item.brand.as_deref()
            && let Some(canonical) = self.session.resolve_brand(brand).await?
        {
            fields.insert(RecordField::Brand, Value::String(canonical));
        }

        let payload = self.session.schema().render(&fields);
        let id = self.store.create_or_update(Some(&id), &payload).await?;
        Ok(if created {
            ItemOutcome::Created { id }
        } else {
            ItemOutcome::Updated { id }
        })
    }

    /// Duplicate check and, for a new title, the initial write, under the
    /// session's record lock. Returns the target id and whether it was
    /// created here, or `None` when the item is skipped.
    async fn claim(&self, title: &str, fields: &RecordFields) -> Result<Option<(String, bool)>> {
        let _records = self.session.lock_records().await;
        let outcome = self
            .session
            .check_duplicate(title, self.store.as_ref())
            .await?;
        match outcome {
            DuplicateOutcome::Skip => Ok(None),
            DuplicateOutcome::Update { id } => Ok(Some((id, false))),
            DuplicateOutcome::Create => {
                let payload = self.session.schema().render(fields);
                let id = self.store.create_or_update(None, &payload).await?;
                self.session.record_created(title, &id, None)?;
                debug!(title, id = %id, "record created");
                Ok(Some((id, true)))
            }
        }
    }

    fn base_fields(&self, item: &SyncItem) -> RecordFields {
        let mut fields = RecordFields::new();
        for (key, value) in &item.fields {
            match RecordField::from_key(key) {
                Some(field) if !value.is_null() => {
                    fields.insert(field, value.clone());
                }
                Some(_) => {}
                None => warn!(title = %item.title, key = %key, "unknown record field, dropped"),
            }
        }
        fields
    }
}
