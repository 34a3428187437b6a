use std::collections::BTreeSet;
use std::sync::Arc;

use galsync_core::{AppConfig, FieldSchema, PoolEntry};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::dedup::{DuplicateOutcome, TitleResolver};
use crate::error::Result;
use crate::interaction::{InteractionGate, InteractionGateway};
use crate::pool::SharedPool;
use crate::sources::{SearchHit, SearchSource};
use crate::store::RecordStore;
use crate::subject::SubjectMatcher;
use crate::taxonomy::{BrandRegistry, SourceTags, TagTaxonomy};

/// Everything a resolution run shares: the candidate pool, the taxonomy
/// structures, and the interaction gate.
///
/// Taxonomy and brand mutations always take the interaction gate first and
/// the structure's own lock second. The record lock, when held, comes
/// before the gate.
pub struct Session {
    config: AppConfig,
    schema: FieldSchema,
    pool: SharedPool,
    taxonomy: Mutex<TagTaxonomy>,
    brands: Mutex<BrandRegistry>,
    gate: InteractionGate,
    records: Mutex<()>,
    titles: TitleResolver,
    subjects: SubjectMatcher,
}

impl Session {
    /// Load the snapshot and mapping files named by `config`.
    pub fn open(config: AppConfig, gateway: Arc<dyn InteractionGateway>) -> Result<Self> {
        config.validate()?;
        let schema = config.field_schema()?;
        let pool = SharedPool::load(config.snapshot_path());
        let taxonomy = TagTaxonomy::load(
            config.mapping_files(),
            config.scorer(),
            config.matching.tag_merge_threshold,
        );
        let brands = BrandRegistry::load(
            config.mapping_files(),
            config.scorer(),
            config.matching.brand_threshold,
        );
        info!(
            data_dir = %config.data_dir().display(),
            pool = pool.len(),
            "session opened"
        );

        Ok(Self {
            titles: TitleResolver::from_config(&config),
            subjects: SubjectMatcher::from_config(&config),
            schema,
            pool,
            taxonomy: Mutex::new(taxonomy),
            brands: Mutex::new(brands),
            gate: InteractionGate::new(gateway),
            records: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn gate(&self) -> &InteractionGate {
        &self.gate
    }

    pub async fn check_duplicate(
        &self,
        title: &str,
        store: &dyn RecordStore,
    ) -> Result<DuplicateOutcome> {
        self.titles.check(title, &self.pool, store, &self.gate).await
    }

    pub async fn match_subject(
        &self,
        keyword: &str,
        source: &dyn SearchSource,
    ) -> Result<Option<SearchHit>> {
        self.subjects.match_subject(keyword, source, &self.gate).await
    }

    /// Translate and merge tags. The gate is held for the whole call.
    pub async fn process_tags(&self, tags: &SourceTags) -> Result<BTreeSet<String>> {
        let gateway = self.gate.acquire().await;
        let mut taxonomy = self.taxonomy.lock().await;
        taxonomy.process_tags(tags, &*gateway).await
    }

    pub async fn resolve_brand(&self, name: &str) -> Result<Option<String>> {
        let gateway = self.gate.acquire().await;
        let mut brands = self.brands.lock().await;
        brands.resolve_brand(name, &*gateway).await
    }

    /// Held from a duplicate check until the record it allows is created
    /// and in the pool, so two checks never both see an empty pool.
    pub async fn lock_records(&self) -> MutexGuard<'_, ()> {
        self.records.lock().await
    }

    /// Make a freshly created record visible to later duplicate checks.
    pub fn record_created(&self, title: &str, id: &str, url: Option<&str>) -> Result<bool> {
        let mut entry = PoolEntry::new(title, id);
        if let Some(url) = url {
            entry = entry.with_url(url);
        }
        self.pool.append(entry)
    }

    pub async fn refresh_pool(&self, store: &dyn RecordStore) -> Result<bool> {
        self.pool.refresh_from_store(store).await
    }

    /// Rewrite the snapshot. Mapping files are written on every change and
    /// need no flush.
    pub fn flush(&self) -> Result<()> {
        self.pool.flush()?;
        info!(entries = self.pool.len(), "session flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::scripted::ScriptedGateway;
    use crate::interaction::{InteractionResponse, TranslateDecision};
    use galsync_core::TagSource;
    use galsync_core::storage::load_snapshot;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.data_dir = dir.path().to_string_lossy().to_string();
        config
    }

    #[tokio::test]
    async fn test_created_records_reach_the_snapshot() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let session = Session::open(cfg.clone(), Arc::new(ScriptedGateway::silent())).unwrap();

        assert!(session.record_created("銀色", "r1", None).unwrap());
        assert!(!session.record_created("銀色", "r1", None).unwrap());
        session.flush().unwrap();
        assert_eq!(load_snapshot(&cfg.snapshot_path()).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_tag_calls_prompt_once_for_the_same_tag() {
        let dir = TempDir::new().unwrap();
        let gateway = Arc::new(ScriptedGateway::new([InteractionResponse::Translation(
            TranslateDecision::Translate("猫耳".into()),
        )]));
        let session = Arc::new(Session::open(config(&dir), gateway.clone()).unwrap());

        let tags: SourceTags = [(TagSource::Dlsite, vec!["ネコミミ".to_string()])].into();
        let a = {
            let (s, t) = (session.clone(), tags.clone());
            tokio::spawn(async move { s.process_tags(&t).await })
        };
        let b = {
            let (s, t) = (session.clone(), tags.clone());
            tokio::spawn(async move { s.process_tags(&t).await })
        };

        let expected = BTreeSet::from(["猫耳".to_string()]);
        assert_eq!(a.await.unwrap().unwrap(), expected);
        assert_eq!(b.await.unwrap().unwrap(), expected);
        assert_eq!(gateway.asked_count(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.matching.shortlist_size = 0;
        assert!(Session::open(cfg, Arc::new(ScriptedGateway::silent())).is_err());
    }
}
