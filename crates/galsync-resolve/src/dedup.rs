use std::collections::HashSet;

use galsync_core::{AppConfig, PoolEntry, SimilarityScorer, TextNormalizer};
use serde::Serialize;
use tracing::{info, warn};

use crate::decision::{MatchDecision, Ranked, rank_descending, to_choices};
use crate::error::{Result, degrade};
use crate::interaction::{DuplicateDecision, InteractionGate};
use crate::pool::SharedPool;
use crate::store::RecordStore;

/// What to do with a scraped item after the duplicate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DuplicateOutcome {
    Create,
    Update { id: String },
    Skip,
}

/// Finds stored titles that may be the same game as a new one.
///
/// Candidates are pool entries scoring at least `threshold`, plus entries
/// whose cleaned title contains (or is contained in) the new cleaned title.
/// The resolver never auto-decides: any candidate goes to a human.
#[derive(Debug, Clone)]
pub struct TitleResolver {
    normalizer: TextNormalizer,
    scorer: SimilarityScorer,
    threshold: f64,
}

impl Default for TitleResolver {
    fn default() -> Self {
        Self {
            normalizer: TextNormalizer::default(),
            scorer: SimilarityScorer::default(),
            threshold: 0.78,
        }
    }
}

impl TitleResolver {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            normalizer: config.normalizer(),
            scorer: config.scorer(),
            threshold: config.matching.title_threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Ranked candidates for `title`, best first.
    pub fn find_candidates(&self, title: &str, pool: &[PoolEntry]) -> Vec<Ranked<PoolEntry>> {
        let norm = self.normalizer.normalize(title);
        if norm.is_empty() {
            return Vec::new();
        }
        let cleaned = self.normalizer.clean(title);

        let mut ranked: Vec<Ranked<PoolEntry>> = pool
            .iter()
            .filter_map(|entry| {
                let score = self.scorer.score(&norm, &self.normalizer.normalize(&entry.title));
                let contained = contains_either(&cleaned, &self.normalizer.clean(&entry.title));
                (score >= self.threshold || contained).then(|| Ranked {
                    item: entry.clone(),
                    score,
                })
            })
            .collect();
        rank_descending(&mut ranked);
        ranked
    }

    /// `Ambiguous` when any candidate survives, otherwise `None`.
    pub fn resolve(&self, title: &str, pool: &[PoolEntry]) -> MatchDecision<PoolEntry> {
        let candidates = self.find_candidates(title, pool);
        if candidates.is_empty() {
            MatchDecision::None
        } else {
            MatchDecision::Ambiguous { candidates }
        }
    }

    /// Full duplicate check for a new item.
    ///
    /// 1. Rank pool candidates.
    /// 2. Drop candidates whose record was deleted from the store, rewriting
    ///    the snapshot.
    /// 3. Ask the human to create, update the top candidate, or skip.
    /// 4. If the outcome is "create" but the store already holds a record
    ///    with exactly this title, update that record instead.
    pub async fn check(
        &self,
        title: &str,
        pool: &SharedPool,
        store: &dyn RecordStore,
        gate: &InteractionGate,
    ) -> Result<DuplicateOutcome> {
        let title = title.trim();
        if title.is_empty() {
            warn!("empty title, skipping duplicate check");
            return Ok(DuplicateOutcome::Skip);
        }

        let mut candidates = match self.resolve(title, &pool.entries()) {
            MatchDecision::Ambiguous { candidates } => candidates,
            _ => Vec::new(),
        };

        if !candidates.is_empty() {
            let deleted = self.deleted_candidates(&candidates, store).await?;
            if !deleted.is_empty() {
                pool.prune(&deleted)?;
                candidates.retain(|c| !deleted.contains(&c.item.id));
            }
        }

        let outcome = if candidates.is_empty() {
            DuplicateOutcome::Create
        } else {
            let choices = to_choices(&candidates, |e| (e.title.clone(), e.url.clone()));
            let decision = gate.acquire().await.confirm_duplicate(title, &choices).await;
            info!(
                title,
                candidates = candidates.len(),
                top = %candidates[0].item.title,
                top_score = candidates[0].score,
                ?decision,
                "duplicate check escalated"
            );
            match decision {
                DuplicateDecision::Create => DuplicateOutcome::Create,
                DuplicateDecision::Update => DuplicateOutcome::Update {
                    id: candidates[0].item.id.clone(),
                },
                DuplicateDecision::Skip => DuplicateOutcome::Skip,
            }
        };

        if outcome != DuplicateOutcome::Create {
            return Ok(outcome);
        }

        let live = degrade(store.query_by_exact_title(title).await, "exact title query")?;
        if let Some(hit) = live.into_iter().next() {
            info!(title, id = %hit.id, "store already has this exact title, updating instead of creating");
            return Ok(DuplicateOutcome::Update { id: hit.id });
        }
        info!(title, "no duplicate, creating");
        Ok(DuplicateOutcome::Create)
    }

    /// Ids of candidates whose backing record is gone. Lookup failures keep
    /// the candidate.
    async fn deleted_candidates(
        &self,
        candidates: &[Ranked<PoolEntry>],
        store: &dyn RecordStore,
    ) -> Result<HashSet<String>> {
        let mut deleted = HashSet::new();
        for candidate in candidates {
            match store.record_exists(&candidate.item.id).await {
                Ok(true) => {}
                Ok(false) => {
                    deleted.insert(candidate.item.id.clone());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(id = %candidate.item.id, error = %e, "could not verify candidate, keeping it");
                }
            }
        }
        Ok(deleted)
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionResponse;
    use crate::interaction::scripted::ScriptedGateway;
    use crate::store::StoredRecord;
    use async_trait::async_trait;
    use galsync_core::CandidatePool;
    use serde_json::{Map, Value};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeStore {
        existing: HashSet<String>,
        exact_titles: Vec<(String, String)>,
        checked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        async fn query_by_exact_title(&self, title: &str) -> Result<Vec<StoredRecord>> {
            Ok(self
                .exact_titles
                .iter()
                .filter(|(t, _)| t == title)
                .map(|(_, id)| StoredRecord {
                    id: id.clone(),
                    fields: Map::new(),
                })
                .collect())
        }

        async fn all_titles(&self) -> Result<Vec<PoolEntry>> {
            Ok(Vec::new())
        }

        async fn record_exists(&self, id: &str) -> Result<bool> {
            self.checked.lock().unwrap().push(id.to_string());
            Ok(self.existing.contains(id))
        }

        async fn create_or_update(&self, _id: Option<&str>, _fields: &Map<String, Value>) -> Result<String> {
            Ok("new".into())
        }
    }

    fn entries(items: &[(&str, &str)]) -> Vec<PoolEntry> {
        items.iter().map(|(t, id)| PoolEntry::new(*t, *id)).collect()
    }

    fn gate_with(answers: Vec<InteractionResponse>) -> (InteractionGate, Arc<ScriptedGateway>) {
        let scripted = Arc::new(ScriptedGateway::new(answers));
        (InteractionGate::new(scripted.clone()), scripted)
    }

    #[test]
    fn test_edition_suffix_is_found_by_containment() {
        let resolver = TitleResolver::default();
        let pool = entries(&[("Summer Pockets", "a1"), ("Rewrite", "b2")]);
        let candidates = resolver.find_candidates("Summer Pockets REFLECTION BLUE", &pool);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item.id, "a1");
        assert!(candidates[0].score < resolver.threshold());
    }

    #[test]
    fn test_empty_title_or_pool_has_no_candidates() {
        let resolver = TitleResolver::default();
        assert_eq!(resolver.resolve("", &entries(&[("A", "1")])), MatchDecision::None);
        assert_eq!(resolver.resolve("   ", &entries(&[("A", "1")])), MatchDecision::None);
        assert_eq!(resolver.resolve("Title", &[]), MatchDecision::None);
    }

    #[test]
    fn test_candidates_are_ranked_by_score() {
        let resolver = TitleResolver::default();
        let pool = entries(&[("abcdefgxyz", "low"), ("abcdefghij", "exact"), ("abcdefghiz", "close")]);
        let ids: Vec<String> = resolver
            .find_candidates("abcdefghij", &pool)
            .into_iter()
            .map(|r| r.item.id)
            .collect();
        assert_eq!(ids, vec!["exact", "close"]);
    }

    #[test]
    fn test_acceptance_follows_score_order() {
        let resolver = TitleResolver::default();
        let scorer = SimilarityScorer::default();
        let query = "abcdefghijkl";
        let titles = ["abcdefghijkx", "abcdefghixyz", "abcdefxyzuvw", "abcxyzuvwrst", "zyxwvutsrqpo"];
        let pool: Vec<PoolEntry> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| PoolEntry::new(*t, i.to_string()))
            .collect();

        for threshold in [0.3, 0.5, 0.7, 0.78, 0.9] {
            let accepted: HashSet<String> = resolver
                .clone()
                .with_threshold(threshold)
                .find_candidates(query, &pool)
                .into_iter()
                .map(|r| r.item.title)
                .collect();
            for b in titles {
                for c in titles {
                    let sb = scorer.score(&galsync_core::normalize(query), &galsync_core::normalize(b));
                    let sc = scorer.score(&galsync_core::normalize(query), &galsync_core::normalize(c));
                    if sb >= sc && accepted.contains(c) {
                        assert!(accepted.contains(b), "threshold {threshold}: {b} vs {c}");
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_update_targets_top_candidate() {
        let dir = TempDir::new().unwrap();
        let pool = SharedPool::new(
            CandidatePool::new(entries(&[("Summer Pockets", "a1")])),
            dir.path().join("snap.json"),
        );
        let store = FakeStore {
            existing: HashSet::from(["a1".to_string()]),
            ..FakeStore::default()
        };
        let (gate, scripted) = gate_with(vec![InteractionResponse::Duplicate(DuplicateDecision::Update)]);

        let outcome = TitleResolver::default()
            .check("Summer Pockets REFLECTION BLUE", &pool, &store, &gate)
            .await
            .unwrap();
        assert_eq!(outcome, DuplicateOutcome::Update { id: "a1".into() });
        assert_eq!(scripted.asked_count(), 1);
    }

    #[tokio::test]
    async fn test_deleted_candidates_are_pruned_before_asking() {
        let dir = TempDir::new().unwrap();
        let snap = dir.path().join("snap.json");
        let pool = SharedPool::new(
            CandidatePool::new(entries(&[("Summer Pockets", "gone"), ("Other", "o1")])),
            &snap,
        );
        let store = FakeStore::default();
        let (gate, scripted) = gate_with(vec![]);

        let outcome = TitleResolver::default()
            .check("Summer Pockets", &pool, &store, &gate)
            .await
            .unwrap();
        assert_eq!(outcome, DuplicateOutcome::Create);
        assert_eq!(scripted.asked_count(), 0);
        assert_eq!(pool.entries(), entries(&[("Other", "o1")]));
        assert_eq!(galsync_core::storage::load_snapshot(&snap).len(), 1);
    }

    #[tokio::test]
    async fn test_create_is_forced_to_update_on_live_hit() {
        let dir = TempDir::new().unwrap();
        let pool = SharedPool::new(CandidatePool::default(), dir.path().join("snap.json"));
        let store = FakeStore {
            exact_titles: vec![("Rewrite".into(), "live-1".into())],
            ..FakeStore::default()
        };
        let (gate, _) = gate_with(vec![]);

        let outcome = TitleResolver::default()
            .check("Rewrite", &pool, &store, &gate)
            .await
            .unwrap();
        assert_eq!(outcome, DuplicateOutcome::Update { id: "live-1".into() });
    }

    #[tokio::test]
    async fn test_skip_and_timeout_default() {
        let dir = TempDir::new().unwrap();
        let pool = SharedPool::new(
            CandidatePool::new(entries(&[("Rewrite", "r1")])),
            dir.path().join("snap.json"),
        );
        let store = FakeStore {
            existing: HashSet::from(["r1".to_string()]),
            ..FakeStore::default()
        };
        // No scripted answer: the gateway falls back to the default (skip).
        let (gate, _) = gate_with(vec![]);
        let outcome = TitleResolver::default()
            .check("Rewrite", &pool, &store, &gate)
            .await
            .unwrap();
        assert_eq!(outcome, DuplicateOutcome::Skip);
    }

    #[tokio::test]
    async fn test_empty_title_is_skipped() {
        let dir = TempDir::new().unwrap();
        let pool = SharedPool::new(CandidatePool::default(), dir.path().join("snap.json"));
        let (gate, scripted) = gate_with(vec![]);
        let outcome = TitleResolver::default()
            .check("  ", &pool, &FakeStore::default(), &gate)
            .await
            .unwrap();
        assert_eq!(outcome, DuplicateOutcome::Skip);
        assert_eq!(scripted.asked_count(), 0);
    }
}
