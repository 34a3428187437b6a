//! Tag translation and canonical-tag merging.
//!
//! Raw tags are first translated per source, then each translated concept
//! is resolved to a main tag through the merge graph. Every mutation is
//! written to its mapping file before the next tag is looked at.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use galsync_core::storage::{IgnoreSet, MappingFiles, MergeGraph, TranslationTable};
use galsync_core::{SimilarityScorer, TagSource, normalize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::interaction::{InteractionGateway, MergeDecision, TranslateDecision};

pub mod brand;

pub use brand::BrandRegistry;

/// Raw tags grouped by the source they were scraped from.
pub type SourceTags = BTreeMap<TagSource, Vec<String>>;

pub struct TagTaxonomy {
    files: MappingFiles,
    tables: BTreeMap<TagSource, TranslationTable>,
    graph: MergeGraph,
    ignore: IgnoreSet,
    /// Concepts that are their own main tag without a merge-graph entry.
    standalone: BTreeSet<String>,
    /// Lowercased keyword → main tag.
    reverse: HashMap<String, String>,
    scorer: SimilarityScorer,
    merge_threshold: f64,
}

impl TagTaxonomy {
    /// Load every mapping file. Missing or corrupt files start empty.
    pub fn load(files: MappingFiles, scorer: SimilarityScorer, merge_threshold: f64) -> Self {
        let tables: BTreeMap<TagSource, TranslationTable> = TagSource::ALL
            .into_iter()
            .map(|source| (source, files.load_table(source)))
            .collect();
        let standalone = tables
            .values()
            .flat_map(|t| t.values())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        let mut taxonomy = Self {
            graph: files.load_merge_graph(),
            ignore: files.load_ignore(),
            files,
            tables,
            standalone,
            reverse: HashMap::new(),
            scorer,
            merge_threshold,
        };
        taxonomy.rebuild_reverse();
        info!(
            groups = taxonomy.graph.len(),
            keywords = taxonomy.reverse.len(),
            ignored = taxonomy.ignore.len(),
            "tag taxonomy loaded"
        );
        taxonomy
    }

    pub fn translation(&self, source: TagSource, raw_tag: &str) -> Option<&str> {
        self.tables
            .get(&source)
            .and_then(|t| t.get(raw_tag))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_ignored(&self, raw_tag: &str) -> bool {
        self.ignore.contains(raw_tag)
    }

    /// Main tag for a concept, compared in normalized form.
    pub fn main_tag(&self, concept: &str) -> Option<&str> {
        self.reverse.get(&normalize(concept)).map(String::as_str)
    }

    pub fn merge_graph(&self) -> &MergeGraph {
        &self.graph
    }

    /// Translate and merge `tags` into a set of main tags.
    ///
    /// The caller must hold the interaction gate for the whole call so the
    /// lookup → prompt → persist sequence cannot interleave with another.
    pub async fn process_tags(
        &mut self,
        tags: &SourceTags,
        gateway: &dyn InteractionGateway,
    ) -> Result<BTreeSet<String>> {
        let concepts = self.translate_all(tags, gateway).await?;
        self.resolve_all(&concepts, gateway).await
    }

    // ─── Phase 1: translation ──────────────────────────────

    async fn translate_all(
        &mut self,
        tags: &SourceTags,
        gateway: &dyn InteractionGateway,
    ) -> Result<Vec<String>> {
        let mut concepts = Vec::new();
        let mut skipped: HashSet<(TagSource, String)> = HashSet::new();

        for (&source, raw_tags) in tags {
            for raw in raw_tags {
                let raw = raw.trim();
                if raw.is_empty() || self.ignore.contains(raw) {
                    continue;
                }

                if !source.is_interactive() {
                    let mapped = self.translation(source, raw).unwrap_or(raw);
                    concepts.push(mapped.to_string());
                    continue;
                }

                if let Some(mapped) = self.translation(source, raw) {
                    concepts.push(mapped.to_string());
                    continue;
                }
                if skipped.contains(&(source, raw.to_string())) {
                    continue;
                }

                match gateway.translate_tag(source, raw).await {
                    TranslateDecision::Translate(text) => {
                        let text = text.trim().to_string();
                        let table = self.tables.entry(source).or_default();
                        table.insert(raw.to_string(), text.clone());
                        self.files.save_table(source, table)?;
                        info!(%source, raw, translation = %text, "tag translation recorded");
                        concepts.push(text);
                    }
                    TranslateDecision::Skip => {
                        info!(%source, raw, "tag skipped");
                        skipped.insert((source, raw.to_string()));
                    }
                    TranslateDecision::IgnorePermanently => {
                        self.ignore.insert(raw.to_string());
                        self.files.save_ignore(&self.ignore)?;
                        info!(%source, raw, "tag ignored permanently");
                    }
                }
            }
        }
        Ok(concepts)
    }

    // ─── Phase 2: merge resolution ─────────────────────────

    async fn resolve_all(
        &mut self,
        concepts: &[String],
        gateway: &dyn InteractionGateway,
    ) -> Result<BTreeSet<String>> {
        let mut resolved = BTreeSet::new();
        for concept in concepts {
            let concept = concept.trim();
            if concept.is_empty() {
                continue;
            }
            if let Some(main) = self.main_tag(concept) {
                debug!(concept, main, "tag resolved");
                resolved.insert(main.to_string());
                continue;
            }

            let Some(candidate) = self.merge_candidate(concept) else {
                debug!(concept, "new main tag");
                self.standalone.insert(concept.to_string());
                self.rebuild_reverse();
                resolved.insert(concept.to_string());
                continue;
            };

            match gateway.merge_or_create(concept, &candidate).await {
                MergeDecision::Merge => {
                    self.add_alias(&candidate, concept)?;
                    info!(concept, main = %candidate, "tag merged into existing main tag");
                    resolved.insert(candidate);
                }
                MergeDecision::Create => {
                    self.add_main_tag(concept)?;
                    info!(concept, similar = %candidate, "tag kept as new main tag");
                    resolved.insert(concept.to_string());
                }
            }
        }
        Ok(resolved)
    }

    /// Best existing main tag to offer as a merge target for `concept`.
    ///
    /// Main tags that contain the concept, or are contained in it, come
    /// first. Otherwise the closest main tag at or above the merge threshold
    /// is offered. Ties go to the first main tag in sorted order.
    pub fn merge_candidate(&self, concept: &str) -> Option<String> {
        let norm = normalize(concept);
        if norm.is_empty() {
            return None;
        }
        let mains: BTreeSet<&String> = self.reverse.values().collect();

        let mut best_related: Option<(f64, &String)> = None;
        let mut best_similar: Option<(f64, &String)> = None;
        for main in mains {
            let main_norm = normalize(main);
            if main_norm.is_empty() || main_norm == norm {
                continue;
            }
            let score = self.scorer.score(&norm, &main_norm);
            let slot = if main_norm.contains(&norm) || norm.contains(&main_norm) {
                &mut best_related
            } else if score >= self.merge_threshold && score > 0.0 {
                &mut best_similar
            } else {
                continue;
            };
            if slot.is_none_or(|(best, _)| score > best) {
                *slot = Some((score, main));
            }
        }
        best_related.or(best_similar).map(|(_, main)| main.clone())
    }

    fn add_alias(&mut self, main: &str, alias: &str) -> Result<()> {
        let group = self
            .graph
            .entry(main.to_string())
            .or_insert_with(|| vec![main.to_string()]);
        if !group.iter().any(|k| k == alias) {
            group.push(alias.to_string());
        }
        self.files.save_merge_graph(&self.graph)?;
        self.rebuild_reverse();
        Ok(())
    }

    fn add_main_tag(&mut self, tag: &str) -> Result<()> {
        self.graph
            .entry(tag.to_string())
            .or_insert_with(|| vec![tag.to_string()]);
        self.files.save_merge_graph(&self.graph)?;
        self.rebuild_reverse();
        Ok(())
    }

    /// Merge-graph keywords first, then standalone concepts mapped to
    /// themselves. A keyword claimed by two groups keeps its first group.
    fn rebuild_reverse(&mut self) {
        self.reverse.clear();
        for (main, keywords) in &self.graph {
            for keyword in std::iter::once(main).chain(keywords) {
                let key = normalize(keyword);
                if key.is_empty() {
                    continue;
                }
                match self.reverse.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(main.clone());
                    }
                    Entry::Occupied(existing) if existing.get() != main => {
                        warn!(
                            keyword = %keyword,
                            kept = %existing.get(),
                            ignored = %main,
                            "keyword belongs to two merge groups"
                        );
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }
        for concept in &self.standalone {
            let key = normalize(concept);
            if !key.is_empty() {
                self.reverse.entry(key).or_insert_with(|| concept.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::scripted::ScriptedGateway;
    use crate::interaction::{InteractionRequest, InteractionResponse};
    use tempfile::TempDir;

    fn taxonomy(dir: &TempDir) -> TagTaxonomy {
        TagTaxonomy::load(MappingFiles::new(dir.path()), SimilarityScorer::default(), 0.5)
    }

    fn tags(items: &[(TagSource, &[&str])]) -> SourceTags {
        items
            .iter()
            .map(|(s, t)| (*s, t.iter().map(|x| x.to_string()).collect()))
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_new_translation_is_persisted_and_not_asked_again() {
        let dir = TempDir::new().unwrap();
        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([InteractionResponse::Translation(TranslateDecision::Translate(
            "大小姐".into(),
        ))]);

        let input = tags(&[(TagSource::Dlsite, &["お嬢様"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["大小姐"]));
        assert_eq!(
            MappingFiles::new(dir.path()).load_table(TagSource::Dlsite)["お嬢様"],
            "大小姐"
        );

        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["大小姐"]));
        assert_eq!(gw.asked_count(), 1);
    }

    #[tokio::test]
    async fn test_merge_folds_concept_into_main_tag() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("女仆".into(), vec!["女仆".into()]);
        files.save_merge_graph(&graph).unwrap();

        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([
            InteractionResponse::Translation(TranslateDecision::Translate("女僕".into())),
            InteractionResponse::Merge(MergeDecision::Merge),
        ]);

        let input = tags(&[(TagSource::Dlsite, &["メイド"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["女仆"]));
        assert_eq!(files.load_merge_graph()["女仆"], vec!["女仆", "女僕"]);
        assert_eq!(
            gw.asked()[1],
            InteractionRequest::MergeOrCreate {
                concept: "女僕".into(),
                candidate: "女仆".into(),
            }
        );

        // Same concept again: resolved through the graph, no new prompt.
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["女仆"]));
        let ggbases = tags(&[(TagSource::Ggbases, &["女僕"])]);
        assert_eq!(tax.process_tags(&ggbases, &gw).await.unwrap(), set(&["女仆"]));
        assert_eq!(gw.asked_count(), 2);
    }

    #[tokio::test]
    async fn test_repeated_new_concept_in_one_call_is_asked_once() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("巨乳".into(), vec!["巨乳".into()]);
        files.save_merge_graph(&graph).unwrap();

        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([InteractionResponse::Merge(MergeDecision::Merge)]);
        let input = tags(&[(TagSource::Ggbases, &["超巨乳", "超巨乳"])]);

        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["巨乳"]));
        assert_eq!(gw.asked_count(), 1);
    }

    #[tokio::test]
    async fn test_create_keeps_concept_as_main_tag() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("学園".into(), vec!["学園".into()]);
        files.save_merge_graph(&graph).unwrap();

        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([InteractionResponse::Merge(MergeDecision::Create)]);
        let input = tags(&[(TagSource::Ggbases, &["学園恋愛"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["学園恋愛"]));
        assert_eq!(files.load_merge_graph()["学園恋愛"], vec!["学園恋愛"]);

        let mut reloaded = taxonomy(&dir);
        assert_eq!(reloaded.process_tags(&input, &gw).await.unwrap(), set(&["学園恋愛"]));
        assert_eq!(gw.asked_count(), 1);
    }

    #[tokio::test]
    async fn test_novel_tag_without_candidate_needs_no_prompt() {
        let dir = TempDir::new().unwrap();
        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::silent();
        let input = tags(&[(TagSource::Ggbases, &["ファンタジー"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["ファンタジー"]));
        assert_eq!(gw.asked_count(), 0);
    }

    #[tokio::test]
    async fn test_ignored_tags_stay_ignored_after_reload() {
        let dir = TempDir::new().unwrap();
        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([InteractionResponse::Translation(
            TranslateDecision::IgnorePermanently,
        )]);
        let input = tags(&[(TagSource::Fanza, &["ノイズ"])]);

        assert!(tax.process_tags(&input, &gw).await.unwrap().is_empty());
        assert!(tax.process_tags(&input, &gw).await.unwrap().is_empty());

        let mut reloaded = taxonomy(&dir);
        assert!(reloaded.is_ignored("ノイズ"));
        assert!(reloaded.process_tags(&input, &gw).await.unwrap().is_empty());
        assert_eq!(gw.asked_count(), 1);
    }

    #[tokio::test]
    async fn test_skip_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::new([
            InteractionResponse::Translation(TranslateDecision::Skip),
            InteractionResponse::Translation(TranslateDecision::Skip),
        ]);
        let input = tags(&[(TagSource::Dlsite, &["謎", "謎"])]);

        assert!(tax.process_tags(&input, &gw).await.unwrap().is_empty());
        assert_eq!(gw.asked_count(), 1);
        assert!(tax.process_tags(&input, &gw).await.unwrap().is_empty());
        assert_eq!(gw.asked_count(), 2);
        assert!(!tax.is_ignored("謎"));
    }

    #[tokio::test]
    async fn test_pass_through_source_never_prompts() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut table = TranslationTable::new();
        table.insert("Maid".into(), "女仆".into());
        table.insert("Blank".into(), "".into());
        files.save_table(TagSource::Ggbases, &table).unwrap();

        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::silent();
        let input = tags(&[(TagSource::Ggbases, &["Maid", "Blank", "Other"])]);
        assert_eq!(
            tax.process_tags(&input, &gw).await.unwrap(),
            set(&["女仆", "Blank", "Other"])
        );
        assert_eq!(gw.asked_count(), 0);
    }

    #[tokio::test]
    async fn test_aliases_resolve_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("NTR".into(), vec!["NTR".into(), "Netorare".into()]);
        files.save_merge_graph(&graph).unwrap();

        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::silent();
        let input = tags(&[(TagSource::Ggbases, &["netorare", "ntr"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["NTR"]));
        assert_eq!(gw.asked_count(), 0);
    }

    #[tokio::test]
    async fn test_width_variants_fold_into_the_existing_main_tag() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("NTR".into(), vec!["NTR".into()]);
        files.save_merge_graph(&graph).unwrap();

        let mut tax = taxonomy(&dir);
        assert_eq!(tax.main_tag("ＮＴＲ"), Some("NTR"));

        let gw = ScriptedGateway::silent();
        let input = tags(&[(TagSource::Ggbases, &["ＮＴＲ", "ｎｔｒ"])]);
        assert_eq!(tax.process_tags(&input, &gw).await.unwrap(), set(&["NTR"]));
        assert_eq!(gw.asked_count(), 0);
        assert_eq!(tax.merge_graph().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_gives_empty_output() {
        let dir = TempDir::new().unwrap();
        let mut tax = taxonomy(&dir);
        let gw = ScriptedGateway::silent();
        assert!(tax.process_tags(&SourceTags::new(), &gw).await.unwrap().is_empty());
        let blanks = tags(&[(TagSource::Dlsite, &["", "  "])]);
        assert!(tax.process_tags(&blanks, &gw).await.unwrap().is_empty());
        assert_eq!(gw.asked_count(), 0);
    }

    #[test]
    fn test_substring_candidates_beat_similar_ones() {
        let dir = TempDir::new().unwrap();
        let files = MappingFiles::new(dir.path());
        let mut graph = MergeGraph::new();
        graph.insert("女仆".into(), vec!["女仆".into()]);
        graph.insert("メイド".into(), vec!["メイド".into()]);
        files.save_merge_graph(&graph).unwrap();

        let tax = taxonomy(&dir);
        assert_eq!(tax.merge_candidate("女僕").as_deref(), Some("女仆"));
        assert_eq!(tax.merge_candidate("メイド服").as_deref(), Some("メイド"));
        assert_eq!(tax.merge_candidate("ファンタジー"), None);
    }
}
