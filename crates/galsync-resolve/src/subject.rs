use galsync_core::{AppConfig, SimilarityScorer, TextNormalizer};
use tracing::{info, warn};

use crate::decision::{MatchDecision, MatchTier, Ranked, rank_descending, to_choices};
use crate::error::{Result, degrade};
use crate::interaction::InteractionGate;
use crate::sources::{SearchHit, SearchSource};

/// Picks the canonical subject for a keyword out of a metadata search.
///
/// Tiers, first one that fires wins:
/// 1. the cleaned keyword is a substring of a candidate's cleaned name;
/// 2. the best score reaches the high threshold;
/// 3. the best score reaches the low threshold and the cleaned names
///    contain one another;
/// 4. otherwise a human picks from the top of the ranking.
#[derive(Debug, Clone)]
pub struct SubjectMatcher {
    normalizer: TextNormalizer,
    scorer: SimilarityScorer,
    high_threshold: f64,
    low_threshold: f64,
    shortlist_size: usize,
}

impl Default for SubjectMatcher {
    fn default() -> Self {
        Self {
            normalizer: TextNormalizer::default(),
            scorer: SimilarityScorer::default(),
            high_threshold: 0.85,
            low_threshold: 0.70,
            shortlist_size: 10,
        }
    }
}

struct KeywordForms {
    normalized: String,
    cleaned: String,
    simplified: String,
}

impl SubjectMatcher {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            normalizer: config.normalizer(),
            scorer: config.scorer(),
            high_threshold: config.matching.subject_high_threshold,
            low_threshold: config.matching.subject_low_threshold,
            shortlist_size: config.matching.shortlist_size.max(1),
        }
    }

    fn forms(&self, text: &str) -> KeywordForms {
        KeywordForms {
            normalized: self.normalizer.normalize(text),
            cleaned: self.normalizer.clean(text),
            simplified: self.normalizer.normalize(&self.normalizer.simplify(text)),
        }
    }

    /// Best of the four comparisons between keyword and candidate names.
    fn score_hit(&self, kw: &KeywordForms, hit: &SearchHit) -> f64 {
        let name = self.forms(&hit.primary_name);
        let mut best = self
            .scorer
            .score(&kw.normalized, &name.normalized)
            .max(self.scorer.score(&kw.cleaned, &name.cleaned))
            .max(self.scorer.score(&kw.simplified, &name.simplified));
        if let Some(localized) = hit.localized_name.as_deref() {
            let localized = self.normalizer.normalize(localized);
            if !localized.is_empty() {
                best = best.max(self.scorer.score(&kw.normalized, &localized));
            }
        }
        best
    }

    /// Every hit scored against `keyword`, best first; ties keep result order.
    pub fn rank(&self, keyword: &str, hits: &[SearchHit]) -> Vec<Ranked<SearchHit>> {
        let kw = self.forms(keyword);
        let mut ranked: Vec<Ranked<SearchHit>> = hits
            .iter()
            .map(|hit| Ranked {
                score: self.score_hit(&kw, hit),
                item: hit.clone(),
            })
            .collect();
        rank_descending(&mut ranked);
        ranked
    }

    /// Apply the tiers. `Ambiguous` carries at most `shortlist_size` entries.
    pub fn decide(&self, keyword: &str, hits: &[SearchHit]) -> MatchDecision<SearchHit> {
        let cleaned_kw = self.normalizer.clean(keyword);
        if self.normalizer.normalize(keyword).is_empty() || hits.is_empty() {
            return MatchDecision::None;
        }
        let mut ranked = self.rank(keyword, hits);

        if !cleaned_kw.is_empty()
            && let Some(hit) = ranked.iter().find(|r| {
                let name = self.normalizer.clean(&r.item.primary_name);
                !name.is_empty() && name.contains(&cleaned_kw)
            })
        {
            return MatchDecision::Auto {
                candidate: hit.item.clone(),
                score: hit.score,
                tier: MatchTier::Substring,
            };
        }

        let top = &ranked[0];
        if top.score >= self.high_threshold {
            return MatchDecision::Auto {
                candidate: top.item.clone(),
                score: top.score,
                tier: MatchTier::HighConfidence,
            };
        }

        if top.score >= self.low_threshold {
            let name = self.normalizer.clean(&top.item.primary_name);
            let contained = !name.is_empty()
                && !cleaned_kw.is_empty()
                && (name.contains(&cleaned_kw) || cleaned_kw.contains(&name));
            if contained {
                return MatchDecision::Auto {
                    candidate: top.item.clone(),
                    score: top.score,
                    tier: MatchTier::Relaxed,
                };
            }
        }

        ranked.truncate(self.shortlist_size);
        MatchDecision::Ambiguous { candidates: ranked }
    }

    /// Search `source` for `keyword` and pick a subject, asking a human when
    /// no tier fires. A search with no results is retried once with the
    /// simplified keyword. Search failures count as no results unless fatal.
    pub async fn match_subject(
        &self,
        keyword: &str,
        source: &dyn SearchSource,
        gate: &InteractionGate,
    ) -> Result<Option<SearchHit>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(None);
        }

        let mut hits = degrade(source.search(keyword).await, "subject search")?;
        if hits.is_empty() {
            let simplified = self.normalizer.simplify(keyword);
            if !simplified.is_empty() && simplified != keyword {
                info!(keyword, simplified = %simplified, "no results, retrying with simplified keyword");
                hits = degrade(source.search(&simplified).await, "subject search")?;
            }
        }
        if hits.is_empty() {
            warn!(keyword, source = source.name(), "no subject found");
            return Ok(None);
        }

        match self.decide(keyword, &hits) {
            MatchDecision::Auto {
                candidate,
                score,
                tier,
            } => {
                info!(keyword, id = %candidate.id, name = %candidate.primary_name, score, ?tier, "subject matched");
                Ok(Some(candidate))
            }
            MatchDecision::Ambiguous { candidates } => {
                let choices = to_choices(&candidates, |h| (h.primary_name.clone(), h.localized_name.clone()));
                let picked = gate.acquire().await.select_from_ranked(keyword, &choices).await;
                match picked {
                    Some(idx) => {
                        let hit = candidates[idx].item.clone();
                        info!(keyword, id = %hit.id, name = %hit.primary_name, "subject chosen manually");
                        Ok(Some(hit))
                    }
                    None => {
                        info!(keyword, "subject selection abandoned");
                        Ok(None)
                    }
                }
            }
            MatchDecision::None => Ok(None),
        }
    }
}
