use galsync_core::storage::{BrandMap, MappingFiles};
use galsync_core::{SimilarityScorer, normalize};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use crate::interaction::{InteractionGateway, MergeDecision};

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(].*?[）)]").expect("valid parenthesized-suffix regex"));

/// Strip parenthesized suffixes such as readings or former names:
/// `"ωstar (オメガスター)"` → `"ωstar"`.
pub fn primary_brand_name(name: &str) -> String {
    PARENTHESIZED.replace_all(name, "").trim().to_string()
}

/// Canonical brand names and their aliases, backed by `brand_mapping.json`.
pub struct BrandRegistry {
    files: MappingFiles,
    brands: BrandMap,
    scorer: SimilarityScorer,
    threshold: f64,
}

impl BrandRegistry {
    pub fn load(files: MappingFiles, scorer: SimilarityScorer, threshold: f64) -> Self {
        let brands = files.load_brands();
        info!(brands = brands.len(), "brand registry loaded");
        Self {
            files,
            brands,
            scorer,
            threshold,
        }
    }

    pub fn brands(&self) -> &BrandMap {
        &self.brands
    }

    /// Canonical name for a known canonical or alias, case-insensitive.
    pub fn canonical_name(&self, raw: &str) -> Option<&str> {
        let wanted = raw.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.brands
            .iter()
            .find(|(canonical, aliases)| {
                canonical.trim().to_lowercase() == wanted
                    || aliases.iter().any(|a| a.trim().to_lowercase() == wanted)
            })
            .map(|(canonical, _)| canonical.as_str())
    }

    /// Most similar canonical brand at or above the threshold.
    pub fn closest(&self, name: &str) -> Option<(&str, f64)> {
        let norm = normalize(name);
        if norm.is_empty() {
            return None;
        }
        let mut best: Option<(&str, f64)> = None;
        for (canonical, aliases) in &self.brands {
            let score = std::iter::once(canonical)
                .chain(aliases)
                .map(|known| self.scorer.score(&norm, &normalize(known)))
                .fold(0.0, f64::max);
            if score >= self.threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((canonical.as_str(), score));
            }
        }
        best
    }

    /// Resolve a scraped brand name to its canonical form, asking before
    /// folding an unknown name into a similar known brand.
    pub async fn resolve_brand(
        &mut self,
        name: &str,
        gateway: &dyn InteractionGateway,
    ) -> Result<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(canonical) = self.canonical_name(name) {
            debug!(name, canonical, "brand known");
            return Ok(Some(canonical.to_string()));
        }

        let primary = primary_brand_name(name);
        if !primary.is_empty()
            && primary != name
            && let Some(canonical) = self.canonical_name(&primary)
        {
            let canonical = canonical.to_string();
            self.add_alias(&canonical, name)?;
            info!(name, %canonical, "brand alias recorded from primary name");
            return Ok(Some(canonical));
        }

        let closest = self
            .closest(name)
            .map(|(canonical, score)| (canonical.to_string(), score));
        if let Some((canonical, score)) = closest {
            match gateway.confirm_brand_merge(name, &canonical, score).await {
                MergeDecision::Merge => {
                    self.add_alias(&canonical, name)?;
                    info!(name, %canonical, score, "brand merged");
                    return Ok(Some(canonical));
                }
                MergeDecision::Create => {
                    info!(name, similar = %canonical, score, "brand kept separate");
                }
            }
        }

        self.brands.insert(name.to_string(), Vec::new());
        self.files.save_brands(&self.brands)?;
        info!(name, "new brand registered");
        Ok(Some(name.to_string()))
    }

    fn add_alias(&mut self, canonical: &str, alias: &str) -> Result<()> {
        let aliases = self.brands.entry(canonical.to_string()).or_default();
        if !aliases.iter().any(|a| a == alias) {
            aliases.push(alias.to_string());
        }
        self.files.save_brands(&self.brands)?;
        Ok(())
    }
}
