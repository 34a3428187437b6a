/// Default weight of the full ratio when one string contains the other.
pub const DEFAULT_FULL_WEIGHT: f64 = 0.8;

/// Bounded (0.0–1.0) similarity between two already-normalized strings.
///
/// `ratio` and `partial_ratio` are symmetric. `score` blends them so that
/// containment alone never yields 1.0 unless the strings are also close
/// overall.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer {
    full_weight: f64,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self {
            full_weight: DEFAULT_FULL_WEIGHT,
        }
    }
}

impl SimilarityScorer {
    pub fn with_full_weight(mut self, weight: f64) -> Self {
        self.full_weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Blended score: `w * full + (1 - w) * partial` when the partial ratio
    /// signals full containment, otherwise the full ratio alone.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let full = ratio(a, b);
        let partial = partial_ratio(a, b);
        if partial >= 1.0 {
            self.full_weight * full + (1.0 - self.full_weight) * partial
        } else {
            full
        }
    }

    pub fn partial_score(&self, a: &str, b: &str) -> f64 {
        partial_ratio(a, b)
    }

    pub fn token_score(&self, a: &str, b: &str) -> f64 {
        token_sort_ratio(a, b)
    }
}

// ─── Strategies ────────────────────────────────────────────

/// `2 * LCS / (len(a) + len(b))` over characters.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Best normalized Levenshtein similarity between the shorter string and
/// every equally long window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        let hay: String = window.iter().collect();
        let sim = strsim::normalized_levenshtein(&needle, &hay);
        if sim > best {
            best = sim;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// [`ratio`] over lowercased, whitespace-split tokens joined in sorted
/// order.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut tokens: Vec<&str> = lower.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ratio_identity_and_disjoint() {
        assert!(approx(ratio("abc", "abc"), 1.0));
        assert!(approx(ratio("abc", "xyz"), 0.0));
        assert!(approx(ratio("", ""), 1.0));
        assert!(approx(ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_ratio_is_symmetric() {
        let pairs = [
            ("summerpockets", "summerpocketsreflectionblue"),
            ("こなたよりアステリズム", "アステリズム"),
            ("女僕", "女仆"),
            ("abcd", "bcda"),
        ];
        for (a, b) in pairs {
            assert!(approx(ratio(a, b), ratio(b, a)), "{a} / {b}");
            assert!(approx(partial_ratio(a, b), partial_ratio(b, a)), "{a} / {b}");
            let scorer = SimilarityScorer::default();
            assert!(approx(scorer.score(a, b), scorer.score(b, a)), "{a} / {b}");
        }
    }

    #[test]
    fn test_partial_ratio_detects_containment() {
        assert!(approx(partial_ratio("アステリズム", "こなたよりアステリズム"), 1.0));
        assert!(partial_ratio("abc", "xyzxyz") < 1.0);
    }

    #[test]
    fn test_score_blends_on_containment() {
        let scorer = SimilarityScorer::default();
        let full = ratio("summerpockets", "summerpocketsreflectionblue");
        let blended = scorer.score("summerpockets", "summerpocketsreflectionblue");
        assert!(approx(blended, 0.8 * full + 0.2));
        assert!(blended < 1.0);
    }

    #[test]
    fn test_score_without_containment_is_full_ratio() {
        let scorer = SimilarityScorer::default();
        assert!(approx(scorer.score("abcdef", "abcxef"), ratio("abcdef", "abcxef")));
    }

    #[test]
    fn test_full_weight_is_clamped() {
        let scorer = SimilarityScorer::default().with_full_weight(3.0);
        assert!(approx(scorer.score("ab", "abcd"), ratio("ab", "abcd")));
    }

    #[test]
    fn test_token_score_ignores_order_and_case() {
        let scorer = SimilarityScorer::default();
        assert!(approx(scorer.token_score("Key Visual Arts", "visual arts KEY"), 1.0));
    }
}
