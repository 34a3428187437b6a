use serde::Serialize;

use crate::interaction::RankedChoice;

/// A candidate together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub item: T,
    pub score: f64,
}

/// Which acceptance rule fired for an automatic match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Substring,
    HighConfidence,
    Relaxed,
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MatchDecision<T> {
    Auto { candidate: T, score: f64, tier: MatchTier },
    /// Ranked best first; needs a human.
    Ambiguous { candidates: Vec<Ranked<T>> },
    None,
}

/// Sort best first. Equal scores keep their input order.
pub(crate) fn rank_descending<T>(ranked: &mut [Ranked<T>]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
}

pub(crate) fn to_choices<T>(ranked: &[Ranked<T>], describe: impl Fn(&T) -> (String, Option<String>)) -> Vec<RankedChoice> {
    ranked
        .iter()
        .map(|r| {
            let (label, detail) = describe(&r.item);
            RankedChoice::new(label, r.score).with_detail(detail)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_is_stable_for_ties() {
        let mut ranked = vec![
            Ranked { item: "a", score: 0.5 },
            Ranked { item: "b", score: 0.9 },
            Ranked { item: "c", score: 0.5 },
        ];
        rank_descending(&mut ranked);
        let order: Vec<&str> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
