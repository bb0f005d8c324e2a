//! Response bodies of the arena API

use serde::Deserialize;

/// Two models proposed for a blind comparison
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ModelPair {
    pub(crate) model_a: String,
    pub(crate) model_b: String,
}

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct LeaderboardEntry {
    pub(crate) model: String,
    pub(crate) score: f64,
    pub(crate) votes: u64,
    #[serde(default)]
    pub(crate) wins: Option<u64>,
    #[serde(default)]
    pub(crate) losses: Option<u64>,
    #[serde(default)]
    pub(crate) ties: Option<u64>,
}

/// Server-side prompt template
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct PromptTemplate {
    pub(crate) name: String,
    pub(crate) template: String,
}

/// Order entries best first; NaN scores sink to the bottom.
pub(crate) fn sort_leaderboard(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        let a_score = if a.score.is_nan() { f64::NEG_INFINITY } else { a.score };
        let b_score = if b.score.is_nan() { f64::NEG_INFINITY } else { b.score };
        b_score.total_cmp(&a_score)
    });
}
