use crate::error::{ReconciliationInputError, Result};
use serde::{Deserialize, Serialize};

/// Default acceptance threshold for fuzzy matches.
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Configuration for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Join folder names against control IDs before anything else
    pub use_control_taxonomy: bool,

    /// Fall back to fuzzy folder/description matching when no exact key matches
    pub fuzzy_fallback: bool,

    /// Minimum similarity (inclusive) for a fuzzy candidate to be accepted
    pub threshold: f64,

    /// Which candidate wins when several share the top score
    pub tie_break: TieBreak,

    /// Similarity scale used for fuzzy matching
    pub metric: SimilarityMetric,

    /// Lowercase candidate descriptions too (the folder name is always lowercased)
    pub lowercase_candidates: bool,

    /// Tag rows with the first evidence ID contained in the filename
    pub match_evidence_ids: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            use_control_taxonomy: true,
            fuzzy_fallback: true,
            threshold: DEFAULT_THRESHOLD,
            tie_break: TieBreak::FirstSeen,
            metric: SimilarityMetric::SequenceRatio,
            lowercase_candidates: false,
            match_evidence_ids: false,
        }
    }
}

impl MatchConfig {
    /// Folder-to-test matching only, for taxonomies without a control layer
    pub fn folder_fuzzy_only() -> Self {
        Self {
            use_control_taxonomy: false,
            ..Default::default()
        }
    }

    /// Exact joins only; anything without a verbatim key stays unmatched
    pub fn exact_only() -> Self {
        Self {
            fuzzy_fallback: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ReconciliationInputError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Tie-break among fuzzy candidates with an identical top score.
///
/// Either choice is arbitrary; it only makes the result deterministic for a
/// given candidate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest candidate in the test table wins
    #[default]
    FirstSeen,
    /// Latest candidate in the test table wins
    LastSeen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Ratcliff/Obershelp ratio `2*M / T` (the "close matches" scale)
    #[default]
    SequenceRatio,
    /// Jaro-Winkler similarity
    JaroWinkler,
}
