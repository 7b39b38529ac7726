use crate::config::{MatchConfig, SimilarityMetric, TieBreak};
use auditmap_protocol::TestRecord;

/// A fuzzy candidate that cleared the acceptance threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch<'a> {
    pub test: &'a TestRecord,
    /// Position in the candidate pool
    pub index: usize,
    pub score: f64,
}

/// Best-candidate search over test descriptions
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    metric: SimilarityMetric,
    threshold: f64,
    tie_break: TieBreak,
    lowercase_candidates: bool,
}

impl FuzzyMatcher {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            metric: config.metric,
            threshold: config.threshold,
            tie_break: config.tie_break,
            lowercase_candidates: config.lowercase_candidates,
        }
    }

    /// Pick the single best candidate for a folder name.
    ///
    /// The folder is trimmed and lowercased before scoring. A candidate is
    /// accepted when its score is at least the threshold; returns `None` when
    /// nothing clears it.
    pub fn best_match<'a>(&self, folder: &str, pool: &'a [TestRecord]) -> Option<FuzzyMatch<'a>> {
        let query = folder.trim().to_lowercase();
        let mut best: Option<FuzzyMatch<'a>> = None;

        for (index, test) in pool.iter().enumerate() {
            let score = if self.lowercase_candidates {
                self.metric
                    .score(&query, &test.test_description.to_lowercase())
            } else {
                self.metric.score(&query, &test.test_description)
            };
            if score < self.threshold {
                continue;
            }

            let replace = match best {
                None => true,
                Some(current) => match self.tie_break {
                    TieBreak::FirstSeen => score > current.score,
                    TieBreak::LastSeen => score >= current.score,
                },
            };
            if replace {
                best = Some(FuzzyMatch { test, index, score });
            }
        }

        best
    }
}
