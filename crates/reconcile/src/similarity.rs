use crate::config::SimilarityMetric;

impl SimilarityMetric {
    /// Similarity of two strings on `[0, 1]`; identical strings score 1.
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Self::SequenceRatio => sequence_ratio(a, b),
            Self::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }
}

/// Ratcliff/Obershelp similarity: `2*M / T`, where `M` is the number of
/// characters in recursively found longest common blocks and `T` the combined
/// length. Two empty strings score 1.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Among equally long blocks the one starting earliest in `a`, then in `b`, wins.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // run[x + 1] = length of the common run ending at a[i - 1], b[blo + x]
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for x in 0..width {
            let j = blo + x;
            cur[x + 1] = if a[i] == b[j] { prev[x] + 1 } else { 0 };
            let k = cur[x + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identical_and_disjoint() {
        assert_eq!(sequence_ratio("access review", "access review"), 1.0);
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn matches_close_matches_scale() {
        // Known SequenceMatcher ratios
        assert!(approx(sequence_ratio("abcd", "bcde"), 0.75));
        assert!(approx(sequence_ratio("apple", "ape"), 0.75));
        assert_eq!(sequence_ratio("ab", "azz"), 0.4);
    }

    #[test]
    fn typo_in_folder_scores_high() {
        let score = sequence_ratio("acess reviews", "Access Reviews");
        assert!(approx(score, 22.0 / 27.0), "score = {score}");
    }

    #[test]
    fn blocks_are_found_on_both_sides() {
        // "b" on the left of "XYZ" and "d" on the right both count
        assert!(approx(sequence_ratio("bXYZd", "bQXYZRd"), 10.0 / 12.0));
    }

    #[test]
    fn jaro_winkler_scale_is_available() {
        let score = SimilarityMetric::JaroWinkler.score("access review", "acess review");
        assert!(score > 0.9);
        assert_eq!(SimilarityMetric::JaroWinkler.score("same", "same"), 1.0);
    }
}
