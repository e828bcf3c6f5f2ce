//! Character-sequence similarity for approximate food-name matching.
//!
//! Scores are longest-matching-blocks ratios in [0, 1]: twice the number of
//! matched characters over the combined length of both strings, with blocks
//! found by recursively locating the longest common substring. Anything
//! satisfying the same ranking contract can be substituted via [`Ranker`].

/// A candidate name with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredName {
    pub name: String,
    pub score: f64,
}

/// Pluggable ranking function: `(phrase, candidates, max_results, cutoff)`
/// to an ordered best-first sequence.
pub type Ranker = fn(&str, &[String], usize, f64) -> Vec<ScoredName>;

/// Similarity ratio between two strings.
///
/// 1.0 for identical strings (including two empty ones), 0.0 for strings
/// with no characters in common. Case-sensitive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Rank `candidates` against `query`, keeping scores at or above `cutoff`,
/// best first, truncated to `max_results`. Ties keep candidate order.
#[must_use]
pub fn close_matches(
    query: &str,
    candidates: &[String],
    max_results: usize,
    cutoff: f64,
) -> Vec<ScoredName> {
    let mut scored: Vec<ScoredName> = candidates
        .iter()
        .filter_map(|name| {
            let score = ratio(query, name);
            (score >= cutoff).then(|| ScoredName {
                name: name.clone(),
                score,
            })
        })
        .collect();
    // Stable sort: equal scores stay in candidate order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(max_results);
    scored
}

/// Total characters covered by matching blocks: the longest common block,
/// plus matches recursively found to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, size) = longest_block(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + size..], &b[b_start + size..])
}

/// Longest common contiguous block, earliest in `a` (then `b`) on ties.
/// Returns `(start_in_a, start_in_b, length)`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                cur[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = cur;
    }
    best
}
