use anyhow::Result;

use crate::db::Store;
use crate::index::ReferenceIndex;
use crate::models::FoodRecord;
use crate::similarity::{Ranker, close_matches};

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const SUBSTRING_CONFIDENCE: f64 = 0.85;
pub const APPROX_CONFIDENCE: f64 = 0.7;

const MATCH_CUTOFF: f64 = 0.5;
const MATCH_LIMIT: usize = 3;
const SUGGESTION_CUTOFF: f64 = 0.4;
const SUGGESTION_LIMIT: usize = 5;

/// Outcome of resolving a food phrase against the reference data.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved {
        record: FoodRecord,
        canonical_name: String,
        confidence: f64,
    },
    NotFound {
        suggestions: Vec<String>,
    },
}

/// Exact-then-approximate food-name resolution.
///
/// Exact case-insensitive store hits score 1.0. Otherwise reference names
/// are ranked by similarity; the best candidate at or above 0.5 resolves
/// with 0.85 when the phrase is a case-insensitive substring of it, else
/// 0.7. With no candidate, up to five suggestions are gathered at the
/// looser 0.4 cutoff. Resolution is deterministic and never mutates the
/// index.
pub struct FoodResolver {
    ranker: Ranker,
}

impl Default for FoodResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FoodResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ranker: close_matches,
        }
    }

    /// Substitute a different similarity-ranking function.
    #[must_use]
    pub fn with_ranker(ranker: Ranker) -> Self {
        Self { ranker }
    }

    /// Resolve a food phrase. `phrase` must be non-empty after trimming;
    /// callers validate that before resolution.
    pub fn resolve(
        &self,
        store: &dyn Store,
        index: &ReferenceIndex,
        phrase: &str,
    ) -> Result<Resolution> {
        if let Some(record) = store.food_by_name(phrase)? {
            let canonical_name = record.name.clone();
            return Ok(Resolution::Resolved {
                record,
                canonical_name,
                confidence: EXACT_CONFIDENCE,
            });
        }

        let candidates = (self.ranker)(phrase, index.all_names(), MATCH_LIMIT, MATCH_CUTOFF);
        if let Some(best) = candidates.first() {
            if let Some(record) = store.food_by_name(&best.name)? {
                let confidence = if best
                    .name
                    .to_lowercase()
                    .contains(&phrase.to_lowercase())
                {
                    SUBSTRING_CONFIDENCE
                } else {
                    APPROX_CONFIDENCE
                };
                let canonical_name = record.name.clone();
                return Ok(Resolution::Resolved {
                    record,
                    canonical_name,
                    confidence,
                });
            }
        }

        let suggestions =
            (self.ranker)(phrase, index.all_names(), SUGGESTION_LIMIT, SUGGESTION_CUTOFF)
                .into_iter()
                .map(|s| s.name)
                .collect();
        Ok(Resolution::NotFound { suggestions })
    }
}
