use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::db::Store;
use crate::index::ReferenceIndex;
use crate::models::{NewTurn, NutrientAmounts, scale_nutrients};
use crate::query;
use crate::resolver::{FoodResolver, Resolution};

pub const DEFAULT_HISTORY_LIMIT: i64 = 30;

const MISSING_QUERY_MESSAGE: &str = "Please provide a food name.";
const NOT_FOUND_MESSAGE: &str = "Food not found.";

/// Outcome of one chat query. Every variant has already been recorded in
/// the conversation log by the time it is returned.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Answer(ChatAnswer),
    MissingQuery {
        message: String,
    },
    NotFound {
        message: String,
        suggestions: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub matched_name: String,
    pub confidence: f64,
    pub weight_g: u32,
    pub nutrients: NutrientAmounts,
    pub text: String,
}

impl ChatOutcome {
    /// Wire shape shared by the API server and the CLI's JSON output.
    #[must_use]
    pub fn to_response(&self) -> serde_json::Value {
        match self {
            Self::Answer(answer) => json!({
                "ok": true,
                "matched_name": answer.matched_name,
                "confidence": answer.confidence,
                "weight_g": answer.weight_g,
                "calories": answer.nutrients.calories,
                "protein": answer.nutrients.protein,
                "carbs": answer.nutrients.carbs,
                "fat": answer.nutrients.fat,
                "text": answer.text,
            }),
            Self::MissingQuery { message } => json!({
                "ok": false,
                "message": message,
            }),
            Self::NotFound {
                message,
                suggestions,
            } => json!({
                "ok": false,
                "message": message,
                "suggestions": suggestions,
            }),
        }
    }
}

/// The query-resolution pipeline plus conversation log, behind one object.
///
/// Built once at startup after the reference store is populated; safe to
/// share across request handlers. Parsing, resolution, and scaling are
/// pure CPU work — only turn appends and history reads touch the store's
/// write path, and failures there never surface to the caller.
pub struct NoshService {
    store: Arc<dyn Store>,
    index: ReferenceIndex,
    resolver: FoodResolver,
}

impl NoshService {
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        let index = ReferenceIndex::build(store.as_ref())?;
        Ok(Self {
            store,
            index,
            resolver: FoodResolver::new(),
        })
    }

    #[must_use]
    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Answer one food query.
    ///
    /// `explicit_weight_g` overrides the weight parsed from the text when
    /// present. Every call — answered, not-found, or missing-query —
    /// appends exactly one user turn and then one assistant turn.
    pub fn answer(&self, raw: &str, explicit_weight_g: Option<u32>) -> ChatOutcome {
        let raw = raw.trim();
        let parsed = query::parse_query(raw);
        let weight_g = explicit_weight_g.unwrap_or(parsed.weight_g);

        self.append_turn(&NewTurn::user(raw, &parsed.food_phrase, weight_g));

        if parsed.food_phrase.is_empty() {
            self.append_turn(&NewTurn::assistant(MISSING_QUERY_MESSAGE));
            return ChatOutcome::MissingQuery {
                message: MISSING_QUERY_MESSAGE.to_string(),
            };
        }

        let resolution = self
            .resolver
            .resolve(self.store.as_ref(), &self.index, &parsed.food_phrase)
            .unwrap_or_else(|e| {
                // A failed reference lookup degrades to a miss.
                eprintln!("Reference lookup failed: {e:#}");
                Resolution::NotFound {
                    suggestions: Vec::new(),
                }
            });

        match resolution {
            Resolution::Resolved {
                record,
                canonical_name,
                confidence,
            } => {
                let nutrients = scale_nutrients(&record, weight_g);
                let text = format!(
                    "{canonical_name} ({weight_g}g) Calories:{} Protein:{} Carbs:{} Fat:{}",
                    nutrients.calories, nutrients.protein, nutrients.carbs, nutrients.fat,
                );
                self.append_turn(&NewTurn::assistant_resolved(
                    &text,
                    &canonical_name,
                    weight_g,
                    nutrients,
                ));
                ChatOutcome::Answer(ChatAnswer {
                    matched_name: canonical_name,
                    confidence,
                    weight_g,
                    nutrients,
                    text,
                })
            }
            Resolution::NotFound { suggestions } => {
                let mut message = NOT_FOUND_MESSAGE.to_string();
                if !suggestions.is_empty() {
                    message.push_str(" Did you mean: ");
                    message.push_str(&suggestions.join(", "));
                }
                self.append_turn(&NewTurn::assistant(&message));
                ChatOutcome::NotFound {
                    message,
                    suggestions,
                }
            }
        }
    }

    /// Most-recent-first conversation history. A failed read is reported
    /// on stderr and yields an empty list.
    #[must_use]
    pub fn history(&self, limit: i64) -> Vec<crate::models::ConversationTurn> {
        match self.store.recent_turns(limit) {
            Ok(turns) => turns,
            Err(e) => {
                eprintln!("Failed to read conversation history: {e:#}");
                Vec::new()
            }
        }
    }

    fn append_turn(&self, turn: &NewTurn) {
        // The in-flight response proceeds even when the log write fails.
        if let Err(e) = self.store.append_turn(turn) {
            eprintln!("Failed to record conversation turn: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ConversationTurn, FoodRecord, NewFoodRecord};
    use std::sync::Mutex;

    fn test_service(names: &[(&str, f64, f64, f64, f64)]) -> NoshService {
        let db = Database::open_in_memory().unwrap();
        for &(name, calories, protein, carbs, fat) in names {
            db.insert_food(&NewFoodRecord {
                name: name.to_string(),
                calories_per_100g: calories,
                protein_per_100g: protein,
                carbs_per_100g: carbs,
                fat_per_100g: fat,
            })
            .unwrap();
        }
        NoshService::new(Arc::new(Mutex::new(db))).unwrap()
    }

    fn chicken_service() -> NoshService {
        test_service(&[
            ("chicken breast", 165.0, 31.0, 0.0, 3.6),
            ("banana", 89.0, 1.1, 23.0, 0.3),
        ])
    }

    #[test]
    fn test_answer_exact_with_parsed_weight() {
        let svc = chicken_service();
        match svc.answer("chicken breast 200g", None) {
            ChatOutcome::Answer(answer) => {
                assert_eq!(answer.matched_name, "chicken breast");
                assert!((answer.confidence - 1.0).abs() < f64::EPSILON);
                assert_eq!(answer.weight_g, 200);
                assert!((answer.nutrients.calories - 330.0).abs() < f64::EPSILON);
                assert!((answer.nutrients.protein - 62.0).abs() < f64::EPSILON);
                assert!(answer.text.contains("chicken breast (200g)"));
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn test_answer_defaults_to_100g() {
        let svc = chicken_service();
        match svc.answer("banana", None) {
            ChatOutcome::Answer(answer) => {
                assert_eq!(answer.weight_g, 100);
                assert!((answer.nutrients.calories - 89.0).abs() < f64::EPSILON);
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn test_answer_explicit_weight_overrides_parsed() {
        let svc = chicken_service();
        match svc.answer("banana 50g", Some(200)) {
            ChatOutcome::Answer(answer) => {
                assert_eq!(answer.weight_g, 200);
                assert!((answer.nutrients.calories - 178.0).abs() < f64::EPSILON);
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn test_answer_approximate_match() {
        let svc = chicken_service();
        match svc.answer("chiken", None) {
            ChatOutcome::Answer(answer) => {
                assert_eq!(answer.matched_name, "chicken breast");
                assert!(answer.confidence < 1.0);
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn test_answer_not_found() {
        let svc = chicken_service();
        match svc.answer("zzzznotafood", None) {
            ChatOutcome::NotFound {
                message,
                suggestions,
            } => {
                assert!(message.starts_with("Food not found."));
                assert!(suggestions.len() <= 5);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn test_answer_missing_query() {
        let svc = chicken_service();
        match svc.answer("   ", None) {
            ChatOutcome::MissingQuery { message } => {
                assert_eq!(message, "Please provide a food name.");
            }
            other => panic!("expected missing query, got {other:?}"),
        }
    }

    #[test]
    fn test_every_outcome_logs_one_user_and_one_assistant_turn() {
        let svc = chicken_service();
        svc.answer("chicken breast", None);
        svc.answer("zzzznotafood", None);
        svc.answer("", None);

        let turns = svc.history(DEFAULT_HISTORY_LIMIT);
        assert_eq!(turns.len(), 6);
        // Most-recent-first: assistant then user, repeated.
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, "assistant");
            assert_eq!(pair[1].role, "user");
        }
    }

    #[test]
    fn test_missing_query_still_logs_turns() {
        let svc = chicken_service();
        svc.answer("", None);
        let turns = svc.history(DEFAULT_HISTORY_LIMIT);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "assistant");
        assert_eq!(turns[0].text, "Please provide a food name.");
        assert_eq!(turns[1].role, "user");
        assert_eq!(turns[1].query.as_deref(), Some(""));
    }

    #[test]
    fn test_history_limit_and_order() {
        let svc = chicken_service();
        svc.answer("banana", None);
        svc.answer("chicken breast", None);
        svc.answer("banana 50g", None);

        let turns = svc.history(2);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "assistant");
        assert_eq!(turns[1].role, "user");
        assert_eq!(turns[1].text, "banana 50g");
        assert!(turns[0].id > turns[1].id);
    }

    #[test]
    fn test_assistant_turn_carries_nutrients() {
        let svc = chicken_service();
        svc.answer("chicken breast 200g", None);
        let turns = svc.history(1);
        let assistant = &turns[0];
        assert_eq!(assistant.query.as_deref(), Some("chicken breast"));
        assert_eq!(assistant.weight_g, Some(200));
        assert!((assistant.calories.unwrap() - 330.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_response_shapes() {
        let svc = chicken_service();

        let response = svc.answer("chicken breast 200g", None).to_response();
        assert_eq!(response["ok"], true);
        assert_eq!(response["matched_name"], "chicken breast");
        assert_eq!(response["weight_g"], 200);
        assert!((response["calories"].as_f64().unwrap() - 330.0).abs() < f64::EPSILON);

        let response = svc.answer("", None).to_response();
        assert_eq!(response["ok"], false);
        assert_eq!(response["message"], "Please provide a food name.");
        assert!(response.get("suggestions").is_none());

        let response = svc.answer("zzzznotafood", None).to_response();
        assert_eq!(response["ok"], false);
        assert!(response["suggestions"].is_array());
    }

    // --- Persistence-failure recovery ---

    struct FailingStore;

    impl Store for FailingStore {
        fn insert_food(&self, _food: &NewFoodRecord) -> Result<bool> {
            anyhow::bail!("store offline")
        }

        fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>> {
            if name == "apple" {
                Ok(Some(FoodRecord {
                    id: 1,
                    name: "apple".to_string(),
                    calories_per_100g: 52.0,
                    protein_per_100g: 0.3,
                    carbs_per_100g: 14.0,
                    fat_per_100g: 0.2,
                    created_at: String::new(),
                }))
            } else {
                Ok(None)
            }
        }

        fn food_count(&self) -> Result<i64> {
            Ok(1)
        }

        fn all_food_names(&self) -> Result<Vec<String>> {
            Ok(vec!["apple".to_string()])
        }

        fn append_turn(&self, _turn: &NewTurn) -> Result<ConversationTurn> {
            anyhow::bail!("log write failed")
        }

        fn recent_turns(&self, _limit: i64) -> Result<Vec<ConversationTurn>> {
            anyhow::bail!("log read failed")
        }
    }

    #[test]
    fn test_log_write_failure_does_not_block_response() {
        let svc = NoshService::new(Arc::new(FailingStore)).unwrap();
        match svc.answer("apple 50g", None) {
            ChatOutcome::Answer(answer) => {
                assert_eq!(answer.matched_name, "apple");
                assert!((answer.nutrients.calories - 26.0).abs() < f64::EPSILON);
            }
            other => panic!("expected answer despite log failure, got {other:?}"),
        }
    }

    #[test]
    fn test_history_read_failure_yields_empty() {
        let svc = NoshService::new(Arc::new(FailingStore)).unwrap();
        assert!(svc.history(DEFAULT_HISTORY_LIMIT).is_empty());
    }

    struct LookupFailingStore;

    impl Store for LookupFailingStore {
        fn insert_food(&self, _food: &NewFoodRecord) -> Result<bool> {
            anyhow::bail!("store offline")
        }

        fn food_by_name(&self, _name: &str) -> Result<Option<FoodRecord>> {
            anyhow::bail!("reference store offline")
        }

        fn food_count(&self) -> Result<i64> {
            Ok(0)
        }

        fn all_food_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn append_turn(&self, _turn: &NewTurn) -> Result<ConversationTurn> {
            anyhow::bail!("log write failed")
        }

        fn recent_turns(&self, _limit: i64) -> Result<Vec<ConversationTurn>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_reference_lookup_failure_degrades_to_not_found() {
        let svc = NoshService::new(Arc::new(LookupFailingStore)).unwrap();
        match svc.answer("apple", None) {
            ChatOutcome::NotFound { suggestions, .. } => assert!(suggestions.is_empty()),
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
