use serde::{Deserialize, Serialize};

/// A reference food with macros expressed per 100 g.
///
/// Records are written once by the dataset loader and never mutated or
/// deleted at runtime. Names are unique case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodRecord {
    pub id: i64,
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodRecord {
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
}

/// Nutrition facts scaled to a serving weight, rounded to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientAmounts {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Scale a record's per-100g macros to a serving weight.
///
/// `weight_g` is guaranteed >= 1 by the query parser's contract, so there
/// are no error conditions here.
#[must_use]
pub fn scale_nutrients(record: &FoodRecord, weight_g: u32) -> NutrientAmounts {
    let factor = f64::from(weight_g) / 100.0;
    NutrientAmounts {
        calories: round2(record.calories_per_100g * factor),
        protein: round2(record.protein_per_100g * factor),
        carbs: round2(record.carbs_per_100g * factor),
        fat: round2(record.fat_per_100g * factor),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One logged message in the conversation history.
///
/// Turns are append-only and insertion-ordered; retrieval is
/// most-recent-first. The nullable fields are only populated where the
/// turn carries them (e.g. nutrients on a resolved assistant turn).
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    #[serde(skip_serializing)]
    pub id: i64,
    pub role: String,
    pub text: String,
    pub query: Option<String>,
    pub weight_g: Option<i64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub created_at: String,
}

/// Append shape for a conversation turn. Timestamps are stamped by the
/// store at append time.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub role: String,
    pub text: String,
    pub query: Option<String>,
    pub weight_g: Option<i64>,
    pub nutrients: Option<NutrientAmounts>,
}

impl NewTurn {
    #[must_use]
    pub fn user(raw_text: &str, food_phrase: &str, weight_g: u32) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            text: raw_text.to_string(),
            query: Some(food_phrase.to_string()),
            weight_g: Some(i64::from(weight_g)),
            nutrients: None,
        }
    }

    /// Assistant turn for a failed resolution (message text only).
    #[must_use]
    pub fn assistant(text: &str) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            text: text.to_string(),
            query: None,
            weight_g: None,
            nutrients: None,
        }
    }

    /// Assistant turn for a resolved query, carrying the canonical name and
    /// the scaled nutrients.
    #[must_use]
    pub fn assistant_resolved(
        text: &str,
        canonical_name: &str,
        weight_g: u32,
        nutrients: NutrientAmounts,
    ) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            text: text.to_string(),
            query: Some(canonical_name.to_string()),
            weight_g: Some(i64::from(weight_g)),
            nutrients: Some(nutrients),
        }
    }
}
