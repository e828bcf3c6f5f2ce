use serde_json::Value;

/// Default serving weight when the query carries none.
pub const DEFAULT_WEIGHT_G: u32 = 100;

/// At most 5 digits are read from a digit run; the rest stays in the phrase.
const MAX_WEIGHT_DIGITS: usize = 5;

const UNIT_TOKENS: &[&str] = &["grams", "gram", "g"];

/// A parsed user query: the residual food phrase and the serving weight.
///
/// Ephemeral — constructed per request and discarded after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub food_phrase: String,
    pub weight_g: u32,
}

/// Extract an optional weight-in-grams from free text.
///
/// The first run of 1-5 ASCII digits, optionally followed by whitespace and
/// a unit token ("g", "gram", "grams", case-insensitive), is taken as the
/// weight and removed from the text; the remainder, trimmed, is the food
/// phrase. Weight defaults to 100 when absent and is clamped to minimum 1.
///
/// Only the first digit group is treated as the weight, so "2 eggs 120g"
/// parses as weight 2 with phrase "eggs 120g". Known limitation.
#[must_use]
pub fn parse_query(raw: &str) -> ParsedQuery {
    match find_weight(raw) {
        Some((start, end, weight)) => {
            let mut phrase = String::with_capacity(raw.len());
            phrase.push_str(&raw[..start]);
            phrase.push_str(&raw[end..]);
            ParsedQuery {
                food_phrase: phrase.trim().to_string(),
                weight_g: weight.max(1),
            }
        }
        None => ParsedQuery {
            food_phrase: raw.trim().to_string(),
            weight_g: DEFAULT_WEIGHT_G,
        },
    }
}

/// Coerce a caller-supplied weight override from an untyped JSON value.
///
/// Integers, integer-valued floats (truncated) and integer strings are
/// accepted when >= 1; anything else yields None and the parsed/default
/// weight stands. The silent fallback is deliberate.
#[must_use]
pub fn explicit_weight(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v >= 1)
}

/// Locate the first weight span. Returns `(byte_start, byte_end, value)`
/// where the span covers the digits plus any attached unit token.
fn find_weight(text: &str) -> Option<(usize, usize, u32)> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut digits_end = start;
    while digits_end < bytes.len()
        && bytes[digits_end].is_ascii_digit()
        && digits_end - start < MAX_WEIGHT_DIGITS
    {
        digits_end += 1;
    }
    let value: u32 = text[start..digits_end].parse().ok()?;
    let end = consume_unit(text, digits_end);
    Some((start, end, value))
}

/// Extend the span over optional whitespace plus a unit token, longest
/// token first.
fn consume_unit(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    let ws = rest.len() - rest.trim_start().len();
    let after = rest[ws..].as_bytes();
    for unit in UNIT_TOKENS {
        if let Some(prefix) = after.get(..unit.len()) {
            if prefix.eq_ignore_ascii_case(unit.as_bytes()) {
                return from + ws + unit.len();
            }
        }
    }
    from
}
