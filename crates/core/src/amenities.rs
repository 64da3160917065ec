//! Amenity token parsing shared by training, alignment and dropdowns

use crate::record::RawValue;

/// Token recorded for a `null` list element
const NULL_TOKEN: &str = "none";

/// Split comma-separated amenity text into lower-cased, trimmed, non-empty tokens
pub fn parse_amenity_text(text: &str) -> Vec<String> {
    text.split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse an `Amenities` input value.
///
/// Text is split on commas and empty pieces are dropped. A list yields exactly
/// one token per element, blanks included; `null` elements read as `"none"`.
/// Anything else, or a missing field, parses to no tokens.
pub fn parse_amenities(value: Option<&RawValue>) -> Vec<String> {
    match value {
        Some(RawValue::Text(text)) => parse_amenity_text(text),
        Some(RawValue::List(items)) => items
            .iter()
            .map(|item| {
                item.to_text()
                    .unwrap_or_else(|| NULL_TOKEN.to_string())
                    .trim()
                    .to_lowercase()
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `1` when `flag` is among the parsed tokens, else `0`
pub fn indicator(tokens: &[String], flag: &str) -> u8 {
    u8::from(tokens.iter().any(|token| token == flag))
}
