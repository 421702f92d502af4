//! Turning model text into typed values.
//!
//! Models are loose with JSON: they wrap it in code fences, return arrays
//! where an object was asked for, send `"N/A"` strings and numbers as text.
//! Everything here normalizes toward "absent" rather than failing, except
//! when the response has no usable JSON at all.

use serde_json::{Map, Value};

use super::ExtractedAlbum;
use crate::db::Enrichment;
use crate::error::ProviderError;

/// Pull the JSON out of a reply: the body of the first code block if there
/// is one, otherwise the span from the first `{` or `[` to its last closer.
pub fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(fence) = trimmed.find("```") {
        let after_fence = &trimmed[fence + 3..];
        // The opening line may carry a language tag
        let body = match after_fence.find('\n') {
            Some(newline) => &after_fence[newline + 1..],
            None => after_fence,
        };
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find(|c: char| c == '{' || c == '[') {
        let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
        if let Some(end) = trimmed.rfind(close) {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    trimmed.to_string()
}

fn parse_value(content: &str) -> Result<Value, ProviderError> {
    let json = extract_json(content);
    serde_json::from_str(&json).map_err(|e| {
        ProviderError::Malformed(format!("expected JSON, got {:?} ({})", truncate(content), e))
    })
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("n/a") {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items: Vec<String> = match value? {
        Value::Array(items) => items.iter().filter_map(|v| as_text(Some(v))).collect(),
        // A lone string where a list was expected
        Value::String(_) => as_text(value).into_iter().collect(),
        _ => Vec::new(),
    };
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn as_count(value: Option<&Value>) -> Option<u32> {
    let count = match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    count.filter(|n| *n > 0)
}

fn album_entry(value: &Value) -> Option<ExtractedAlbum> {
    let object = value.as_object()?;
    Some(ExtractedAlbum {
        album_name: as_text(object.get("album_name"))?,
        artists: as_list(object.get("artists"))?,
    })
}

/// Parse a list of `{album_name, artists}` entries. A bare object counts as
/// a one-album list; entries without a name or artists are dropped.
pub fn parse_extraction(content: &str) -> Result<Vec<ExtractedAlbum>, ProviderError> {
    let entries = match parse_value(content)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ProviderError::Malformed(format!(
                "expected a JSON array, got {}",
                other
            )))
        }
    };

    let albums: Vec<ExtractedAlbum> = entries.iter().filter_map(album_entry).collect();
    if albums.is_empty() {
        return Err(ProviderError::Malformed(
            "no readable album in the image".to_string(),
        ));
    }
    Ok(albums)
}

/// Parse an enrichment response. `matched_categories` are kept only when
/// they name an entry of `vocabulary`, using the vocabulary's spelling.
pub fn parse_enrichment(content: &str, vocabulary: &[String]) -> Result<Enrichment, ProviderError> {
    let object: Map<String, Value> = match parse_value(content)? {
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Malformed(format!(
                "expected a JSON object, got {}",
                other
            )))
        }
    };

    let user_categories = as_list(object.get("matched_categories")).and_then(|matched| {
        let mut canonical: Vec<String> = Vec::new();
        for candidate in matched {
            if let Some(entry) = vocabulary
                .iter()
                .find(|v| v.trim().eq_ignore_ascii_case(candidate.trim()))
            {
                if !canonical.contains(entry) {
                    canonical.push(entry.clone());
                }
            }
        }
        if canonical.is_empty() {
            None
        } else {
            Some(canonical)
        }
    });

    Ok(Enrichment {
        release_date: as_text(object.get("release_date")),
        label: as_text(object.get("label")),
        producer: as_text(object.get("producer")),
        total_duration: as_text(object.get("total_duration")),
        track_count: as_count(object.get("track_count")),
        track_listing: as_list(object.get("track_listing")),
        album_review: as_text(object.get("album_review")),
        musical_style: as_text(object.get("musical_style")),
        similar_artists: as_list(object.get("similar_artists")),
        awards: as_list(object.get("awards")),
        llm_categories: as_list(object.get("categories")),
        user_categories,
    })
}
