use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{FlightInfo, ItineraryDay, TourExtraction};

/// Outcome of decoding a model reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParsedReply {
    Structured(TourExtraction),
    /// Reply was not a JSON object. The raw text is kept for manual review.
    Unparseable { raw: String, reason: String },
}

impl ParsedReply {
    pub fn tour(&self) -> Option<&TourExtraction> {
        match self {
            Self::Structured(tour) => Some(tour),
            Self::Unparseable { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Remove surrounding whitespace and an optional Markdown code fence.
///
/// Handles ```` ```json ```` as well as a bare ```` ``` ```` opener.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Locate the JSON object in a reply: the whole (unfenced) reply if it
/// parses, else the outermost `{ ... }` span.
fn locate_object(raw: &str) -> Option<Map<String, Value>> {
    let body = strip_code_fences(raw);
    if let Ok(Value::Object(map)) = serde_json::from_str(body) {
        return Some(map);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&body[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Whether a reply decodes to a JSON object after fence stripping.
pub fn is_json_document(raw: &str) -> bool {
    locate_object(raw).is_some()
}

/// Decode a model reply into a tour record.
///
/// Returns the reply plus warnings about entries that had to be dropped.
/// Individual itinerary entries that fail to decode, or carry day number 0,
/// are skipped rather than failing the whole reply.
pub fn parse_tour_reply(raw: &str) -> (ParsedReply, Vec<String>) {
    let Some(object) = locate_object(raw) else {
        let reason = match serde_json::from_str::<Value>(strip_code_fences(raw)) {
            Ok(other) => format!("expected a JSON object, got {}", json_kind(&other)),
            Err(e) => e.to_string(),
        };
        return (
            ParsedReply::Unparseable {
                raw: raw.to_string(),
                reason,
            },
            Vec::new(),
        );
    };

    let mut warnings = Vec::new();

    let flight_info = match object.get("flight_info") {
        None | Some(Value::Null) => FlightInfo::default(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warnings.push(format!("flight_info ignored: {e}"));
            FlightInfo::default()
        }),
    };

    let itinerary = match object.get("itinerary") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => parse_itinerary_lenient(items, &mut warnings),
        Some(other) => {
            warnings.push(format!(
                "itinerary ignored: expected an array, got {}",
                json_kind(other)
            ));
            Vec::new()
        }
    };

    let tour = TourExtraction {
        tour_title: string_field(&object, "tour_title"),
        flight_info,
        services_text: string_field(&object, "services_text"),
        flight_details_text: string_field(&object, "flight_details_text"),
        full_pdf_text: string_field(&object, "full_pdf_text"),
        itinerary,
    };

    (ParsedReply::Structured(tour), warnings)
}

/// Parse itinerary entries leniently. Skips items that fail to deserialize.
fn parse_itinerary_lenient(items: &[Value], warnings: &mut Vec<String>) -> Vec<ItineraryDay> {
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| match serde_json::from_value::<ItineraryDay>(v.clone()) {
            Ok(day) if day.day_number > 0 => Some(day),
            Ok(_) => {
                warnings.push(format!("itinerary entry {} skipped: day_number is 0", idx + 1));
                None
            }
            Err(e) => {
                warnings.push(format!("itinerary entry {} skipped: {e}", idx + 1));
                None
            }
        })
        .collect()
}

/// Text fields are strings in the schema; numbers are tolerated, anything
/// else reads as empty.
fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
