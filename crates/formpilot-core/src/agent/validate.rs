//! Answer validation for pending `ASK_*` fields.
//!
//! Dates and datetimes are format-validated deterministically before
//! storage and normalized on success. Locations accept a `{lat, lng}`
//! pair with range checks. Everything else is taken as-is: dropdowns and
//! checkboxes are UI-constrained, and text relevance is the LLM's call.

use chrono::NaiveDate;
use formpilot_types::session::AskKind;
use serde_json::Value;

use crate::dates::{normalize_date, normalize_datetime};

/// Validate a raw user answer for the given ask kind.
///
/// Returns the value to store on success (normalized for dates and
/// datetimes, structured for locations) or a user-facing error message.
pub fn validate_answer(kind: AskKind, raw: &str, today: NaiveDate) -> Result<Value, String> {
    let trimmed = raw.trim();
    match kind {
        AskKind::Date => validate_date_answer(trimmed, today).map(Value::String),
        AskKind::Datetime => validate_datetime_answer(trimmed, today).map(Value::String),
        AskKind::Location => Ok(validate_location_answer(trimmed)?),
        AskKind::Checkbox => Ok(parse_checkbox_answer(trimmed)),
        AskKind::Text | AskKind::Dropdown => Ok(Value::String(trimmed.to_string())),
    }
}

/// Validate that a string is a recognizable date; normalize to `YYYY-MM-DD`.
pub fn validate_date_answer(value: &str, today: NaiveDate) -> Result<String, String> {
    if value.is_empty() {
        return Err("Date cannot be empty.".to_string());
    }
    normalize_date(value, today).ok_or_else(|| {
        format!(
            "'{value}' is not a valid date. \
             Please provide a date like 2026-01-15 or January 15, 2026."
        )
    })
}

/// Validate that a string is a recognizable datetime; normalize to
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn validate_datetime_answer(value: &str, today: NaiveDate) -> Result<String, String> {
    if value.is_empty() {
        return Err("Datetime cannot be empty.".to_string());
    }
    normalize_datetime(value, today).ok_or_else(|| {
        format!(
            "'{value}' is not a valid date/time. \
             Please provide something like 2026-01-15 10:30 AM."
        )
    })
}

/// Accept a `{lat, lng}` pair; ranges are checked when the answer parses
/// as JSON, otherwise the raw text passes through (the map widget
/// constrains the shape in practice).
fn validate_location_answer(value: &str) -> Result<Value, String> {
    let Ok(parsed) = serde_json::from_str::<Value>(value) else {
        return Ok(Value::String(value.to_string()));
    };
    let Some(object) = parsed.as_object() else {
        return Ok(Value::String(value.to_string()));
    };
    let (Some(lat), Some(lng)) = (
        object.get("lat").and_then(Value::as_f64),
        object.get("lng").and_then(Value::as_f64),
    ) else {
        return Ok(Value::String(value.to_string()));
    };

    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Latitude {lat} is out of range [-90, 90]."));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(format!("Longitude {lng} is out of range [-180, 180]."));
    }
    Ok(parsed)
}

/// A checkbox answer may arrive as a JSON array of selections; keep the
/// array shape when it does.
fn parse_checkbox_answer(value: &str) -> Value {
    match serde_json::from_str::<Value>(value) {
        Ok(array @ Value::Array(_)) => array,
        _ => Value::String(value.to_string()),
    }
}
