//! Profile normalizer. Turns the loosely-typed fields a client sends into a
//! canonical `ProfileUpdate`. Pure: no I/O, never fails.
//!
//! Absent (or `null`) input fields stay `None` in the output so the store leaves
//! them untouched. Fields that were supplied but could not be coerced are
//! reported in `Normalized::dropped` instead of raising an error.

use serde::Deserialize;
use serde_json::Value;

use crate::models::profile::{Experience, ProfileUpdate};

/// Raw client payload for a profile update. Every field may be any JSON type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfileFields {
    pub name: Option<Value>,
    pub email: Option<Value>,
    pub age: Option<Value>,
    pub education: Option<Value>,
    pub interests: Option<Value>,
    pub skills: Option<Value>,
    pub experience: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub update: ProfileUpdate,
    /// Names of supplied fields that were discarded as uncoercible.
    pub dropped: Vec<&'static str>,
}

pub fn normalize_fields(raw: &RawProfileFields) -> Normalized {
    let mut dropped = Vec::new();

    let mut text = |field: &'static str, value: &Option<Value>| -> Option<String> {
        let value = value.as_ref()?;
        let coerced = scalar_to_string(value);
        if coerced.is_none() {
            dropped.push(field);
        }
        coerced
    };

    let name = text("name", &raw.name);
    let email = text("email", &raw.email);
    let education = text("education", &raw.education);

    let age = raw.age.as_ref().and_then(|v| {
        let coerced = coerce_non_negative_int(v);
        if coerced.is_none() {
            dropped.push("age");
        }
        coerced
    });

    Normalized {
        update: ProfileUpdate {
            name,
            email,
            age,
            education,
            interests: raw.interests.as_ref().map(normalize_list),
            skills: raw.skills.as_ref().map(normalize_list),
            experience: raw.experience.as_ref().map(normalize_experience),
        },
        dropped,
    }
}

/// Strings pass through unchanged; numbers and booleans are stringified.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accepts JSON numbers and numeric strings; fractions are truncated.
/// The result must fit the INTEGER column, so anything above `i32::MAX` is rejected.
fn coerce_non_negative_int(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !n.is_finite() || n < 0.0 || n > i32::MAX as f64 {
        return None;
    }
    Some(n.trunc() as u32)
}

/// A list of strings, or one comma-delimited string (split, trimmed, empties dropped).
/// Any other shape normalizes to an empty list.
fn normalize_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

fn normalize_experience(value: &Value) -> Vec<Experience> {
    match value {
        Value::Array(items) => items.iter().filter_map(experience_entry).collect(),
        Value::String(s) if s.trim().is_empty() => vec![],
        Value::String(s) => vec![Experience {
            job_title: s.clone(),
            years: 1,
        }],
        _ => vec![],
    }
}

/// Objects keep their `jobTitle` and `years` (defaulting to 0 when unusable);
/// bare scalars become a one-year entry. Objects without a title are skipped.
fn experience_entry(value: &Value) -> Option<Experience> {
    match value {
        Value::Object(obj) => {
            let job_title = obj.get("jobTitle").and_then(scalar_to_string)?;
            let years = obj
                .get("years")
                .and_then(coerce_non_negative_int)
                .unwrap_or(0);
            Some(Experience { job_title, years })
        }
        Value::Null | Value::Array(_) => None,
        scalar => scalar_to_string(scalar).map(|job_title| Experience {
            job_title,
            years: 1,
        }),
    }
}
