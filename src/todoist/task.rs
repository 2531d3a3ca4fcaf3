use std::fmt;

use chrono::NaiveDate;
use serde::{
    de::{self, Unexpected},
    Deserialize, Deserializer, Serialize,
};

use crate::error::MalformedTaskError;

/// Todoist task identifier, kept in whatever JSON form the API sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Text(id) => f.write_str(id),
            TaskId::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Due {
    /// Human readable phrase, e.g. "every monday" or "Sep 10".
    pub string: String,
    /// `YYYY-MM-DD`, or a full datetime for tasks with a time of day.
    pub date: String,
}

/// A task as returned by the Todoist `tasks/filter` endpoint.
///
/// Fields Todoist sends that are not listed here are ignored. Optional fields
/// may be absent or `null`, but must have the right type when present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTask {
    pub id: TaskId,
    pub content: String,
    pub checked: bool,
    #[serde(default, deserialize_with = "empty_due_as_none")]
    pub due: Option<Due>,
    #[serde(deserialize_with = "integer")]
    pub priority: serde_json::Number,
    #[serde(default)]
    pub description: Option<String>,
}

// Todoist sends `"due": {}` for some undated tasks.
fn empty_due_as_none<'de, D>(deserializer: D) -> Result<Option<Due>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => Due::deserialize(value).map(Some).map_err(de::Error::custom),
    }
}

fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<serde_json::Number, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    match number.as_f64() {
        Some(value) if number.is_f64() => {
            Err(de::Error::invalid_type(Unexpected::Float(value), &"an integer"))
        }
        _ => Ok(number),
    }
}

impl RawTask {
    /// Validate one untyped record from the API response.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, MalformedTaskError> {
        RawTask::deserialize(value).map_err(|e| MalformedTaskError {
            id: match value.get("id") {
                Some(serde_json::Value::String(id)) => id.clone(),
                Some(serde_json::Value::Number(id)) => id.to_string(),
                _ => "<unknown>".to_owned(),
            },
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "very high")]
    VeryHigh,
    #[serde(rename = "urgent")]
    Urgent,
}

impl Priority {
    /// Todoist levels run from 1 (normal) to 4 (urgent); anything else is normal.
    pub fn from_level(level: i64) -> Self {
        match level {
            2 => Priority::High,
            3 => Priority::VeryHigh,
            4 => Priority::Urgent,
            _ => Priority::Normal,
        }
    }

    /// Integers too large for `i64` are outside 1..=4 as well.
    pub fn from_number(level: &serde_json::Number) -> Self {
        level.as_i64().map_or(Priority::Normal, Self::from_level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::VeryHigh => "very high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trimmed down task handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTask {
    pub id: TaskId,
    pub content: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_overdue: Option<bool>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub fn normalize(raw: &RawTask, today: NaiveDate) -> NormalizedTask {
    normalize_against(raw, &iso_date(today))
}

/// Normalize every task against the same `today`, keeping input order.
pub fn normalize_all(raws: &[RawTask], today: NaiveDate) -> Vec<NormalizedTask> {
    let today = iso_date(today);
    raws.iter()
        .map(|raw| normalize_against(raw, &today))
        .collect()
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// Both sides are ISO 8601, so lexical order is calendar order. A datetime due
// on the current day sorts after the bare date and is not overdue.
fn normalize_against(raw: &RawTask, today: &str) -> NormalizedTask {
    NormalizedTask {
        id: raw.id.clone(),
        content: raw.content.clone(),
        completed: raw.checked,
        due_date: raw.due.as_ref().map(|due| due.string.clone()),
        is_overdue: raw.due.as_ref().map(|due| due.date.as_str() < today),
        priority: Priority::from_number(&raw.priority),
        description: raw
            .description
            .as_ref()
            .filter(|description| !description.is_empty())
            .cloned(),
    }
}
