use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::DecodeError,
    model::{Reminder, ReminderId},
    remote::{Fields, RawSnapshot},
};

pub const FIELD_ID: &str = "id";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_CHECKED: &str = "isChecked";
pub const FIELD_IMAGE_URL: &str = "imageURL";

/// Decoded view of the remote collection at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub reminders: Vec<Reminder>,
    /// Children that failed to decode and were left out.
    pub dropped: usize,
}

impl CollectionSnapshot {
    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn get(&self, id: &ReminderId) -> Option<&Reminder> {
        self.reminders.iter().find(|reminder| &reminder.id == id)
    }

    pub fn contains(&self, id: &ReminderId) -> bool {
        self.get(id).is_some()
    }
}

/// Current time truncated to whole milliseconds, so it survives the
/// epoch-seconds encoding unchanged.
pub fn stamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub fn encode(reminder: &Reminder) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_ID.into(), Value::from(reminder.id.as_str()));
    fields.insert(FIELD_TITLE.into(), Value::from(reminder.title.as_str()));
    fields.insert(
        FIELD_DESCRIPTION.into(),
        Value::from(reminder.description.as_str()),
    );
    fields.insert(FIELD_TIMESTAMP.into(), encode_timestamp(reminder.created_at));
    fields.insert(FIELD_CHECKED.into(), Value::Bool(reminder.completed));
    fields.insert(
        FIELD_IMAGE_URL.into(),
        Value::from(reminder.image_url.as_deref().unwrap_or_default()),
    );
    fields
}

fn encode_timestamp(at: DateTime<Utc>) -> Value {
    Value::from(at.timestamp_millis() as f64 / 1000.0)
}

/// Decode one child. The document key is authoritative for the id; a
/// mismatching `id` field is ignored.
pub fn decode(key: &str, value: &Value) -> Result<Reminder, DecodeError> {
    let fields = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let title = required_str(fields, FIELD_TITLE)?;
    let description = required_str(fields, FIELD_DESCRIPTION)?;
    let created_at = required_timestamp(fields)?;

    let completed = fields
        .get(FIELD_CHECKED)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let image_url = fields
        .get(FIELD_IMAGE_URL)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    Ok(Reminder {
        id: ReminderId::from(key),
        title,
        description,
        created_at,
        completed,
        image_url,
    })
}

/// Decode every child, dropping the malformed ones. The result is ordered by
/// creation time, then id.
pub fn decode_snapshot(raw: &RawSnapshot) -> CollectionSnapshot {
    let mut snapshot = CollectionSnapshot::default();
    for (key, value) in raw {
        match decode(key, value) {
            Ok(reminder) => snapshot.reminders.push(reminder),
            Err(err) => {
                debug!(%key, %err, "dropping malformed child");
                snapshot.dropped += 1;
            }
        }
    }
    snapshot
        .reminders
        .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    snapshot
}

fn required_str(fields: &Fields, field: &'static str) -> Result<String, DecodeError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(DecodeError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn required_timestamp(fields: &Fields) -> Result<DateTime<Utc>, DecodeError> {
    let wrong_type = DecodeError::WrongType {
        field: FIELD_TIMESTAMP,
        expected: "number",
    };
    let seconds = match fields.get(FIELD_TIMESTAMP) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField(FIELD_TIMESTAMP)),
        Some(value) => value.as_f64().ok_or_else(|| wrong_type.clone())?,
    };
    if !seconds.is_finite() {
        return Err(wrong_type);
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64).ok_or(wrong_type)
}
