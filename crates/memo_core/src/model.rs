use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-generated key of a reminder. Doubles as the remote document key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ReminderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ReminderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    /// Public reference to the attached image, if any.
    pub image_url: Option<String>,
}

impl Reminder {
    pub fn has_attachment(&self) -> bool {
        self.image_url.is_some()
    }

    /// Creation time in medium date / medium time style, e.g. `Oct 19, 2026 at 3:04:05 PM`.
    pub fn formatted_created_at(&self) -> String {
        self.created_at
            .format("%b %-d, %Y at %-I:%M:%S %p")
            .to_string()
    }
}

/// Input for a new reminder, as collected by an add form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderDraft {
    pub title: String,
    pub description: String,
    pub attachment: Option<Vec<u8>>,
}

impl ReminderDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.attachment = Some(bytes.into());
        self
    }
}

/// Field set for an edit. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub attachment: Option<Vec<u8>>,
    pub completed: Option<bool>,
}

impl ReminderEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attachment(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.attachment = Some(bytes.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.attachment.is_none()
            && self.completed.is_none()
    }
}
