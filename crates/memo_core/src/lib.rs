pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod remote;
pub mod schema;
pub mod service;

pub use crate::config::{MutationMode, SyncConfig};
pub use crate::error::{NotFoundError, RemoteError, SyncError, ValidationError};
pub use crate::model::{Reminder, ReminderDraft, ReminderEdit, ReminderId};
pub use crate::schema::CollectionSnapshot;
pub use crate::service::{ReminderSync, ReminderSyncBuilder};
