use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// When a created reminder enters the local collection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    /// Append only after the remote write is acknowledged.
    #[default]
    Pessimistic,
    /// Append before the remote write; a failed write leaves the provisional
    /// record in place until the next snapshot replaces the collection.
    Optimistic,
}

impl MutationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pessimistic" => Some(Self::Pessimistic),
            "optimistic" => Some(Self::Optimistic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    pub collection: String,
    pub blob_prefix: String,
    pub placeholder_title: String,
    pub mutation_mode: MutationMode,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(collection) = non_blank(lookup("MEMO_COLLECTION")) {
            anyhow::ensure!(
                !collection.contains('/'),
                "collection `{}` must be a single path segment",
                collection
            );
            config.collection = collection;
        }
        if let Some(prefix) = non_blank(lookup("MEMO_BLOB_PREFIX")) {
            config.blob_prefix = prefix.trim_matches('/').to_string();
        }
        if let Some(title) = non_blank(lookup("MEMO_PLACEHOLDER_TITLE")) {
            config.placeholder_title = title;
        }
        if let Some(mode) = non_blank(lookup("MEMO_MUTATION_MODE")) {
            match MutationMode::parse(&mode) {
                Some(parsed) => config.mutation_mode = parsed,
                None => warn!(%mode, "ignoring unknown mutation mode"),
            }
        }
        info!(
            collection = %config.collection,
            mode = ?config.mutation_mode,
            "sync configuration loaded"
        );
        Ok(config)
    }

    /// Object-store path for the attachment of the record stored under `key`.
    pub fn blob_path(&self, key: &str) -> String {
        if self.blob_prefix.is_empty() {
            format!("{key}.jpg")
        } else {
            format!("{}/{key}.jpg", self.blob_prefix)
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: "reminders".to_string(),
            blob_prefix: "images".to_string(),
            placeholder_title: "Empty Title".to_string(),
            mutation_mode: MutationMode::Pessimistic,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.blob_path("abc"), "images/abc.jpg");
    }

    #[test]
    fn applies_overrides_and_ignores_garbage() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("MEMO_COLLECTION", "memos"),
            ("MEMO_BLOB_PREFIX", "/attachments/"),
            ("MEMO_PLACEHOLDER_TITLE", "   "),
            ("MEMO_MUTATION_MODE", "sometimes"),
        ]))
        .unwrap();
        assert_eq!(config.collection, "memos");
        assert_eq!(config.blob_path("k"), "attachments/k.jpg");
        assert_eq!(config.placeholder_title, "Empty Title");
        assert_eq!(config.mutation_mode, MutationMode::Pessimistic);
    }

    #[test]
    fn parses_optimistic_mode() {
        let config =
            SyncConfig::from_lookup(lookup(&[("MEMO_MUTATION_MODE", " Optimistic ")])).unwrap();
        assert_eq!(config.mutation_mode, MutationMode::Optimistic);
    }

    #[test]
    fn rejects_nested_collection_path() {
        assert!(SyncConfig::from_lookup(lookup(&[("MEMO_COLLECTION", "a/b")])).is_err());
    }
}
