use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

fn default_category() -> String {
    "general".to_string()
}

/// Dataset ids may be JSON strings or integers; both are stored stringified.
fn deserialize_entry_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Text(s) => Ok(s),
        RawId::Number(n) => Ok(n.to_string()),
    }
}

/// One question/answer record from the static knowledge dataset.
///
/// Immutable after load; the index derives one document per entry, keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    #[serde(deserialize_with = "deserialize_entry_id")]
    pub id: String,
    pub question: String,
    pub answer: String,
    pub urgency: String,
    pub species: String,
    #[serde(default = "default_category")]
    pub category: String,
}

/// Parse a JSON array of knowledge entries, failing fast on any malformed or
/// incomplete record. No partial datasets are ever returned.
pub fn parse_dataset(text: &str) -> Result<Vec<KnowledgeEntry>, AppError> {
    let entries: Vec<KnowledgeEntry> = serde_json::from_str(text).map_err(|e| {
        AppError::new("KB_DATASET_INVALID", "Failed to decode knowledge dataset")
            .with_details(e.to_string())
    })?;

    let mut seen_ids: BTreeSet<&str> = BTreeSet::new();
    for (pos, entry) in entries.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(
                AppError::new("KB_DATASET_INVALID", "Knowledge entry id must not be blank")
                    .with_details(format!("position={pos}")),
            );
        }
        if !seen_ids.insert(entry.id.as_str()) {
            return Err(
                AppError::new("KB_DATASET_INVALID", "Duplicate knowledge entry id")
                    .with_details(format!("id={}; position={pos}", entry.id)),
            );
        }
        for (field, value) in [
            ("question", &entry.question),
            ("answer", &entry.answer),
            ("urgency", &entry.urgency),
            ("species", &entry.species),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::new(
                    "KB_DATASET_INVALID",
                    "Knowledge entry field must not be blank",
                )
                .with_details(format!("id={}; field={field}", entry.id)));
            }
        }
    }

    Ok(entries)
}

/// Load the knowledge dataset from a JSON file at startup.
pub fn load_dataset(path: &Path) -> Result<Vec<KnowledgeEntry>, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new("KB_DATASET_LOAD_FAILED", "Failed to read knowledge dataset file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let entries = parse_dataset(&text)?;
    info!(
        "loaded knowledge dataset: {} entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}
