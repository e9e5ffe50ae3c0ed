use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vet_core::error::AppError;
use vet_core::knowledge::KnowledgeEntry;

use crate::embeddings::Embedder;

/// Embeddings are requested in batches to bound peak memory during bulk
/// population of a large knowledge base.
pub const EMBED_BATCH_SIZE: usize = 100;

/// Metadata carried alongside every indexed document and returned with
/// retrieval hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMeta {
    pub question: String,
    pub answer: String,
    pub urgency: String,
    pub species: String,
    pub category: String,
}

/// One indexed document, derived 1:1 from a knowledge entry and keyed by its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub text_sha256: String,
    pub meta: DocumentMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub doc_count: u32,
    pub updated_at: Option<String>,
}

/// Outcome of `ensure_populated`: whether any embedding work happened, and how
/// much. `populated == false` means the call was a no-op against an unchanged
/// knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationReport {
    pub populated: bool,
    pub embedded: u32,
    pub status: IndexStatus,
}

/// Persisted embedding index over the knowledge base.
///
/// Layout under the root directory: `index/status.json`, `index/vectors.json`,
/// `index/documents.json`. All writes go through a tmp file and rename so a
/// crash never leaves a half-written index behind.
#[derive(Debug, Clone)]
pub struct KnowledgeIndex {
    root: PathBuf,
}

fn document_from_entry(entry: &KnowledgeEntry) -> IndexedDocument {
    let text = format!("Q: {}\nA: {}", entry.question, entry.answer);
    let text_sha256 = sha256_hex(text.as_bytes());
    IndexedDocument {
        id: entry.id.clone(),
        text,
        text_sha256,
        meta: DocumentMeta {
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            urgency: entry.urgency.clone(),
            species: entry.species.clone(),
            category: entry.category.clone(),
        },
    }
}

impl KnowledgeIndex {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("status.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.index_dir().join("vectors.json")
    }

    fn documents_path(&self) -> PathBuf {
        self.index_dir().join("documents.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.index_dir()).map_err(|e| {
            AppError::new("AI_INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.index_dir().display(), e))
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        self.ensure_dirs()?;
        let path = self.status_path();
        if !path.exists() {
            return Ok(IndexStatus {
                ready: false,
                model: None,
                dims: None,
                doc_count: 0,
                updated_at: None,
            });
        }
        read_json(&path, "index status")
    }

    pub fn read_vectors(&self) -> Result<BTreeMap<String, Vec<f32>>, AppError> {
        self.ensure_dirs()?;
        let path = self.vectors_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path, "index vectors")
    }

    pub fn read_documents(&self) -> Result<BTreeMap<String, IndexedDocument>, AppError> {
        self.ensure_dirs()?;
        let path = self.documents_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path, "index documents")
    }

    /// Populate the index from the knowledge base, idempotently.
    ///
    /// Entries whose stored content hash and vector are unchanged are skipped,
    /// so re-running against an unchanged dataset embeds nothing. Stale
    /// documents (ids no longer in the dataset) are dropped. An empty dataset
    /// populates trivially into a ready, zero-document index.
    pub fn ensure_populated(
        &self,
        entries: &[KnowledgeEntry],
        embedder: &dyn Embedder,
        model: &str,
        updated_at: &str,
    ) -> Result<PopulationReport, AppError> {
        self.ensure_dirs()?;

        let mut documents: BTreeMap<String, IndexedDocument> = BTreeMap::new();
        for entry in entries {
            let doc = document_from_entry(entry);
            if documents.insert(doc.id.clone(), doc).is_some() {
                return Err(AppError::new(
                    "AI_INDEX_BUILD_FAILED",
                    "Duplicate knowledge entry id during population",
                )
                .with_details(format!("id={}", entry.id)));
            }
        }

        let current = self.status()?;
        let compatible = current.ready && current.model.as_deref() == Some(model);

        let mut vectors: BTreeMap<String, Vec<f32>> = if compatible {
            self.read_vectors()?
        } else {
            BTreeMap::new()
        };
        let previous: BTreeMap<String, IndexedDocument> = if compatible {
            self.read_documents()?
        } else {
            BTreeMap::new()
        };

        // Drop vectors for entries no longer present.
        let wanted: BTreeSet<&String> = documents.keys().collect();
        vectors.retain(|id, _| wanted.contains(id));

        let mut to_embed: Vec<&IndexedDocument> = Vec::new();
        for doc in documents.values() {
            let unchanged = previous
                .get(&doc.id)
                .map(|old| old.text_sha256 == doc.text_sha256)
                .unwrap_or(false);
            if !unchanged || !vectors.contains_key(&doc.id) {
                to_embed.push(doc);
            }
        }

        let mut dims: Option<u32> = if compatible { current.dims } else { None };
        let embedded = to_embed.len() as u32;

        for batch in to_embed.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let batch_vectors = embedder.embed_batch(model, &texts)?;
            if batch_vectors.len() != batch.len() {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Embedding batch returned the wrong number of vectors",
                )
                .with_details(format!(
                    "expected={}; got={}",
                    batch.len(),
                    batch_vectors.len()
                )));
            }
            for (doc, vector) in batch.iter().zip(batch_vectors) {
                let this_dims = vector.len() as u32;
                match dims {
                    Some(d) if d != this_dims => {
                        return Err(AppError::new(
                            "AI_INDEX_BUILD_FAILED",
                            "Embedding dimension mismatch across documents",
                        )
                        .with_details(format!(
                            "expected={d}; got={this_dims}; id={}",
                            doc.id
                        )));
                    }
                    Some(_) => {}
                    None => dims = Some(this_dims),
                }
                vectors.insert(doc.id.clone(), vector);
            }
        }

        // Persist only after every embedding call has succeeded.
        write_json(&self.documents_path(), &documents, "index documents")?;
        write_json(&self.vectors_path(), &vectors, "index vectors")?;

        let status = IndexStatus {
            ready: true,
            model: Some(model.to_string()),
            dims,
            doc_count: documents.len() as u32,
            updated_at: Some(updated_at.to_string()),
        };
        write_json(&self.status_path(), &status, "index status")?;

        info!(
            "knowledge index populated: {} documents, {} embedded, model={}",
            documents.len(),
            embedded,
            model
        );

        Ok(PopulationReport {
            populated: embedded > 0,
            embedded,
            status,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!(
                "tmp={}; dest={}; err={}",
                tmp.display(),
                path.display(),
                e
            ))
    })?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}
