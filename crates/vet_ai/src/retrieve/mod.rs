use log::debug;
use serde::{Deserialize, Serialize};
use vet_core::error::AppError;

use crate::embeddings::Embedder;
use crate::index::{DocumentMeta, KnowledgeIndex};

pub mod similarity;

/// One retrieval hit: the indexed document text plus its metadata, with the
/// cosine similarity score it was ranked by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub meta: DocumentMeta,
}

/// Embed the question and return the top-k most similar knowledge documents,
/// ordered by descending similarity with id-ascending tie-breaks.
///
/// k bounds the result count exactly: zero hits for k = 0, and every document
/// when k exceeds the corpus. A ready but empty index yields zero hits; an
/// index that was never populated is an error.
pub fn query_index(
    index: &KnowledgeIndex,
    embedder: &dyn Embedder,
    question: &str,
    top_k: u32,
) -> Result<Vec<RetrievalHit>, AppError> {
    let q = question.trim();
    if q.is_empty() {
        return Err(AppError::new(
            "AI_RETRIEVAL_FAILED",
            "Query must not be empty",
        ));
    }
    let st = index.status()?;
    if !st.ready {
        return Err(AppError::new(
            "AI_INDEX_NOT_READY",
            "Index not populated; run ensure_populated before querying",
        ));
    }
    if top_k == 0 || st.doc_count == 0 {
        return Ok(Vec::new());
    }
    let model = st
        .model
        .ok_or_else(|| AppError::new("AI_INDEX_NOT_READY", "Index status missing model"))?;
    let dims = st
        .dims
        .ok_or_else(|| AppError::new("AI_INDEX_NOT_READY", "Index status missing dims"))?;

    let qv = embedder.embed(&model, q)?;
    if qv.len() as u32 != dims {
        return Err(AppError::new(
            "AI_RETRIEVAL_FAILED",
            "Query embedding dims do not match index dims",
        )
        .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
    }
    let qnorm = similarity::l2_norm(&qv);
    if qnorm == 0.0 {
        return Err(AppError::new(
            "AI_RETRIEVAL_FAILED",
            "Query embedding norm is zero",
        ));
    }

    let vectors = index.read_vectors()?;
    let documents = index.read_documents()?;

    let mut scored: Vec<(String, f32)> = Vec::with_capacity(vectors.len());
    for (id, v) in vectors.iter() {
        if v.len() as u32 != dims {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Stored vector dims mismatch",
            )
            .with_details(format!("id={id}; expected={dims}; got={}", v.len())));
        }
        let vnorm = similarity::l2_norm(v);
        if vnorm == 0.0 {
            continue;
        }
        scored.push((id.clone(), similarity::cosine_similarity(&qv, v, qnorm, vnorm)));
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(top_k as usize);

    let mut hits: Vec<RetrievalHit> = Vec::with_capacity(scored.len());
    for (id, score) in scored {
        let doc = documents.get(&id).ok_or_else(|| {
            AppError::new("AI_INDEX_BUILD_FAILED", "Indexed document missing; repopulate")
                .with_details(format!("id={id}"))
        })?;
        hits.push(RetrievalHit {
            id: doc.id.clone(),
            score,
            text: doc.text.clone(),
            meta: doc.meta.clone(),
        });
    }

    debug!("retrieval: {} hits for top_k={}", hits.len(), top_k);
    Ok(hits)
}
