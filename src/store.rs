//! Document Store - in-memory persistence of page documents
//!
//! Only documents that validated and compiled reach [`DocumentStore::commit`],
//! so a rejected save never replaces the previous record.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::compiler::CompiledPage;
use crate::hashing::compute_document_hash;
use crate::node::Document;
use crate::validation::ValidationError;

pub type PageId = i64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Malformed document JSON for page {page_id}: {source}")]
    Malformed {
        page_id: PageId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("No stored document for page {0}")]
    NotFound(PageId),

    #[error("Failed to hash document: {0}")]
    Hash(#[source] serde_json::Error),
}

/// Raw stored shape, `{"content": <document>}`. The content may also arrive
/// as a JSON string holding the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub content: Document,
}

impl StoredRecord {
    /// Malformed input is treated as absent.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("event=stored_record_malformed module=store reason={}", e);
                return None;
            }
        };
        let content = match value.get("content")? {
            Value::String(inner) => serde_json::from_str::<Document>(inner),
            other => serde_json::from_value::<Document>(other.clone()),
        };
        match content {
            Ok(content) => Some(Self { content }),
            Err(e) => {
                warn!("event=stored_record_malformed module=store reason={}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: PageId,
    pub content: Document,
    /// Cleared by [`DocumentStore::invalidate_css`].
    pub css_cache: Option<String>,
    pub content_hash: String,
    pub version: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    records: BTreeMap<PageId, PageRecord>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an already validated and compiled document. Identical content
    /// leaves the record, `updated_at` included, untouched.
    pub fn commit(
        &mut self,
        page_id: PageId,
        content: Document,
        compiled: &CompiledPage,
    ) -> Result<SaveOutcome, StoreError> {
        let content_hash = compute_document_hash(&content).map_err(StoreError::Hash)?;

        let outcome = match self.records.get(&page_id) {
            Some(existing) if existing.content_hash == content_hash => {
                info!(
                    "event=store_save module=store page_id={} outcome=unchanged",
                    page_id
                );
                return Ok(SaveOutcome::Unchanged);
            }
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        };

        let record = PageRecord {
            page_id,
            version: content.version.clone(),
            content,
            css_cache: Some(compiled.css.clone()),
            content_hash,
            updated_at: Utc::now(),
        };
        info!(
            "event=store_save module=store page_id={} outcome={:?} hash={}",
            page_id, outcome, record.content_hash
        );
        self.records.insert(page_id, record);
        Ok(outcome)
    }

    pub fn get(&self, page_id: PageId) -> Option<&PageRecord> {
        self.records.get(&page_id)
    }

    pub fn document(&self, page_id: PageId) -> Option<&Document> {
        self.get(page_id).map(|r| &r.content)
    }

    pub fn cached_css(&self, page_id: PageId) -> Option<&str> {
        self.get(page_id).and_then(|r| r.css_cache.as_deref())
    }

    pub fn set_css_cache(&mut self, page_id: PageId, css: String) -> Result<(), StoreError> {
        let record = self.records.get_mut(&page_id).ok_or(StoreError::NotFound(page_id))?;
        record.css_cache = Some(css);
        Ok(())
    }

    pub fn invalidate_css(&mut self, page_id: PageId) -> Result<(), StoreError> {
        let record = self.records.get_mut(&page_id).ok_or(StoreError::NotFound(page_id))?;
        record.css_cache = None;
        Ok(())
    }

    pub fn remove(&mut self, page_id: PageId) -> Result<PageRecord, StoreError> {
        self.records.remove(&page_id).ok_or(StoreError::NotFound(page_id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
