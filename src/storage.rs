//! Sled-based document catalog.
//!
//! Two trees: `documents` maps id to the JSON document record, `originals`
//! maps id to the raw uploaded bytes. State transitions go through
//! compare-and-swap on the whole record, so the summary text and its date
//! are committed together and only once.

use crate::config::ListOrder;
use crate::document::{
    ContentRef, Document, DocumentId, DocumentStatus, NewDocument, Summary,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("document not found: {0}")]
    NotFound(DocumentId),
    #[error("conflicting write for document {id}: {reason}")]
    Conflict { id: DocumentId, reason: String },
}

/// Durable catalog of documents keyed by id.
///
/// Cheap to clone; clones share the same underlying database.
#[derive(Clone)]
pub struct DocumentStore {
    db: sled::Db,
    documents: sled::Tree,
    originals: sled::Tree,
}

impl DocumentStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let documents = db.open_tree("documents")?;
        let originals = db.open_tree("originals")?;
        Ok(Self {
            db,
            documents,
            originals,
        })
    }

    /// Persist the raw content and create the document in `Uploaded` state
    pub fn create(&self, new: NewDocument<'_>) -> Result<Document, StorageError> {
        let id = DocumentId(self.db.generate_id()?);
        let key = id.to_key();

        let written = self
            .originals
            .compare_and_swap(key, None as Option<&[u8]>, Some(new.content))?;
        if written.is_err() {
            return Err(StorageError::Conflict {
                id,
                reason: "original content already written".to_string(),
            });
        }

        let document = Document {
            id,
            title: new.title,
            file_type: new.file_type,
            original: ContentRef::for_document(id),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Uploaded,
            summary: None,
            failure: None,
        };
        let value = serde_json::to_vec(&document)?;
        self.documents.insert(key, value)?;
        self.db.flush()?;
        Ok(document)
    }

    /// Commit the summary. Only valid once, from `Uploaded`.
    pub fn update_summary(
        &self,
        id: DocumentId,
        text: String,
        generated_at: DateTime<Utc>,
    ) -> Result<Document, StorageError> {
        self.transition(id, |doc| {
            if doc.summary.is_some() {
                return Err(StorageError::Conflict {
                    id,
                    reason: "summary already written".to_string(),
                });
            }
            if doc.status != DocumentStatus::Uploaded {
                return Err(StorageError::Conflict {
                    id,
                    reason: format!("cannot summarize a {} document", doc.status),
                });
            }
            let mut next = doc.clone();
            next.status = DocumentStatus::Summarized;
            next.summary = Some(Summary {
                text: text.clone(),
                generated_at,
            });
            Ok(next)
        })
    }

    /// Mark an `Uploaded` document as failed, keeping it for diagnostics
    pub fn mark_failed(&self, id: DocumentId, reason: &str) -> Result<Document, StorageError> {
        self.transition(id, |doc| {
            if doc.status != DocumentStatus::Uploaded {
                return Err(StorageError::Conflict {
                    id,
                    reason: format!("cannot fail a {} document", doc.status),
                });
            }
            let mut next = doc.clone();
            next.status = DocumentStatus::Failed;
            next.failure = Some(reason.to_string());
            Ok(next)
        })
    }

    /// Retrieve a document by id
    pub fn get(&self, id: DocumentId) -> Result<Option<Document>, StorageError> {
        match self.documents.get(id.to_key())? {
            Some(data) => {
                let document: Document = serde_json::from_slice(&data)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    /// Read the raw bytes behind a content reference
    pub fn read_original(&self, content: &ContentRef) -> Result<Option<Vec<u8>>, StorageError> {
        let id = match content
            .0
            .strip_prefix("originals/")
            .and_then(|raw| raw.parse::<DocumentId>().ok())
        {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(self.originals.get(id.to_key())?.map(|bytes| bytes.to_vec()))
    }

    /// List summarized documents ordered by summary date
    pub fn list_summarized(&self, order: ListOrder) -> Result<Vec<Document>, StorageError> {
        let mut results: Vec<Document> = self
            .list_with_status(DocumentStatus::Summarized)?
            .into_iter()
            .filter(Document::is_summarized)
            .collect();

        // Ties broken by id so the order is stable
        results.sort_by(|a, b| {
            a.summary_date()
                .cmp(&b.summary_date())
                .then_with(|| a.id.cmp(&b.id))
        });
        if order == ListOrder::NewestFirst {
            results.reverse();
        }
        Ok(results)
    }

    /// All documents currently in the given state, in allocation order
    pub fn list_with_status(&self, status: DocumentStatus) -> Result<Vec<Document>, StorageError> {
        let mut results = Vec::new();
        for item in self.documents.iter() {
            let (_key, value) = item?;
            let document: Document = serde_json::from_slice(&value)?;
            if document.status == status {
                results.push(document);
            }
        }
        Ok(results)
    }

    /// Get the number of documents in any state
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Read-modify-write with compare-and-swap; retried when another writer
    /// got in between the read and the swap.
    fn transition<F>(&self, id: DocumentId, apply: F) -> Result<Document, StorageError>
    where
        F: Fn(&Document) -> Result<Document, StorageError>,
    {
        let key = id.to_key();
        loop {
            let current = self
                .documents
                .get(key)?
                .ok_or(StorageError::NotFound(id))?;
            let document: Document = serde_json::from_slice(&current)?;
            let next = apply(&document)?;
            let value = serde_json::to_vec(&next)?;

            match self.documents.compare_and_swap(key, Some(current), Some(value))? {
                Ok(()) => {
                    self.db.flush()?;
                    return Ok(next);
                }
                Err(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FileType;
    use chrono::Duration;
    use tempfile::tempdir;

    fn new_doc(title: &str) -> NewDocument<'static> {
        NewDocument {
            title: title.to_string(),
            file_type: FileType::Txt,
            content: b"Revenue grew 10%.",
        }
    }

    #[test]
    fn create_assigns_unique_ids_and_keeps_original() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        let a = store.create(new_doc("A")).unwrap();
        let b = store.create(new_doc("B")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, DocumentStatus::Uploaded);
        assert!(a.summary.is_none());
        assert_eq!(
            store.read_original(&a.original).unwrap().unwrap(),
            b"Revenue grew 10%.".to_vec()
        );
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn second_summary_write_conflicts() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let doc = store.create(new_doc("A")).unwrap();

        let first = store
            .update_summary(doc.id, "first".into(), Utc::now())
            .unwrap();
        assert_eq!(first.status, DocumentStatus::Summarized);
        assert_eq!(first.summary_text(), Some("first"));

        let second = store.update_summary(doc.id, "second".into(), Utc::now());
        assert!(matches!(second, Err(StorageError::Conflict { .. })));

        let stored = store.get(doc.id).unwrap().unwrap();
        assert_eq!(stored.summary_text(), Some("first"));
    }

    #[test]
    fn failed_documents_cannot_be_summarized() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let doc = store.create(new_doc("A")).unwrap();

        let failed = store.mark_failed(doc.id, "timed out").unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(failed.failure.as_deref(), Some("timed out"));

        let result = store.update_summary(doc.id, "late".into(), Utc::now());
        assert!(matches!(result, Err(StorageError::Conflict { .. })));
        assert!(store.get(doc.id).unwrap().unwrap().summary.is_none());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();

        assert!(store.get(DocumentId(999)).unwrap().is_none());
        assert!(matches!(
            store.update_summary(DocumentId(999), "x".into(), Utc::now()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn listing_skips_unsummarized_and_orders_by_date() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let now = Utc::now();

        let older = store.create(new_doc("older")).unwrap();
        let newer = store.create(new_doc("newer")).unwrap();
        let pending = store.create(new_doc("pending")).unwrap();
        let failed = store.create(new_doc("failed")).unwrap();

        store
            .update_summary(newer.id, "n".into(), now)
            .unwrap();
        store
            .update_summary(older.id, "o".into(), now - Duration::hours(1))
            .unwrap();
        store.mark_failed(failed.id, "boom").unwrap();

        let newest_first: Vec<_> = store
            .list_summarized(ListOrder::NewestFirst)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(newest_first, vec![newer.id, older.id]);
        assert!(!newest_first.contains(&pending.id));

        let oldest_first: Vec<_> = store
            .list_summarized(ListOrder::OldestFirst)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(oldest_first, vec![older.id, newer.id]);
    }

    #[test]
    fn documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = DocumentStore::open(dir.path()).unwrap();
            let doc = store.create(new_doc("persisted")).unwrap();
            store
                .update_summary(doc.id, "kept".into(), Utc::now())
                .unwrap();
            doc.id
        };

        let store = DocumentStore::open(dir.path()).unwrap();
        let doc = store.get(id).unwrap().unwrap();
        assert_eq!(doc.summary_text(), Some("kept"));

        let next = store.create(new_doc("after reopen")).unwrap();
        assert_ne!(next.id, id);
    }
}
