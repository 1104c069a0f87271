//! Document lifecycle controller.
//!
//! Owns the upload -> summarize -> persist sequence and is the only place
//! where store, summarizer and exporter failures are translated into the
//! error kinds callers see.

use crate::agent::{AgentError, Summarizer};
use crate::config::{Config, ListOrder};
use crate::document::{
    Document, DocumentId, DocumentListing, DocumentStatus, DocumentView, FileType, NewDocument,
    UnsupportedFileType,
};
use crate::export::{self, Artifact, ExportError};
use crate::storage::{DocumentStore, StorageError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Reason recorded on documents found mid-summarization at startup
const INTERRUPTED: &str = "interrupted before summarization completed";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("summarization failed for document {id}: {reason}")]
    Summarization { id: DocumentId, reason: String },
    #[error("conflicting update for document {id}: {reason}")]
    Conflict { id: DocumentId, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => LifecycleError::NotFound(format!("document {}", id)),
            StorageError::Conflict { id, reason } => {
                tracing::error!(id = %id, reason = %reason, "Integrity fault: conflicting document write");
                LifecycleError::Conflict { id, reason }
            }
            other => LifecycleError::Storage(other),
        }
    }
}

impl From<ExportError> for LifecycleError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::UnsupportedFormat(format) => LifecycleError::UnsupportedFormat(format),
            ExportError::NotSummarized(id) => {
                LifecycleError::NotFound(format!("summary for document {}", id))
            }
            other => LifecycleError::Internal(other.to_string()),
        }
    }
}

/// Orchestrates submission, retrieval, listing and export of documents
#[derive(Clone)]
pub struct Lifecycle {
    store: DocumentStore,
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
    order: ListOrder,
}

impl Lifecycle {
    pub fn new(
        store: DocumentStore,
        summarizer: Arc<dyn Summarizer>,
        timeout: Duration,
        order: ListOrder,
    ) -> Self {
        Self {
            store,
            summarizer,
            timeout,
            order,
        }
    }

    /// Build from configuration with an already constructed summarizer
    pub fn from_config(
        config: &Config,
        store: DocumentStore,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self::new(
            store,
            summarizer,
            config.summarize_timeout(),
            config.listing.order,
        )
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Validate, persist, summarize and commit a new document.
    ///
    /// `file_type` may be a short name, a file name or a MIME type. Validation
    /// failures write nothing. Summarization failures leave the document in
    /// `Failed` state and are returned to the caller.
    pub async fn submit(
        &self,
        title: &str,
        content: Vec<u8>,
        file_type: &str,
    ) -> Result<DocumentView, LifecycleError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifecycleError::Validation("title is required".to_string()));
        }
        if content.is_empty() {
            return Err(LifecycleError::Validation("file is required".to_string()));
        }
        let file_type: FileType = file_type
            .parse()
            .map_err(|e: UnsupportedFileType| LifecycleError::Validation(e.to_string()))?;

        let document = self.store.create(NewDocument {
            title: title.to_string(),
            file_type,
            content: &content,
        })?;
        let id = document.id;
        tracing::info!(id = %id, title = %document.title, file_type = %file_type, bytes = content.len(), "Document uploaded");

        // Summarize and commit in a task of its own so a dropped request
        // still leaves the document Summarized or Failed. The provider call
        // gets a further task so the deadline holds even if it blocks.
        let store = self.store.clone();
        let summarizer = Arc::clone(&self.summarizer);
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let call =
                tokio::spawn(async move { summarizer.summarize(&content, file_type).await });
            let outcome = summarize_within(call, timeout).await;
            commit(&store, id, outcome)
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                let reason = format!("summarization task aborted: {}", join_error);
                if let Err(e) = self.store.mark_failed(id, &reason) {
                    tracing::error!(id = %id, error = %e, "Failed to record aborted summarization");
                }
                Err(LifecycleError::Summarization { id, reason })
            }
        }
    }

    /// Summarized documents for the history view
    pub fn list(&self) -> Result<Vec<DocumentListing>, LifecycleError> {
        let documents = self.store.list_summarized(self.order)?;
        Ok(documents
            .iter()
            .filter_map(DocumentListing::from_document)
            .collect())
    }

    /// Full detail for one document, in any state
    pub fn get(&self, id: DocumentId) -> Result<DocumentView, LifecycleError> {
        self.store
            .get(id)?
            .map(|doc| DocumentView::from(&doc))
            .ok_or_else(|| LifecycleError::NotFound(format!("document {}", id)))
    }

    /// Export a document's summary as `txt` or `docx`
    pub fn export(&self, id: DocumentId, format: &str) -> Result<Artifact, LifecycleError> {
        tracing::info!(id = %id, format, "Download requested");

        // Unknown formats are rejected before the store is consulted
        format
            .parse::<export::ExportFormat>()
            .map_err(LifecycleError::from)?;

        let document = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("document {}", id)))?;
        let artifact = export::export(&document, format)?;

        tracing::info!(id = %id, format, bytes = artifact.bytes.len(), "Artifact generated");
        Ok(artifact)
    }

    /// Mark documents left in `Uploaded` by a previous run as failed
    pub fn recover_interrupted(&self) -> Result<usize, LifecycleError> {
        let pending = self.store.list_with_status(DocumentStatus::Uploaded)?;
        let mut recovered = 0;
        for document in pending {
            match self.store.mark_failed(document.id, INTERRUPTED) {
                Ok(_) => recovered += 1,
                // Finished concurrently; nothing to recover
                Err(StorageError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if recovered > 0 {
            tracing::warn!(count = recovered, "Marked interrupted documents as failed");
        }
        Ok(recovered)
    }
}

/// Await a provider call, giving up once `timeout` has passed
async fn summarize_within(
    mut call: JoinHandle<Result<String, AgentError>>,
    timeout: Duration,
) -> Result<String, String> {
    match tokio::time::timeout(timeout, &mut call).await {
        Ok(Ok(Ok(summary))) => Ok(summary),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(join_error)) => Err(format!("summarizer aborted: {}", join_error)),
        Err(_) => {
            call.abort();
            Err(format!(
                "summarization timed out after {}s",
                timeout.as_secs_f64()
            ))
        }
    }
}

/// Persist the outcome of a summarization attempt
fn commit(
    store: &DocumentStore,
    id: DocumentId,
    outcome: Result<String, String>,
) -> Result<DocumentView, LifecycleError> {
    commit_with(store, id, outcome, |summary| {
        store.update_summary(id, summary, Utc::now())
    })
}

fn commit_with<F>(
    store: &DocumentStore,
    id: DocumentId,
    outcome: Result<String, String>,
    persist: F,
) -> Result<DocumentView, LifecycleError>
where
    F: FnOnce(String) -> Result<Document, StorageError>,
{
    let reason = match outcome.map(persist) {
        Ok(Ok(document)) => {
            tracing::info!(id = %id, "Document summarized");
            return Ok(DocumentView::from(&document));
        }
        // Already terminal: the other writer's state stands
        Ok(Err(err @ StorageError::Conflict { .. })) => return Err(err.into()),
        Ok(Err(e)) => format!("failed to persist summary: {}", e),
        Err(reason) => reason,
    };

    tracing::warn!(id = %id, reason = %reason, "Summarization failed");
    if let Err(e) = store.mark_failed(id, &reason) {
        tracing::error!(id = %id, error = %e, "Failed to record summarization failure");
        return Err(e.into());
    }
    Err(LifecycleError::Summarization { id, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};

    struct Fixed(&'static str);

    #[async_trait]
    impl Summarizer for Fixed {
        async fn summarize(&self, _: &[u8], _: FileType) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Summarizer for Broken {
        async fn summarize(&self, _: &[u8], _: FileType) -> Result<String, AgentError> {
            Err(AgentError::RequestFailed("HTTP 503".into()))
        }
    }

    /// Blocks its worker thread, as a slow in-process parser would
    struct Stalled(Duration);

    #[async_trait]
    impl Summarizer for Stalled {
        async fn summarize(&self, _: &[u8], _: FileType) -> Result<String, AgentError> {
            std::thread::sleep(self.0);
            Ok("too late".to_string())
        }
    }

    fn lifecycle(summarizer: Arc<dyn Summarizer>) -> (TempDir, Lifecycle) {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let lifecycle = Lifecycle::new(
            store,
            summarizer,
            Duration::from_secs(5),
            ListOrder::NewestFirst,
        );
        (dir, lifecycle)
    }

    #[tokio::test]
    async fn validation_rejects_before_writing() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));

        let cases = [
            ("  ", b"text".to_vec(), "txt"),
            ("Title", Vec::new(), "txt"),
            ("Title", b"text".to_vec(), "png"),
        ];
        for (title, content, file_type) in cases {
            let result = lc.submit(title, content, file_type).await;
            assert!(matches!(result, Err(LifecycleError::Validation(_))));
        }
        assert_eq!(lc.store().count(), 0);
    }

    #[tokio::test]
    async fn title_is_trimmed() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        let view = lc.submit("  Notes  ", b"x".to_vec(), "txt").await.unwrap();
        assert_eq!(view.title, "Notes");
    }

    #[tokio::test]
    async fn submitted_bytes_are_kept_as_original() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        let content = b"Revenue grew 10%.".to_vec();
        let view = lc.submit("Report", content.clone(), "txt").await.unwrap();

        let stored = lc.store().get(view.id).unwrap().unwrap();
        assert_eq!(lc.store().read_original(&stored.original).unwrap(), Some(content));
    }

    #[tokio::test]
    async fn provider_error_marks_document_failed() {
        let (_dir, lc) = lifecycle(Arc::new(Broken));

        let err = lc
            .submit("Report", b"content".to_vec(), "txt")
            .await
            .unwrap_err();
        let id = match err {
            LifecycleError::Summarization { id, reason } => {
                assert!(reason.contains("HTTP 503"));
                id
            }
            other => panic!("unexpected error: {other:?}"),
        };

        let view = lc.get(id).unwrap();
        assert_eq!(view.status, DocumentStatus::Failed);
        assert!(view.summary.is_none());
        assert!(lc.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_of_failed_document_is_not_found() {
        let (_dir, lc) = lifecycle(Arc::new(Broken));
        let id = match lc.submit("Report", b"content".to_vec(), "txt").await {
            Err(LifecycleError::Summarization { id, .. }) => id,
            other => panic!("unexpected result: {other:?}"),
        };

        assert!(matches!(lc.export(id, "txt"), Err(LifecycleError::NotFound(_))));
        assert!(matches!(
            lc.export(id, "pdf"),
            Err(LifecycleError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        assert!(matches!(lc.get(DocumentId(42)), Err(LifecycleError::NotFound(_))));
        assert!(matches!(
            lc.export(DocumentId(42), "txt"),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn recovery_fails_stranded_uploads() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        let stranded = lc
            .store()
            .create(NewDocument {
                title: "stranded".into(),
                file_type: FileType::Txt,
                content: b"x",
            })
            .unwrap();
        let done = lc.submit("done", b"y".to_vec(), "txt").await.unwrap();

        assert_eq!(lc.recover_interrupted().unwrap(), 1);
        assert_eq!(lc.get(stranded.id).unwrap().status, DocumentStatus::Failed);
        assert_eq!(lc.get(done.id).unwrap().status, DocumentStatus::Summarized);
        assert_eq!(lc.recover_interrupted().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timeout_bounds_a_blocking_summarizer() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let lc = Lifecycle::new(
            store,
            Arc::new(Stalled(Duration::from_secs(2))),
            Duration::from_millis(100),
            ListOrder::NewestFirst,
        );

        let started = std::time::Instant::now();
        let err = lc.submit("Slow", b"pages".to_vec(), "txt").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));

        let id = match err {
            LifecycleError::Summarization { id, reason } => {
                assert!(reason.contains("timed out"));
                id
            }
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(lc.get(id).unwrap().status, DocumentStatus::Failed);
    }

    fn uploaded(store: &DocumentStore) -> DocumentId {
        store
            .create(NewDocument {
                title: "Report".into(),
                file_type: FileType::Txt,
                content: b"content",
            })
            .unwrap()
            .id
    }

    #[test]
    fn failed_summary_write_marks_document_failed() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        let id = uploaded(lc.store());

        let result = commit_with(lc.store(), id, Ok("summary".to_string()), |_| {
            Err(StorageError::DbError(sled::Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ))))
        });

        match result {
            Err(LifecycleError::Summarization { id: failed, reason }) => {
                assert_eq!(failed, id);
                assert!(reason.starts_with("failed to persist summary"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let view = lc.get(id).unwrap();
        assert_eq!(view.status, DocumentStatus::Failed);
        assert!(view.summary.is_none());
    }

    #[test]
    fn conflicting_summary_write_leaves_record_alone() {
        let (_dir, lc) = lifecycle(Arc::new(Fixed("summary")));
        let id = uploaded(lc.store());
        lc.store().mark_failed(id, "interrupted").unwrap();

        let result = commit(lc.store(), id, Ok("summary".to_string()));
        assert!(matches!(result, Err(LifecycleError::Conflict { .. })));

        let view = lc.get(id).unwrap();
        assert_eq!(view.status, DocumentStatus::Failed);
        assert_eq!(view.failure.as_deref(), Some("interrupted"));
    }

    #[test]
    fn storage_conflict_maps_to_conflict() {
        let err: LifecycleError = StorageError::Conflict {
            id: DocumentId(3),
            reason: "summary already written".into(),
        }
        .into();
        assert!(matches!(err, LifecycleError::Conflict { .. }));
    }
}
