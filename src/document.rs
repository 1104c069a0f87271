//! Document model - the unit of work moving through the summarisation lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier allocated by the store. Monotonic and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl DocumentId {
    /// Big-endian key bytes, so sled iterates documents in allocation order
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DocumentId)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported file type: {0} (expected pdf, docx or txt)")]
pub struct UnsupportedFileType(pub String);

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Txt => "text/plain",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parses a short name (`pdf`), a file name or extension (`report.pdf`, `.pdf`)
/// or a MIME type (`application/pdf`, `text/plain; charset=utf-8`).
impl FromStr for FileType {
    type Err = UnsupportedFileType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let essence = lowered.split(';').next().unwrap_or("").trim();

        for candidate in [FileType::Pdf, FileType::Docx, FileType::Txt] {
            if essence == candidate.mime_type() {
                return Ok(candidate);
            }
        }

        let ext = essence.rsplit('.').next().unwrap_or(essence);
        match ext {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            "txt" => Ok(FileType::Txt),
            _ => Err(UnsupportedFileType(s.to_string())),
        }
    }
}

/// Opaque reference to the raw uploaded bytes held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn for_document(id: DocumentId) -> Self {
        ContentRef(format!("originals/{}", id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Summarized,
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Summarized => "summarized",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary text and the moment it was written. Stored as one value so the
/// pair is never observed half-written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

/// Input for creating a document in the store
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub title: String,
    pub file_type: FileType,
    pub content: &'a [u8],
}

/// A document as persisted by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub file_type: FileType,
    pub original: ContentRef,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub failure: Option<String>,
}

impl Document {
    pub fn is_summarized(&self) -> bool {
        self.status == DocumentStatus::Summarized && self.summary.is_some()
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_ref().map(|s| s.text.as_str())
    }

    pub fn summary_date(&self) -> Option<DateTime<Utc>> {
        self.summary.as_ref().map(|s| s.generated_at)
    }
}

/// Full detail shape, returned by upload and single-document retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: DocumentId,
    pub title: String,
    pub file_type: FileType,
    pub status: DocumentStatus,
    pub summary: Option<String>,
    pub summary_date: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title.clone(),
            file_type: doc.file_type,
            status: doc.status,
            summary: doc.summary_text().map(str::to_string),
            summary_date: doc.summary_date(),
            uploaded_at: doc.uploaded_at,
            failure: doc.failure.clone(),
        }
    }
}

/// History entry shape. Carries no summary text; the detail is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListing {
    pub id: DocumentId,
    pub title: String,
    pub summary_date: DateTime<Utc>,
}

impl DocumentListing {
    /// Returns `None` for documents that have no summary yet
    pub fn from_document(doc: &Document) -> Option<Self> {
        let summary_date = doc.summary_date()?;
        Some(Self {
            id: doc.id,
            title: doc.title.clone(),
            summary_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_accepts_names_extensions_and_mime_types() {
        assert_eq!("pdf".parse::<FileType>(), Ok(FileType::Pdf));
        assert_eq!("Report.DOCX".parse::<FileType>(), Ok(FileType::Docx));
        assert_eq!(".txt".parse::<FileType>(), Ok(FileType::Txt));
        assert_eq!(
            "text/plain; charset=utf-8".parse::<FileType>(),
            Ok(FileType::Txt)
        );
        assert_eq!(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .parse::<FileType>(),
            Ok(FileType::Docx)
        );
    }

    #[test]
    fn file_type_rejects_other_formats() {
        assert!("image/png".parse::<FileType>().is_err());
        assert!("notes.md".parse::<FileType>().is_err());
        assert!("".parse::<FileType>().is_err());
    }

    #[test]
    fn view_uses_camel_case_and_flat_summary() {
        let doc = Document {
            id: DocumentId(7),
            title: "Quarterly Report".into(),
            file_type: FileType::Txt,
            original: ContentRef::for_document(DocumentId(7)),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Summarized,
            summary: Some(Summary {
                text: "Revenue increased.".into(),
                generated_at: Utc::now(),
            }),
            failure: None,
        };

        let json = serde_json::to_value(DocumentView::from(&doc)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["summary"], "Revenue increased.");
        assert!(json["summaryDate"].is_string());
        assert_eq!(json["fileType"], "txt");
        assert!(json.get("failure").is_none());
    }

    #[test]
    fn listing_requires_summary() {
        let doc = Document {
            id: DocumentId(1),
            title: "Draft".into(),
            file_type: FileType::Pdf,
            original: ContentRef::for_document(DocumentId(1)),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Uploaded,
            summary: None,
            failure: None,
        };
        assert!(DocumentListing::from_document(&doc).is_none());
    }
}
