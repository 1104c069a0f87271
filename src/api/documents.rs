//! Document endpoints: upload, history, detail and download.

use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::error::ApiError;
use crate::document::{DocumentId, DocumentListing, DocumentView};
use crate::lifecycle::{Lifecycle, LifecycleError};

/// `POST /api/documents` — multipart `title` and `file` fields.
///
/// Responds with the full document once it is summarized.
pub async fn upload(
    State(lifecycle): State<Lifecycle>,
    mut multipart: Multipart,
) -> Result<Json<DocumentView>, ApiError> {
    let mut title = String::new();
    let mut content: Vec<u8> = Vec::new();
    let mut file_type = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => {
                title = field.text().await?;
            }
            "file" => {
                file_type = file_type_hint(field.file_name(), field.content_type());
                content = field.bytes().await?.to_vec();
            }
            _ => {}
        }
    }

    let document = lifecycle.submit(&title, content, &file_type).await?;
    Ok(Json(document))
}

/// Prefer the file name's extension; fall back to the part's content type
fn file_type_hint(file_name: Option<&str>, content_type: Option<&str>) -> String {
    match file_name {
        Some(name) if FsPath::new(name).extension().is_some() => name.to_string(),
        _ => content_type.unwrap_or("").to_string(),
    }
}

/// `GET /api/documents` — summarized documents, most recent first by default
pub async fn list(State(lifecycle): State<Lifecycle>) -> Result<Json<Vec<DocumentListing>>, ApiError> {
    Ok(Json(lifecycle.list()?))
}

/// `GET /api/documents/:id`
pub async fn detail(
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(lifecycle.get(id)?))
}

/// `GET /api/documents/:id/download/:format` — `txt` or `docx` attachment
pub async fn download(
    State(lifecycle): State<Lifecycle>,
    Path((id, format)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let artifact = lifecycle.export(id, &format)?;

    let disposition = artifact.content_disposition();
    let headers = [
        (header::CONTENT_TYPE, artifact.content_type.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
        (
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
    ];
    Ok((headers, artifact.bytes).into_response())
}

/// Ids that do not parse cannot exist
fn parse_id(raw: &str) -> Result<DocumentId, LifecycleError> {
    raw.parse()
        .map_err(|_| LifecycleError::NotFound(format!("document {raw}")))
}
