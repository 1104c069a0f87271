//! HTTP client for the summadoc API.
//!
//! Uses reqwest; server-side error bodies are decoded into [`ClientError::Api`].

use crate::api::error::ErrorBody;
use crate::document::{DocumentId, DocumentListing, DocumentView};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// User-Agent string identifying this client
const USER_AGENT: &str = concat!("summadoc/", env!("CARGO_PKG_VERSION"));

/// Uploads wait for summarization, so allow well beyond the server's own timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

/// Client for one summadoc server
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Upload a file and wait for its summary
    pub async fn upload(&self, path: &Path, title: &str) -> Result<DocumentView, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let form = Form::new()
            .text("title", title.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url("/documents"))
            .multipart(form)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn list(&self) -> Result<Vec<DocumentListing>, ClientError> {
        let response = self.client.get(self.url("/documents")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn get(&self, id: DocumentId) -> Result<DocumentView, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}", id)))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch an exported artifact as raw bytes
    pub async fn download(&self, id: DocumentId, format: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}/download/{}", id, format)))
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }
}

/// Turn non-success responses into [`ClientError::Api`]
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => ("HTTP".to_string(), text),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
