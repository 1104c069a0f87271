//! # Summadoc
//!
//! Document summarisation service: upload a PDF, DOCX or TXT file, get an
//! LLM-generated summary, browse the history and export summaries as plain
//! text or DOCX.
//!
//! ## Features
//!
//! - **Lifecycle**: documents move from `uploaded` to `summarized` (or `failed`)
//!   and the summary is committed exactly once
//! - **Durable catalog**: sled stores documents and their original bytes
//! - **Deterministic export**: byte-identical txt and docx artifacts
//! - **Provider agnostic**: OpenRouter via reqwest, Gemini via rstructor

pub mod agent;
pub mod api;
pub mod client;
pub mod config;
pub mod document;
pub mod export;
pub mod extract;
pub mod lifecycle;
pub mod session;
pub mod storage;
pub mod ui;

pub use config::Config;
pub use document::{Document, DocumentId, DocumentListing, DocumentView};
pub use lifecycle::{Lifecycle, LifecycleError};
pub use storage::DocumentStore;
