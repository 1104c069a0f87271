//! HTTP API over the document lifecycle.
//!
//! Routes are nested under `/api/`; see [`router::api_router`].

pub mod documents;
pub mod error;
pub mod router;

pub use error::ApiError;
pub use router::api_router;
