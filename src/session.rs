//! Client session state: the document currently being viewed.
//!
//! Transient view state owned by one browsing session and handed explicitly
//! to the views that need it. Nothing here is persisted.

use crate::document::DocumentView;

/// What the detail view should do for the current session
#[derive(Debug, PartialEq, Eq)]
pub enum DetailView<'a> {
    Render(&'a DocumentView),
    /// No current document: go back to the upload entry point
    RedirectToUpload,
}

/// Holds at most one current document
#[derive(Debug, Default)]
pub struct Session {
    current: Option<DocumentView>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the document returned by an upload or picked from history.
    /// Replaces any previous current document.
    pub fn set_current(&mut self, document: DocumentView) {
        self.current = Some(document);
    }

    pub fn current(&self) -> Option<&DocumentView> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Resolve the detail view for this session
    pub fn detail(&self) -> DetailView<'_> {
        match &self.current {
            Some(document) => DetailView::Render(document),
            None => DetailView::RedirectToUpload,
        }
    }
}
