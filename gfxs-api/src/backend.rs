//! Contracts for the remote collaborators: renderer and filter store.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{BatchArchive, DroppedFile, RenderReply};

/// Failure of a call to a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The remote rendering engine.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Render a composite document against the session's current image.
    async fn render(&self, document: &str) -> BackendResult<RenderReply>;

    /// Attach one image to the server-side session.
    async fn upload_image(&self, image: &DroppedFile) -> BackendResult<()>;

    /// Render a document against every image, returning one archive.
    async fn render_batch(
        &self,
        document: &str,
        images: &[DroppedFile],
    ) -> BackendResult<BatchArchive>;
}

/// Named filter storage: whole documents keyed by name.
#[async_trait]
pub trait FilterStore: Send + Sync {
    async fn list(&self) -> BackendResult<Vec<String>>;

    async fn read(&self, name: &str) -> BackendResult<String>;

    /// Store a document, replacing any existing filter of the same name.
    async fn write(&self, name: &str, document: &str) -> BackendResult<()>;
}
