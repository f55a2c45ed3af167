//! Commands sent into a render session and events emitted back to the UI.

use std::sync::Arc;

use crate::{BatchArchive, DroppedFile, ImagePair, Section};

/// Input to a session, from the editor widget and the user.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// A buffer's text changed.
    Edit { section: Section, text: String },

    /// The cursor moved in a buffer.
    Cursor { section: Section },

    /// Render now, bypassing change suppression.
    ForceRender,

    /// Files were dropped onto the editor.
    Drop(Vec<DroppedFile>),

    /// Load a stored filter into the buffers, then render.
    LoadFilter(String),

    /// Store the current document under a name.
    SaveFilter(String),

    /// Re-read the list of stored filters.
    RefreshFilters,

    /// Stop the session loop.
    Shutdown,
}

/// Output of a session, consumed by the UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A render request was issued (busy indicator on).
    RenderStarted,

    /// A render request completed, whatever the outcome (busy indicator off).
    RenderFinished,

    /// New images are available.
    ImagesUpdated(Arc<ImagePair>),

    /// Informational message, e.g. the renderer had nothing new.
    Notice(String),

    /// A remote call failed.
    Error(String),

    /// The busy overlay should be shown.
    OverlayShown,

    /// The busy overlay should be hidden.
    OverlayHidden,

    /// A batch archive is ready to be saved.
    ArchiveReady(BatchArchive),

    /// A buffer's text was replaced by the session (filter load).
    BufferReplaced { section: Section, text: String },

    /// The list of stored filters.
    FiltersListed(Vec<String>),

    /// A filter was stored.
    FilterSaved(String),
}
