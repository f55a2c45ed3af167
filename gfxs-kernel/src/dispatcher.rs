//! Render dispatcher - admission and completion of render requests.
//!
//! The dispatcher owns the render request state (last rendered text, the
//! single-flight guard) and the displayed image pair. It does no IO itself:
//! [`RenderDispatcher::begin`] decides whether a request goes out and
//! [`RenderDispatcher::complete`] applies its result.

use std::sync::Arc;

use gfxs_api::{BackendError, BackendResult, ImagePair, RenderReply};

use crate::gate::should_render;
use crate::guard::{Admission, SingleFlight};

/// A render that was admitted and must be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    /// Document text sent to the renderer.
    pub document: String,
    pub forced: bool,
}

/// Decision taken by [`RenderDispatcher::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing changed since the last successful render.
    Suppressed,
    /// A render is in flight and this trigger was not forced.
    Dropped,
    /// A render is in flight; this forced trigger runs when it finishes.
    Deferred,
    /// Issue the request described by the ticket.
    Started(RenderTicket),
}

/// What a completed render produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated(Arc<ImagePair>),
    /// The renderer had nothing new; the same text stays eligible.
    Unchanged,
    Failed(BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub outcome: Outcome,
    /// A forced render was deferred behind this one and should run now.
    pub run_deferred: bool,
}

#[derive(Debug, Default)]
pub struct RenderDispatcher {
    guard: SingleFlight,
    last_rendered: String,
    images: Option<Arc<ImagePair>>,
}

impl RenderDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, document: String, force: bool) -> Dispatch {
        if !should_render(&document, &self.last_rendered, force) {
            return Dispatch::Suppressed;
        }
        match self.guard.try_enter(force) {
            Admission::Entered => Dispatch::Started(RenderTicket {
                document,
                forced: force,
            }),
            Admission::Denied => Dispatch::Dropped,
            Admission::Deferred => Dispatch::Deferred,
        }
    }

    /// Apply the result of an admitted render and release the guard.
    pub fn complete(
        &mut self,
        ticket: RenderTicket,
        result: BackendResult<RenderReply>,
    ) -> CompletionReport {
        let outcome = match result {
            Ok(RenderReply::Updated(pair)) => {
                let pair = Arc::new(pair);
                self.images = Some(pair.clone());
                self.last_rendered = ticket.document;
                Outcome::Updated(pair)
            }
            Ok(RenderReply::Unchanged) => Outcome::Unchanged,
            Err(e) => Outcome::Failed(e),
        };
        let run_deferred = self.guard.exit();
        CompletionReport {
            outcome,
            run_deferred,
        }
    }

    pub fn last_rendered(&self) -> &str {
        &self.last_rendered
    }

    pub fn images(&self) -> Option<&Arc<ImagePair>> {
        self.images.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.guard.is_in_flight()
    }

    pub fn has_deferred(&self) -> bool {
        self.guard.has_deferred()
    }
}
