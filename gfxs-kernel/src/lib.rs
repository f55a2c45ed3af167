//! GFXS Kernel - The render-orchestration core.
//!
//! This crate decides when the remote renderer is called:
//! - Change suppression (skip renders of already-rendered text)
//! - Single-flight guard (never two renders in flight)
//! - Debounce scheduling (one shared countdown for all four buffers)
//! - Render dispatch and the atomic image-pair swap
//! - Upload and batch routing for dropped files
//! - The session loop tying it all together

pub mod config;
pub mod debounce;
pub mod dispatcher;
pub mod gate;
pub mod guard;
pub mod persistence;
pub mod pipeline;
pub mod session;

mod error;

pub use config::SessionConfig;
pub use debounce::Debounce;
pub use dispatcher::{Dispatch, Outcome, RenderDispatcher, RenderTicket};
pub use error::KernelError;
pub use gate::should_render;
pub use guard::{Admission, SingleFlight};
pub use persistence::{DirFilterStore, MemoryFilterStore};
pub use pipeline::{DropPlan, Overlay, classify};
pub use session::{LoadPurpose, Message, RenderPhase, Session, SessionHandle, SessionStatus, Task};
