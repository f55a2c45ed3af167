//! GFXS API - Shared types and backend contracts for the GFXS render workspace.

mod backend;
mod document;
mod event;
mod image;

pub use backend::*;
pub use document::*;
pub use event::*;
pub use image::*;
