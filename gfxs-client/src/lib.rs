//! GFXS Client - HTTP access to a remote GFXS render server.
//!
//! [`HttpBackend`] implements both [`gfxs_api::RenderBackend`] and
//! [`gfxs_api::FilterStore`] over the server's HTTP endpoints.

mod http;

pub use http::{ClientError, HttpBackend, archive_name};
