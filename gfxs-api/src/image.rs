//! Image payloads exchanged with the remote renderer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BackendError;

/// The two images shown after a render: the source and the processed result.
///
/// Always replaced as a whole; a session never holds one half of a new pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub original: Vec<u8>,
    pub processed: Vec<u8>,
}

impl ImagePair {
    pub fn new(original: Vec<u8>, processed: Vec<u8>) -> Self {
        Self { original, processed }
    }

    /// Decode both halves from standard base64.
    pub fn from_base64(original: &str, processed: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self {
            original: STANDARD.decode(original)?,
            processed: STANDARD.decode(processed)?,
        })
    }

    pub fn original_base64(&self) -> String {
        STANDARD.encode(&self.original)
    }

    pub fn processed_base64(&self) -> String {
        STANDARD.encode(&self.processed)
    }

    /// `data:` URL for the original image.
    pub fn original_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.original_base64())
    }

    /// `data:` URL for the processed image.
    pub fn processed_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.processed_base64())
    }
}

impl fmt::Debug for ImagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePair")
            .field("original_bytes", &self.original.len())
            .field("processed_bytes", &self.processed.len())
            .finish()
    }
}

/// Outcome of a successful render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderReply {
    /// New output is available.
    Updated(ImagePair),
    /// The renderer reported nothing new.
    Unchanged,
}

/// JSON body returned by `POST /render`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderResponse {
    pub update: bool,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub processed: String,
}

impl RenderResponse {
    /// Build the wire form of an updated pair.
    pub fn updated(pair: &ImagePair) -> Self {
        Self {
            update: true,
            original: pair.original_base64(),
            processed: pair.processed_base64(),
        }
    }

    pub fn into_reply(self) -> Result<RenderReply, BackendError> {
        if !self.update {
            return Ok(RenderReply::Unchanged);
        }
        let pair = ImagePair::from_base64(&self.original, &self.processed)
            .map_err(|e| BackendError::Protocol(format!("invalid image payload: {e}")))?;
        Ok(RenderReply::Updated(pair))
    }
}

/// A file dropped onto the editor.
#[derive(Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    /// MIME type reported by the drop source, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type,
            bytes,
        }
    }
}

impl fmt::Debug for DroppedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DroppedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Packaged result of a batch render.
#[derive(Clone, PartialEq, Eq)]
pub struct BatchArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for BatchArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchArchive")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
