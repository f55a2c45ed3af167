//! Drop routing - single image upload vs. batch render.

use gfxs_api::DroppedFile;

/// What to do with a set of dropped files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPlan {
    /// Nothing to do: no files, or one file that is not an image.
    Ignore,
    /// Attach one image to the session, then re-render.
    Single(DroppedFile),
    /// Render the current document against every file.
    Batch(Vec<DroppedFile>),
}

pub fn classify(mut files: Vec<DroppedFile>) -> DropPlan {
    match files.len() {
        0 => DropPlan::Ignore,
        1 => {
            let file = files.remove(0);
            if is_image(&file) {
                DropPlan::Single(file)
            } else {
                tracing::debug!("ignoring non-image drop: {}", file.name);
                DropPlan::Ignore
            }
        }
        _ => DropPlan::Batch(files),
    }
}

/// Whether a dropped file is an image.
///
/// The reported content type decides when present; otherwise the file
/// extension is checked against the formats the image crate knows.
pub fn is_image(file: &DroppedFile) -> bool {
    match file.content_type.as_deref() {
        Some(mime) => mime.starts_with("image/"),
        None => image::ImageFormat::from_path(&file.name).is_ok(),
    }
}

/// Busy overlay shown while uploads or batches are on the wire.
///
/// Counted, so overlapping drops keep it up until the last one finishes.
#[derive(Debug, Default)]
pub struct Overlay {
    depth: usize,
}

impl Overlay {
    /// Returns true if the overlay just became visible.
    pub fn show(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    /// Returns true if the overlay just became hidden.
    pub fn hide(&mut self) -> bool {
        match self.depth {
            0 => false,
            1 => {
                self.depth = 0;
                true
            }
            _ => {
                self.depth -= 1;
                false
            }
        }
    }

    pub fn is_visible(&self) -> bool {
        self.depth > 0
    }
}
