//! Pixel sampling on displayed images.
//!
//! Each displayed image slot keeps an RGBA copy of its image at natural
//! resolution, captured when the image loads. A pointer position on the
//! scaled display is mapped back to natural coordinates with
//! `floor(offset * natural / displayed)` per axis.

use std::collections::HashMap;
use std::fmt;

use gfxs_api::ImagePair;
use image::RgbaImage;
use thiserror::Error;

use crate::color::{Hsl, rgb_to_hsl};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels")]
    Empty,
}

/// Where an image is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Original,
    Processed,
    /// Side panel showing the processed image.
    Preview,
}

/// On-screen size of a displayed image, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A pixel read from a displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSample {
    /// Natural-resolution coordinates.
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
    pub hsl: Hsl,
}

impl PixelSample {
    /// Alpha as a fraction, rounded to two decimals.
    pub fn alpha(&self) -> f64 {
        (f64::from(self.rgba[3]) / 255.0 * 100.0).round() / 100.0
    }

    /// CSS color for a swatch.
    pub fn css_color(&self) -> String {
        let [r, g, b, _] = self.rgba;
        format!("rgba({}, {}, {}, {:.2})", r, g, b, self.alpha())
    }
}

impl fmt::Display for PixelSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x: {}, y: {} | {}, A: {:.2}",
            self.x,
            self.y,
            self.hsl,
            self.alpha()
        )
    }
}

/// Captured canvases for every displayed image.
#[derive(Debug, Default)]
pub struct PixelSampler {
    canvases: HashMap<ImageSlot, RgbaImage>,
}

impl PixelSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode encoded image bytes into the slot's canvas.
    pub fn capture(&mut self, slot: ImageSlot, bytes: &[u8]) -> Result<(), SampleError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        self.capture_image(slot, image)
    }

    pub fn capture_image(&mut self, slot: ImageSlot, image: RgbaImage) -> Result<(), SampleError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SampleError::Empty);
        }
        tracing::trace!("captured {:?} canvas {}x{}", slot, image.width(), image.height());
        self.canvases.insert(slot, image);
        Ok(())
    }

    /// Capture a freshly rendered pair into all three slots.
    ///
    /// The pair is decoded before any slot changes, so a bad pair leaves the
    /// previous canvases in place.
    pub fn capture_pair(&mut self, pair: &ImagePair) -> Result<(), SampleError> {
        let original = image::load_from_memory(&pair.original)?.to_rgba8();
        let processed = image::load_from_memory(&pair.processed)?.to_rgba8();
        self.capture_decoded_pair(original, processed)
    }

    /// Capture an already decoded pair; both canvases must be non-empty.
    pub fn capture_decoded_pair(
        &mut self,
        original: RgbaImage,
        processed: RgbaImage,
    ) -> Result<(), SampleError> {
        let empty = |image: &RgbaImage| image.width() == 0 || image.height() == 0;
        if empty(&original) || empty(&processed) {
            return Err(SampleError::Empty);
        }
        self.canvases.insert(ImageSlot::Preview, processed.clone());
        self.canvases.insert(ImageSlot::Processed, processed);
        self.canvases.insert(ImageSlot::Original, original);
        Ok(())
    }

    pub fn forget(&mut self, slot: ImageSlot) {
        self.canvases.remove(&slot);
    }

    /// Natural size of the slot's canvas.
    pub fn natural_size(&self, slot: ImageSlot) -> Option<(u32, u32)> {
        self.canvases.get(&slot).map(|c| c.dimensions())
    }

    /// Read the pixel under display offset `(x, y)`.
    ///
    /// `None` when the slot has no canvas, the display size is zero, or the
    /// offset maps outside the image.
    pub fn sample(
        &self,
        slot: ImageSlot,
        x: f64,
        y: f64,
        displayed: DisplaySize,
    ) -> Option<PixelSample> {
        let canvas = self.canvases.get(&slot)?;
        let nx = to_native(x, canvas.width(), displayed.width)?;
        let ny = to_native(y, canvas.height(), displayed.height)?;
        let rgba = canvas.get_pixel_checked(nx, ny)?.0;
        Some(PixelSample {
            x: nx,
            y: ny,
            rgba,
            hsl: rgb_to_hsl(rgba[0], rgba[1], rgba[2]),
        })
    }
}

fn to_native(offset: f64, natural: u32, displayed: u32) -> Option<u32> {
    if displayed == 0 || !offset.is_finite() || offset < 0.0 {
        return None;
    }
    let native = (offset * f64::from(natural) / f64::from(displayed)).floor();
    (native < f64::from(natural)).then_some(native as u32)
}
