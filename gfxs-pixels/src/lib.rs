//! GFXS Pixels - Pixel readout for displayed render images.
//!
//! Maps a pointer position on a scaled image back to the image's natural
//! resolution and reports the pixel there, with its HSL value.

mod color;
mod sampler;

pub use color::{Hsl, rgb_to_hsl};
pub use sampler::{DisplaySize, ImageSlot, PixelSample, PixelSampler, SampleError};
