// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The finished picture.  A `Raster` is the only thing a render hands
//! back; encoding it to a file is up to the caller.

use crate::colors::Rgb;
use crate::error::{RenderError, Result};
use crate::planes::Grid;
use image::RgbImage;
use num::clamp;

/// An owned 8-bit RGB pixel buffer, row-major, top row first.
#[derive(Clone, Debug)]
pub struct Raster {
    image: RgbImage,
}

/// Channels per pixel.
pub const CHANNELS: usize = 3;

impl Raster {
    /// Quantizes one color per grid cell into a buffer.
    pub fn from_colors<I>(grid: Grid, colors: I) -> Result<Raster>
    where
        I: IntoIterator<Item = Rgb>,
    {
        let mut bytes = Vec::with_capacity(grid.len() * CHANNELS);
        for color in colors {
            bytes.extend(color.iter().map(|&c| quantize(c)));
        }
        if bytes.len() != grid.len() * CHANNELS {
            return Err(RenderError::invalid(
                "grid",
                format!(
                    "{} color values do not fill a {}x{} grid",
                    bytes.len() / CHANNELS,
                    grid.columns(),
                    grid.rows()
                ),
            ));
        }
        let too_wide = || RenderError::invalid("grid", "dimensions exceed the image format");
        if grid.columns() > u32::max_value() as usize || grid.rows() > u32::max_value() as usize {
            return Err(too_wide());
        }
        let image = RgbImage::from_raw(grid.columns() as u32, grid.rows() as u32, bytes)
            .ok_or_else(too_wide)?;
        Ok(Raster { image })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// The pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let at = (y as usize * self.width() as usize + x as usize) * CHANNELS;
        let bytes = self.as_bytes();
        [bytes[at], bytes[at + 1], bytes[at + 2]]
    }

    /// The raw interleaved buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    /// Hands over the underlying image for encoding.
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// [0, 1] to [0, 255], rounding to nearest.  NaN becomes 0.
#[inline]
pub fn quantize(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (clamp(value, 0.0, 1.0) * 255.0).round() as u8
}
