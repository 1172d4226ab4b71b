// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at 0,0 in
//! its upper-left corner, and a rectangle on the real plane described
//! by a pair of bounds on each axis.
//!
//! Every generator samples pixel *centers*: column 0 sits half a pixel
//! to the right of `x_min`, and row 0 sits half a pixel below `y_max`,
//! so images come out the right way up.
use crate::error::{RenderError, Result};
use num::Complex;

/// Two half-open real intervals describing a window onto the plane.
/// For the escape-time and orbit generators this is the complex plane;
/// for the Lyapunov generator the axes are the two map parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Region {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Region {
    /// Builds a region from its x and y bounds.  Each bound must be
    /// finite and strictly increasing.
    pub fn new(x_bound: (f64, f64), y_bound: (f64, f64)) -> Result<Region> {
        check_bound("x-bound", x_bound)?;
        check_bound("y-bound", y_bound)?;
        Ok(Region {
            x_min: x_bound.0,
            x_max: x_bound.1,
            y_min: y_bound.0,
            y_max: y_bound.1,
        })
    }

    /// The x interval.
    pub fn x_bound(&self) -> (f64, f64) {
        (self.x_min, self.x_max)
    }

    /// The y interval.
    pub fn y_bound(&self) -> (f64, f64) {
        (self.y_min, self.y_max)
    }

    /// Width of the window in plane units.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the window in plane units.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

fn check_bound(field: &'static str, bound: (f64, f64)) -> Result<()> {
    if !bound.0.is_finite() || !bound.1.is_finite() {
        return Err(RenderError::invalid(field, "bounds must be finite"));
    }
    if bound.0 >= bound.1 {
        return Err(RenderError::invalid(
            field,
            format!("minimum {} is not below maximum {}", bound.0, bound.1),
        ));
    }
    Ok(())
}

/// The output resolution: a width and height in figure units scaled
/// by a density in dots per unit.  A 4x3 figure at density 300 is a
/// 1200x900 pixel grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Grid {
    columns: usize,
    rows: usize,
}

impl Grid {
    /// Resolves the pixel dimensions, rounding `width * density` and
    /// `height * density` to the nearest pixel.
    pub fn new(width: u32, height: u32, density: f64) -> Result<Grid> {
        if width == 0 {
            return Err(RenderError::invalid("width", "must be positive"));
        }
        if height == 0 {
            return Err(RenderError::invalid("height", "must be positive"));
        }
        if !density.is_finite() || density <= 0.0 {
            return Err(RenderError::invalid(
                "density",
                "must be a positive, finite number",
            ));
        }
        let columns = (f64::from(width) * density).round();
        let rows = (f64::from(height) * density).round();
        if columns < 1.0 || rows < 1.0 {
            return Err(RenderError::invalid(
                "density",
                format!("{}x{} at density {} has no pixels", width, height, density),
            ));
        }
        Ok(Grid {
            columns: columns as usize,
            rows: rows as usize,
        })
    }

    /// A grid given directly in pixels.
    pub fn from_pixels(columns: usize, rows: usize) -> Result<Grid> {
        if columns == 0 || rows == 0 {
            return Err(RenderError::invalid("width", "grid has no pixels"));
        }
        Ok(Grid { columns, rows })
    }

    /// Pixel columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Pixel rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The total number of points in the integral grid.  Used to
    /// calculate memory needs.
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    /// Describes that the integral plane is of a size.
    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    /// Fails with `ResourceExceeded` when `bytes_per_pixel` of working
    /// memory across the whole grid would pass `ceiling`.
    pub fn ensure_within(&self, bytes_per_pixel: u64, ceiling: u64) -> Result<()> {
        let required = (self.columns as u64)
            .checked_mul(self.rows as u64)
            .and_then(|n| n.checked_mul(bytes_per_pixel))
            .unwrap_or(u64::max_value());
        if required > ceiling {
            return Err(RenderError::ResourceExceeded { required, ceiling });
        }
        Ok(())
    }
}

/// Describes the column, row of a pixel in a grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps points between a pixel grid and a region of the plane.
#[derive(Copy, Clone, Debug)]
pub struct PlaneMapper {
    /// The pixel grid.
    pub grid: Grid,
    /// The window onto the plane.
    pub region: Region,
    // Plane units per pixel along x and y.
    steps: (f64, f64),
}

impl PlaneMapper {
    /// Pairs a grid with a region.  Both are already validated, so
    /// this cannot fail.
    pub fn new(grid: Grid, region: Region) -> PlaneMapper {
        let steps = (
            region.width() / (grid.columns as f64),
            region.height() / (grid.rows as f64),
        );
        PlaneMapper {
            grid,
            region,
            steps,
        }
    }

    /// Given a pixel on the integral cartesian plane, return the plane
    /// coordinate of its center.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            self.region.x_min + (pixel.0 as f64 + 0.5) * self.steps.0,
            self.region.y_max - (pixel.1 as f64 + 0.5) * self.steps.1,
        )
    }

    /// Given a complex number corresponding to a location on the
    /// plane, find the pixel that contains it, if any does.
    pub fn point_to_pixel(&self, point: &Complex<f64>) -> Option<Pixel> {
        let left = (point.re - self.region.x_min) / self.steps.0;
        let top = (self.region.y_max - point.im) / self.steps.1;
        // NaN fails both comparisons and falls out here too.
        if !(left >= 0.0 && top >= 0.0) {
            return None;
        }
        let (left, top) = (left as usize, top as usize);
        if left >= self.grid.columns || top >= self.grid.rows {
            return None;
        }
        Some(Pixel(left, top))
    }

    /// Since the Buddhabrot actually tracks the progress of a complex
    /// number as it orbits, we have to map those complex numbers back
    /// to the pixel plane.  This function takes a point, maps it to
    /// pixel coordinates, then returns the linear offset from the root
    /// of the image buffer in memory.
    pub fn point_to_offset(&self, point: &Complex<f64>) -> Option<usize> {
        self.point_to_pixel(point)
            .map(|pixel| pixel.1 * self.grid.columns + pixel.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(columns: usize, rows: usize, x: (f64, f64), y: (f64, f64)) -> PlaneMapper {
        PlaneMapper::new(
            Grid::from_pixels(columns, rows).unwrap(),
            Region::new(x, y).unwrap(),
        )
    }

    #[test]
    fn region_fails_on_bad_shape() {
        assert!(Region::new((1.0, -1.0), (-1.0, 1.0)).is_err());
        assert!(Region::new((-1.0, 1.0), (1.0, 1.0)).is_err());
        assert!(Region::new((-1.0, std::f64::NAN), (-1.0, 1.0)).is_err());
    }

    #[test]
    fn region_passes_on_good_shape() {
        assert!(Region::new((-1.0, 1.0), (-1.0, 1.0)).is_ok());
    }

    #[test]
    fn bad_region_names_the_axis() {
        match Region::new((-1.0, 1.0), (2.0, 1.0)) {
            Err(RenderError::InvalidParameter { field, .. }) => assert_eq!(field, "y-bound"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn grid_scales_by_density() {
        let grid = Grid::new(4, 3, 300.0).unwrap();
        assert_eq!((grid.columns(), grid.rows()), (1200, 900));
        assert_eq!(grid.len(), 1_080_000);
    }

    #[test]
    fn grid_rejects_empty_dimensions() {
        assert!(Grid::new(0, 3, 1.0).is_err());
        assert!(Grid::new(4, 0, 1.0).is_err());
        assert!(Grid::new(4, 3, 0.0).is_err());
        assert!(Grid::new(4, 3, -2.0).is_err());
        assert!(Grid::new(4, 3, 0.01).is_err());
    }

    #[test]
    fn grid_memory_ceiling() {
        let grid = Grid::from_pixels(100, 100).unwrap();
        assert!(grid.ensure_within(4, 40_000).is_ok());
        assert_eq!(
            grid.ensure_within(4, 39_999),
            Err(RenderError::ResourceExceeded {
                required: 40_000,
                ceiling: 39_999
            })
        );
    }

    #[test]
    fn pixel_to_point_samples_centers() {
        let pm = mapper(4, 4, (-2.0, 2.0), (-2.0, 2.0));
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Complex::new(-1.5, 1.5));
        assert_eq!(pm.pixel_to_point(&Pixel(3, 3)), Complex::new(1.5, -1.5));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 1)), Complex::new(0.5, 0.5));
    }

    #[test]
    fn pixel_to_point_is_monotonic() {
        let pm = mapper(640, 480, (-2.0, 1.0), (-1.5, 1.5));
        let mut last = std::f64::NEG_INFINITY;
        for column in 0..640 {
            let re = pm.pixel_to_point(&Pixel(column, 7)).re;
            assert!(re > last);
            last = re;
        }
        let mut last = std::f64::INFINITY;
        for row in 0..480 {
            let im = pm.pixel_to_point(&Pixel(3, row)).im;
            assert!(im < last);
            last = im;
        }
    }

    #[test]
    fn point_to_pixel_on_mixed_planes() {
        let pm = mapper(4, 4, (-2.0, 2.0), (-2.0, 2.0));
        assert_eq!(pm.point_to_pixel(&Complex::new(0.0, 0.0)), Some(Pixel(2, 2)));
        assert_eq!(pm.point_to_pixel(&Complex::new(-2.0, 2.0)), Some(Pixel(0, 0)));
        assert_eq!(pm.point_to_pixel(&Complex::new(2.0, 2.0)), None);
        assert_eq!(pm.point_to_pixel(&Complex::new(-2.1, 0.0)), None);
    }

    #[test]
    fn point_to_pixel_inverts_pixel_to_point() {
        let pm = mapper(640, 640, (-2.0, 2.0), (-2.0, 2.0));
        for &pixel in &[Pixel(0, 0), Pixel(320, 320), Pixel(639, 639), Pixel(480, 12)] {
            let point = pm.pixel_to_point(&pixel);
            assert_eq!(pm.point_to_pixel(&point), Some(pixel));
        }
    }

    #[test]
    fn point_to_offset_is_row_major() {
        let pm = mapper(5, 5, (0.0, 5.0), (0.0, 5.0));
        assert_eq!(pm.point_to_offset(&Complex::new(0.5, 4.5)), Some(0));
        assert_eq!(pm.point_to_offset(&Complex::new(2.5, 2.5)), Some(12));
        assert_eq!(pm.point_to_offset(&Complex::new(4.5, 0.5)), Some(24));
        assert_eq!(pm.point_to_offset(&Complex::new(std::f64::NAN, 0.5)), None);
    }
}
