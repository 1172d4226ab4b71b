// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dense per-pixel storage for whatever a generator measures.

use crate::planes::{Grid, Pixel};
use itertools::{Itertools, MinMaxResult};

/// One value per pixel, stored row-major with row 0 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField<T> {
    grid: Grid,
    values: Vec<T>,
}

impl<T: Copy + Default> ScalarField<T> {
    /// A field of `T::default()` shaped like `grid`.
    pub fn new(grid: Grid) -> Self {
        ScalarField {
            grid,
            values: vec![T::default(); grid.len()],
        }
    }
}

impl<T: Copy> ScalarField<T> {
    /// Wraps an existing buffer.  Returns `None` if the length does not
    /// match the grid.
    pub fn from_values(grid: Grid, values: Vec<T>) -> Option<Self> {
        if values.len() != grid.len() {
            return None;
        }
        Some(ScalarField { grid, values })
    }

    /// The grid the field is shaped to.
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// The value at `pixel`.
    pub fn get(&self, pixel: Pixel) -> T {
        self.values[pixel.1 * self.grid.columns() + pixel.0]
    }

    /// All values, row-major.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable access for workers that fill the field.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Consumes the field.
    pub fn into_values(self) -> Vec<T> {
        self.values
    }
}

impl ScalarField<f64> {
    /// The smallest and largest finite values, if there are any.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        finite_range(self.values.iter().cloned())
    }
}

/// Smallest and largest finite value in a sequence.
pub fn finite_range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    match values.filter(|v| v.is_finite()).minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(v) => Some((v, v)),
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_row_major() {
        let grid = Grid::from_pixels(3, 2).unwrap();
        let field = ScalarField::from_values(grid, vec![0u32, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(field.get(Pixel(0, 0)), 0);
        assert_eq!(field.get(Pixel(2, 0)), 2);
        assert_eq!(field.get(Pixel(1, 1)), 4);
    }

    #[test]
    fn from_values_checks_length() {
        let grid = Grid::from_pixels(3, 2).unwrap();
        assert!(ScalarField::from_values(grid, vec![0u32; 5]).is_none());
    }

    #[test]
    fn finite_range_skips_non_finite() {
        let grid = Grid::from_pixels(2, 2).unwrap();
        let field = ScalarField::from_values(
            grid,
            vec![-1.5, std::f64::INFINITY, 3.0, std::f64::NAN],
        )
        .unwrap();
        assert_eq!(field.finite_range(), Some((-1.5, 3.0)));
    }

    #[test]
    fn finite_range_of_nothing() {
        assert_eq!(finite_range(vec![std::f64::NAN].into_iter()), None);
        assert_eq!(finite_range(vec![2.0].into_iter()), Some((2.0, 2.0)));
    }
}
