// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The point maps shared by the escape-time and orbit generators.

use crate::error::{RenderError, Result};
use num::Complex;

/// A point map `z -> f(z, c)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UpdateRule {
    /// `z^n + c`.  `Power(2)` is the classic Mandelbrot map.
    Power(u32),
    /// `conj(z)^n + c`, the Tricorn family.
    ConjugatePower(u32),
}

impl Default for UpdateRule {
    fn default() -> Self {
        UpdateRule::Power(2)
    }
}

impl UpdateRule {
    /// The degree of the map.
    pub fn power(&self) -> u32 {
        match *self {
            UpdateRule::Power(n) | UpdateRule::ConjugatePower(n) => n,
        }
    }

    /// Rejects maps of degree below two; their smoothing term divides
    /// by `ln(power)`.
    pub fn validate(&self) -> Result<()> {
        if self.power() < 2 {
            return Err(RenderError::invalid(
                "power",
                format!("must be at least 2, got {}", self.power()),
            ));
        }
        Ok(())
    }

    /// One step of the map.
    #[inline]
    pub fn apply(&self, z: Complex<f64>, c: Complex<f64>) -> Complex<f64> {
        match *self {
            UpdateRule::Power(2) => z * z + c,
            UpdateRule::Power(n) => num::pow(z, n as usize) + c,
            UpdateRule::ConjugatePower(n) => num::pow(z.conj(), n as usize) + c,
        }
    }

    /// True if `c` is guaranteed never to escape under this map.  Only
    /// the classic map has a cheap test: the main cardioid and the
    /// period-2 bulb.
    pub fn known_interior(&self, c: Complex<f64>) -> bool {
        match *self {
            UpdateRule::Power(2) => !maybe_outside(c),
            _ => false,
        }
    }
}

const D4: f64 = 1.0 / 4.0;
const D16: f64 = D4 / 4.0;

/// The two halves of the `and` expression are false if the point is
/// inside the main cardioid or the period-2 bulb of the Mandelbrot
/// set.  It does *not* guarantee that a point will be outside; it only
/// rules out the two largest interior components.
pub fn maybe_outside(point: Complex<f64>) -> bool {
    let y = point.im.powi(2);
    let q = y + (point.re - D4).powi(2);
    q * (q + point.re - D4) > (y * D4) && (point.re + 1.0_f64).powi(2) + y > D16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_two_is_mandelbrot() {
        let rule = UpdateRule::Power(2);
        let z = Complex::new(1.0, 2.0);
        let c = Complex::new(0.5, -0.5);
        assert_eq!(rule.apply(z, c), z * z + c);
    }

    #[test]
    fn higher_powers_multiply_out() {
        let z = Complex::new(0.5, 1.0);
        let c = Complex::new(0.0, 0.0);
        assert_eq!(UpdateRule::Power(3).apply(z, c), z * z * z);
        assert_eq!(
            UpdateRule::ConjugatePower(2).apply(z, c),
            z.conj() * z.conj()
        );
    }

    #[test]
    fn low_powers_are_rejected() {
        assert!(UpdateRule::Power(1).validate().is_err());
        assert!(UpdateRule::ConjugatePower(0).validate().is_err());
        assert!(UpdateRule::Power(2).validate().is_ok());
    }

    #[test]
    fn cardioid_and_bulb_are_interior() {
        let rule = UpdateRule::Power(2);
        assert!(rule.known_interior(Complex::new(0.0, 0.0)));
        assert!(rule.known_interior(Complex::new(-1.0, 0.0)));
        assert!(!rule.known_interior(Complex::new(1.0, 1.0)));
        assert!(!rule.known_interior(Complex::new(-1.9, 0.0)));
        assert!(!UpdateRule::Power(3).known_interior(Complex::new(0.0, 0.0)));
    }
}
