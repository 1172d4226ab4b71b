// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Markus-Lyapunov fractals.
//!
//! The logistic map `x -> r x (1 - x)` is iterated with `r` switching
//! between two values, `a` and `b`, in the order a forcing string like
//! `AABAB` dictates.  Each pixel is one `(a, b)` pair: `a` along the
//! x axis, `b` along the y axis.  After a burn-in that lets the orbit
//! settle, the average of `ln |r (1 - 2x)|` over the remaining steps is
//! the Lyapunov exponent.  Negative exponents mean the orbit settles
//! into a cycle; positive ones mean it is chaotic.

use crate::colors::{self, ColorMap};
use crate::error::{RenderError, Result};
use crate::field::ScalarField;
use crate::planes::{Grid, PlaneMapper, Region};
use crate::pool::{fill_rows, note_cancelled, CancelToken, RenderConfig};
use crate::raster::{Raster, CHANNELS};
use log::{debug, info};
use std::time::Instant;

/// Smallest derivative magnitude fed to the logarithm.  A derivative
/// of exactly zero (the orbit sitting on `x = 1/2`) contributes
/// `ln(MIN_DERIVATIVE)` instead of negative infinity.
pub const MIN_DERIVATIVE: f64 = 1e-12;
/// The starting value of every orbit.
pub const DEFAULT_INITIAL_X: f64 = 0.5;
/// Default forcing string.
pub const DEFAULT_FORCING: &str = "AAAAAABBBBBB";
/// Default burn-in length.
pub const DEFAULT_BURN_IN: u32 = 2000;
/// Default measured iterations.
pub const DEFAULT_ITERATIONS: u32 = 2000;
/// Default (negative, positive) gammas.
pub const DEFAULT_GAMMAS: (f64, f64) = (8.0, 1.0);

// exponent field (f64), colors ([f64; 3]), raster.
const BYTES_PER_PIXEL: u64 = 8 + 24 + CHANNELS as u64;

/// Which parameter drives a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Forcing {
    /// Use the x-axis parameter.
    A,
    /// Use the y-axis parameter.
    B,
}

/// Parses a forcing string.  Letters are case-insensitive; anything
/// other than A or B is rejected, as is the empty string.
pub fn parse_forcing(s: &str) -> Result<Vec<Forcing>> {
    if s.is_empty() {
        return Err(RenderError::invalid("forcing", "must not be empty"));
    }
    s.chars()
        .map(|c| match c {
            'A' | 'a' => Ok(Forcing::A),
            'B' | 'b' => Ok(Forcing::B),
            other => Err(RenderError::invalid(
                "forcing",
                format!("`{}` is not A or B", other),
            )),
        })
        .collect()
}

/// Everything needed to render one Lyapunov image.
#[derive(Clone, Debug)]
pub struct LyapunovRequest {
    /// The cyclic parameter schedule.
    pub forcing: Vec<Forcing>,
    /// The window onto the (a, b) parameter plane.
    pub region: Region,
    /// The output resolution.
    pub grid: Grid,
    /// Steps discarded before measuring.
    pub burn_in: u32,
    /// Steps measured.
    pub iterations: u32,
    /// Where every orbit starts.
    pub initial_x: f64,
    /// Palette for exponents at or below zero.
    pub negative_map: ColorMap,
    /// Palette for positive exponents.
    pub positive_map: ColorMap,
    /// Gammas for the (negative, positive) sides.
    pub gammas: (f64, f64),
}

impl LyapunovRequest {
    /// A request with the default schedule lengths and the bone /
    /// reversed-bone palettes.
    pub fn new(forcing: Vec<Forcing>, region: Region, grid: Grid) -> Self {
        LyapunovRequest {
            forcing,
            region,
            grid,
            burn_in: DEFAULT_BURN_IN,
            iterations: DEFAULT_ITERATIONS,
            initial_x: DEFAULT_INITIAL_X,
            negative_map: ColorMap::bone(),
            positive_map: ColorMap::bone().reversed(),
            gammas: DEFAULT_GAMMAS,
        }
    }

    /// Checks every field before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.forcing.is_empty() {
            return Err(RenderError::invalid("forcing", "must not be empty"));
        }
        if self.burn_in == 0 {
            return Err(RenderError::invalid("burn-in", "must be positive"));
        }
        if self.iterations == 0 {
            return Err(RenderError::invalid("iterations", "must be positive"));
        }
        if !self.initial_x.is_finite() {
            return Err(RenderError::invalid("initial-x", "must be finite"));
        }
        colors::check_gamma("negative gamma", self.gammas.0)?;
        colors::check_gamma("positive gamma", self.gammas.1)
    }
}

/// The Lyapunov exponent of one `(a, b)` pair.  The forcing position
/// carries on from the burn-in into the measured steps.  An orbit that
/// leaves the finite numbers is unbounded and reports `+inf`.
pub fn lyapunov_exponent(
    forcing: &[Forcing],
    a: f64,
    b: f64,
    initial_x: f64,
    burn_in: u32,
    iterations: u32,
) -> f64 {
    let mut schedule = forcing
        .iter()
        .cycle()
        .map(|f| match f {
            Forcing::A => a,
            Forcing::B => b,
        });
    let mut x = initial_x;

    for r in schedule.by_ref().take(burn_in as usize) {
        x = r * x * (1.0 - x);
    }
    if !x.is_finite() {
        return std::f64::INFINITY;
    }

    let mut sum = 0.0;
    for r in schedule.take(iterations as usize) {
        let derivative = (r * (1.0 - 2.0 * x)).abs();
        sum += derivative.max(MIN_DERIVATIVE).ln();
        x = r * x * (1.0 - x);
        if !x.is_finite() {
            return std::f64::INFINITY;
        }
    }
    sum / f64::from(iterations)
}

/// Measures the exponent at every pixel of the request.
pub fn compute(
    request: &LyapunovRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<ScalarField<f64>> {
    request.validate()?;
    config.validate()?;
    request
        .grid
        .ensure_within(BYTES_PER_PIXEL, config.memory_ceiling)?;

    let mapper = PlaneMapper::new(request.grid, request.region);
    debug!(
        "lyapunov: {}x{} pixels, forcing of length {}, {}+{} steps",
        request.grid.columns(),
        request.grid.rows(),
        request.forcing.len(),
        request.burn_in,
        request.iterations
    );

    let mut field = ScalarField::new(request.grid);
    let forcing = &request.forcing[..];
    fill_rows(&mut field, config, cancel, |pixel| {
        let p = mapper.pixel_to_point(&pixel);
        lyapunov_exponent(
            forcing,
            p.re,
            p.im,
            request.initial_x,
            request.burn_in,
            request.iterations,
        )
    })?;
    Ok(field)
}

/// Renders the request to a finished raster.
pub fn render(request: &LyapunovRequest, config: &RenderConfig) -> Result<Raster> {
    render_with_cancel(request, config, &CancelToken::new())
}

/// As `render`, stopping early with `Cancelled` if `cancel` fires.
pub fn render_with_cancel(
    request: &LyapunovRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<Raster> {
    let started = Instant::now();
    let field = note_cancelled("lyapunov", compute(request, config, cancel))?;
    let colors = colors::lyapunov_colors(
        &field,
        &request.negative_map,
        &request.positive_map,
        request.gammas,
    )?;
    let raster = Raster::from_colors(request.grid, colors)?;
    info!(
        "lyapunov: rendered {}x{} in {:?}",
        raster.width(),
        raster.height(),
        started.elapsed()
    );
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LN_2: f64 = std::f64::consts::LN_2;

    #[test]
    fn forcing_strings_parse() {
        assert_eq!(
            parse_forcing("AbBa").unwrap(),
            vec![Forcing::A, Forcing::B, Forcing::B, Forcing::A]
        );
        assert!(parse_forcing("").is_err());
        assert!(parse_forcing("ABC").is_err());
    }

    #[test]
    fn stable_parameter_is_negative() {
        // Fixed point at 0.6 with derivative -0.5.
        let lambda = lyapunov_exponent(&[Forcing::A], 2.5, 0.0, 0.5, 100, 1000);
        assert!(lambda < 0.0);
        assert!((lambda + LN_2).abs() < 1e-3);
    }

    #[test]
    fn fully_chaotic_parameter_from_one_half_sticks_at_zero() {
        // 0.5 -> 1 -> 0, then the orbit sits on the repelling fixed
        // point, where the derivative is 4.
        let lambda = lyapunov_exponent(&[Forcing::A], 4.0, 0.0, 0.5, 2000, 20_000);
        assert!((lambda - 4.0f64.ln()).abs() < 1e-12, "got {}", lambda);
    }

    #[test]
    fn fully_chaotic_parameter_is_ln_two() {
        // A generic seed stays on the chaotic attractor.
        let lambda = lyapunov_exponent(&[Forcing::A], 4.0, 0.0, 0.3, 2000, 20_000);
        assert!(lambda > 0.0);
        assert!((lambda - LN_2).abs() < 0.05, "got {}", lambda);
    }

    #[test]
    fn zero_derivative_is_floored() {
        // r = 2 pins the orbit to x = 1/2, where the derivative vanishes.
        let lambda = lyapunov_exponent(&[Forcing::A], 2.0, 0.0, 0.5, 10, 100);
        assert!(lambda.is_finite());
        assert!((lambda - MIN_DERIVATIVE.ln()).abs() < 1e-9);
    }

    #[test]
    fn b_steps_use_the_second_parameter() {
        let only_b = lyapunov_exponent(&[Forcing::B], 4.0, 2.5, 0.3, 100, 1000);
        assert!((only_b + LN_2).abs() < 1e-3);
    }

    #[test]
    fn unbounded_orbits_are_infinite() {
        let lambda = lyapunov_exponent(&[Forcing::A], 6.0, 0.0, 0.3, 2000, 100);
        assert_eq!(lambda, std::f64::INFINITY);
    }

    #[test]
    fn validation_names_the_field() {
        let region = Region::new((2.0, 4.0), (2.0, 4.0)).unwrap();
        let grid = Grid::from_pixels(4, 4).unwrap();
        let mut req = LyapunovRequest::new(vec![Forcing::A], region, grid);
        req.burn_in = 0;
        match req.validate() {
            Err(RenderError::InvalidParameter { field, .. }) => assert_eq!(field, "burn-in"),
            other => panic!("unexpected {:?}", other),
        }
        let mut req = LyapunovRequest::new(vec![], region, grid);
        assert!(req.validate().is_err());
        req.forcing = vec![Forcing::B];
        req.iterations = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn compute_fills_the_parameter_plane() {
        let region = Region::new((2.5, 2.7), (2.5, 2.7)).unwrap();
        let grid = Grid::from_pixels(6, 5).unwrap();
        let mut req = LyapunovRequest::new(parse_forcing("AB").unwrap(), region, grid);
        req.burn_in = 200;
        req.iterations = 400;
        let field = compute(&req, &RenderConfig::with_threads(2), &CancelToken::new()).unwrap();
        assert!(field.values().iter().all(|&l| l < 0.0));
    }

    #[test]
    fn render_produces_the_grid() {
        let region = Region::new((2.5, 3.4), (3.4, 4.0)).unwrap();
        let grid = Grid::from_pixels(12, 9).unwrap();
        let mut req = LyapunovRequest::new(parse_forcing(DEFAULT_FORCING).unwrap(), region, grid);
        req.burn_in = 100;
        req.iterations = 100;
        let raster = render(&req, &RenderConfig::with_threads(2)).unwrap();
        assert_eq!((raster.width(), raster.height()), (12, 9));
    }
}
