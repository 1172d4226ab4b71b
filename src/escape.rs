// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time renderer.  Every pixel's center is taken as `c`,
//! the orbit of zero under the update rule is followed, and the number
//! of steps it stays inside the horizon is recorded.  Points that are
//! still inside after `max_iterations` steps are assumed to be in the
//! set and record `max_iterations`.

use crate::colors::{self, ColorMap};
use crate::error::{RenderError, Result};
use crate::field::ScalarField;
use crate::planes::{Grid, PlaneMapper, Region};
use crate::pool::{fill_rows, note_cancelled, CancelToken, RenderConfig};
use crate::raster::{Raster, CHANNELS};
use crate::update::UpdateRule;
use log::{debug, info};
use num::Complex;
use std::time::Instant;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5000;
/// Default escape radius.
pub const DEFAULT_HORIZON: f64 = 2.0;
/// Default gamma.
pub const DEFAULT_GAMMA: f64 = 0.8;
/// How many times the default palette is stacked.
pub const DEFAULT_STACK: usize = 50;

// counts (u32), the float field (f64), the colors ([f64; 3]) and the
// raster itself.
const BASE_BYTES_PER_PIXEL: u64 = 4 + 8 + 24 + CHANNELS as u64;
// The smoothed field is kept alongside the counts.
const SMOOTH_BYTES_PER_PIXEL: u64 = 8;

/// Everything needed to render one escape-time image.
#[derive(Clone, Debug)]
pub struct EscapeTimeRequest {
    /// The window onto the complex plane.
    pub region: Region,
    /// The output resolution.
    pub grid: Grid,
    /// The point map.
    pub rule: UpdateRule,
    /// The iteration cap; interior points record this value.
    pub max_iterations: u32,
    /// The escape radius.
    pub horizon: f64,
    /// Record a fractional escape count for smoother coloring.
    pub smooth: bool,
    /// Gamma applied after normalization.
    pub gamma: f64,
    /// The palette.
    pub colormap: ColorMap,
}

impl EscapeTimeRequest {
    /// A request with the classic map and the default palette, a gray
    /// ramp stacked fifty times.
    pub fn new(region: Region, grid: Grid) -> Self {
        let colormap = ColorMap::gray()
            .stacked(DEFAULT_STACK)
            .unwrap_or_else(|_| ColorMap::gray());
        EscapeTimeRequest {
            region,
            grid,
            rule: UpdateRule::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            horizon: DEFAULT_HORIZON,
            smooth: false,
            gamma: DEFAULT_GAMMA,
            colormap,
        }
    }

    /// Checks every field before any work starts.
    pub fn validate(&self) -> Result<()> {
        self.rule.validate()?;
        if self.max_iterations == 0 {
            return Err(RenderError::invalid("max-iterations", "must be positive"));
        }
        if !(self.horizon > 0.0) || !self.horizon.is_finite() {
            return Err(RenderError::invalid(
                "horizon",
                format!("must be a positive, finite radius, got {}", self.horizon),
            ));
        }
        colors::check_gamma("gamma", self.gamma)
    }

    fn bytes_per_pixel(&self) -> u64 {
        if self.smooth {
            BASE_BYTES_PER_PIXEL + SMOOTH_BYTES_PER_PIXEL
        } else {
            BASE_BYTES_PER_PIXEL
        }
    }
}

/// The escape-time measurements for a grid.
#[derive(Clone, Debug)]
pub struct EscapeField {
    /// Whole escape counts in [0, max_iterations].
    pub counts: ScalarField<u32>,
    /// Fractional counts, if smoothing was requested.
    pub smooth: Option<ScalarField<f64>>,
}

/// Follows the orbit of zero under `rule` for the point `c`.  Returns
/// the number of iterates that stayed within `horizon`, and the first
/// iterate that did not.  A point that never leaves returns
/// `(max_iterations, None)`.  An orbit that overflows to NaN counts as
/// escaped.
#[inline]
pub fn escape_time(
    rule: UpdateRule,
    c: Complex<f64>,
    max_iterations: u32,
    horizon: f64,
) -> (u32, Option<Complex<f64>>) {
    let limit = horizon * horizon;
    let mut z = Complex::new(0.0, 0.0);
    for n in 0..max_iterations {
        z = rule.apply(z, c);
        if !(z.norm_sqr() <= limit) {
            return (n, Some(z));
        }
    }
    (max_iterations, None)
}

/// The continuous escape count `n + 1 - ln(ln|z|) / ln(power)`,
/// clamped to [0, max_iterations].  Falls back to `n` whenever the
/// double logarithm is undefined.
pub fn smooth_count(n: u32, escaped: Option<Complex<f64>>, power: u32, max_iterations: u32) -> f64 {
    let z = match escaped {
        Some(z) => z,
        None => return f64::from(max_iterations),
    };
    let log_modulus = z.norm().ln();
    if !(log_modulus > 0.0) || !log_modulus.is_finite() {
        return f64::from(n);
    }
    let nu = f64::from(n) + 1.0 - log_modulus.ln() / f64::from(power).ln();
    if !nu.is_finite() {
        return f64::from(n);
    }
    nu.max(0.0).min(f64::from(max_iterations))
}

/// Measures every pixel of the request.
pub fn compute(
    request: &EscapeTimeRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<EscapeField> {
    request.validate()?;
    config.validate()?;
    request
        .grid
        .ensure_within(request.bytes_per_pixel(), config.memory_ceiling)?;

    let mapper = PlaneMapper::new(request.grid, request.region);
    let (rule, max_iterations, horizon) = (request.rule, request.max_iterations, request.horizon);
    debug!(
        "escape-time: {}x{} pixels, {:?}, {} iterations, horizon {}",
        request.grid.columns(),
        request.grid.rows(),
        rule,
        max_iterations,
        horizon
    );

    if !request.smooth {
        let mut counts = ScalarField::new(request.grid);
        fill_rows(&mut counts, config, cancel, |pixel| {
            escape_time(rule, mapper.pixel_to_point(&pixel), max_iterations, horizon).0
        })?;
        return Ok(EscapeField {
            counts,
            smooth: None,
        });
    }

    let mut both: ScalarField<(u32, f64)> = ScalarField::new(request.grid);
    fill_rows(&mut both, config, cancel, |pixel| {
        let (n, z) = escape_time(rule, mapper.pixel_to_point(&pixel), max_iterations, horizon);
        (n, smooth_count(n, z, rule.power(), max_iterations))
    })?;
    let (counts, smooth): (Vec<u32>, Vec<f64>) = both.into_values().into_iter().unzip();
    Ok(EscapeField {
        counts: ScalarField::from_values(request.grid, counts)
            .ok_or_else(|| RenderError::invalid("grid", "count field lost its shape"))?,
        smooth: ScalarField::from_values(request.grid, smooth),
    })
}

/// Renders the request to a finished raster.
pub fn render(request: &EscapeTimeRequest, config: &RenderConfig) -> Result<Raster> {
    render_with_cancel(request, config, &CancelToken::new())
}

/// As `render`, stopping early with `Cancelled` if `cancel` fires.
pub fn render_with_cancel(
    request: &EscapeTimeRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<Raster> {
    let started = Instant::now();
    let field = note_cancelled("escape-time", compute(request, config, cancel))?;
    let values = match field.smooth {
        Some(smooth) => smooth,
        None => {
            let floats = field.counts.values().iter().map(|&n| f64::from(n)).collect();
            ScalarField::from_values(request.grid, floats)
                .ok_or_else(|| RenderError::invalid("grid", "count field lost its shape"))?
        }
    };
    let colors = colors::scalar_colors(&values, None, request.gamma, &request.colormap)?;
    let raster = Raster::from_colors(request.grid, colors)?;
    info!(
        "escape-time: rendered {}x{} in {:?}",
        raster.width(),
        raster.height(),
        started.elapsed()
    );
    Ok(raster)
}
