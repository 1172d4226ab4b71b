// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Buddhabrot and Nebulabrot renderer
//!
//! The Buddhabrot is a variant of the Mandelbrot set that plots where
//! orbits *go* rather than how fast they leave.  Seeds `c` are drawn at
//! random; each seed's orbit of zero is followed until it escapes, and
//! every point the orbit visited on the way out bumps the pixel under
//! it by one.  Seeds whose orbits never escape are thrown away.
//!
//! The Nebulabrot runs the same experiment three times with three
//! iteration caps, short, medium and long, and keeps one histogram
//! per cap.  Short caps only admit seeds that leave quickly, long caps
//! admit the slow, intricate ones too.  The three histograms become
//! the red, green and blue channels of the image.
//!
//! Each worker keeps private histograms and the totals are summed once
//! every worker is done, so no counter is ever shared while hot.

use crate::colors;
use crate::error::{RenderError, Result};
use crate::field::ScalarField;
use crate::planes::{Grid, PlaneMapper, Region};
use crate::pool::{next_unit, note_cancelled, CancelToken, RenderConfig};
use crate::raster::{Raster, CHANNELS};
use crate::update::UpdateRule;
use crossbeam::thread::ScopedJoinHandle;
use log::{debug, info};
use num::Complex;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default (short, medium, long) iteration caps.
pub const DEFAULT_TIERS: [u32; 3] = [100, 1000, 10_000];
/// Default escape radius.  Large, so slow orbits get to wander.
pub const DEFAULT_HORIZON: f64 = 1.0e6;
/// Default gamma, applied to each channel.
pub const DEFAULT_GAMMA: f64 = 0.4;
/// Seeds drawn from one random stream.  Each batch has its own stream
/// derived from the request seed and the batch number, so the seeds a
/// render draws do not depend on how many workers drew them.
pub const BATCH_SIZE: u64 = 4096;

const TIERS: usize = 3;
const HISTOGRAM_BYTES_PER_PIXEL: u64 = 4 * TIERS as u64;
// The colors ([f64; 3]) and the raster.
const OUTPUT_BYTES_PER_PIXEL: u64 = 24 + CHANNELS as u64;

/// Everything needed to render one Nebulabrot.
#[derive(Clone, Debug)]
pub struct NebulaRequest {
    /// The window onto the complex plane that gets plotted.
    pub region: Region,
    /// Where seeds are drawn from.  `None` draws from `region`.  Seeds
    /// outside the plotted window still count, since it is their
    /// orbits, not the seeds, that land on the image.
    pub sample_region: Option<Region>,
    /// The output resolution.
    pub grid: Grid,
    /// How many seeds to draw.
    pub seeds: u64,
    /// The point map.
    pub rule: UpdateRule,
    /// The escape radius.
    pub horizon: f64,
    /// The (red, green, blue) iteration caps.
    pub tiers: [u32; 3],
    /// The random seed.  `None` picks one at random.
    pub seed: Option<u64>,
    /// Gamma applied to each normalized channel.
    pub gamma: f64,
}

impl NebulaRequest {
    /// A request with the default caps, horizon and gamma.
    pub fn new(region: Region, grid: Grid, seeds: u64) -> Self {
        NebulaRequest {
            region,
            sample_region: None,
            grid,
            seeds,
            rule: UpdateRule::default(),
            horizon: DEFAULT_HORIZON,
            tiers: DEFAULT_TIERS,
            seed: None,
            gamma: DEFAULT_GAMMA,
        }
    }

    /// Checks every field the accumulation needs.  A seed count of
    /// zero is accepted here and yields empty histograms; `render`
    /// rejects it.
    pub fn validate(&self) -> Result<()> {
        self.rule.validate()?;
        if !(self.horizon > 0.0) || !self.horizon.is_finite() {
            return Err(RenderError::invalid(
                "horizon",
                format!("must be a positive, finite radius, got {}", self.horizon),
            ));
        }
        if let Some(cap) = self.tiers.iter().find(|&&cap| cap == 0) {
            return Err(RenderError::invalid(
                "tiers",
                format!("every iteration cap must be positive, got {}", cap),
            ));
        }
        colors::check_gamma("gamma", self.gamma)
    }

    fn bytes_per_pixel(&self, threads: usize) -> u64 {
        // One private set per worker plus the merged set.
        HISTOGRAM_BYTES_PER_PIXEL * (threads as u64 + 1) + OUTPUT_BYTES_PER_PIXEL
    }
}

/// The three accumulated histograms.
#[derive(Clone, Debug, PartialEq)]
pub struct Histograms {
    /// Visit counts, one field per iteration cap, in request order.
    pub tiers: [ScalarField<u32>; 3],
    /// How many seeds escaped within each cap.
    pub escaped: [u64; 3],
}

impl Histograms {
    fn new(grid: Grid) -> Self {
        Histograms {
            tiers: [
                ScalarField::new(grid),
                ScalarField::new(grid),
                ScalarField::new(grid),
            ],
            escaped: [0; 3],
        }
    }

    /// Adds another set of counts into this one.  Addition saturates
    /// at `u32::MAX` per cell.
    fn merge(&mut self, other: &Histograms) {
        for (mine, theirs) in self.tiers.iter_mut().zip(other.tiers.iter()) {
            for (a, &b) in mine.values_mut().iter_mut().zip(theirs.values()) {
                *a = a.saturating_add(b);
            }
        }
        for (a, &b) in self.escaped.iter_mut().zip(other.escaped.iter()) {
            *a += b;
        }
    }

    /// True when nothing was ever plotted.
    pub fn is_empty(&self) -> bool {
        self.tiers
            .iter()
            .all(|tier| tier.values().iter().all(|&n| n == 0))
    }
}

/// Mixes the request seed with a batch number.
fn batch_rng(seed: u64, batch: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ batch.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// The per-worker state: private histograms and a reusable buffer for
/// the offsets of the orbit currently being traced.
struct Tracer<'a> {
    mapper: &'a PlaneMapper,
    rule: UpdateRule,
    limit: f64,
    tiers: [u32; 3],
    longest: u32,
    orbit: Vec<usize>,
    counts: Histograms,
}

impl<'a> Tracer<'a> {
    fn new(request: &NebulaRequest, mapper: &'a PlaneMapper) -> Self {
        let longest = request.tiers.iter().cloned().max().unwrap_or(0);
        Tracer {
            mapper,
            rule: request.rule,
            limit: request.horizon * request.horizon,
            tiers: request.tiers,
            longest,
            orbit: Vec::new(),
            counts: Histograms::new(request.grid),
        }
    }

    /// Follows the orbit of zero for `c` as far as the longest cap.  If
    /// it escapes, the visited pixels are plotted into every tier whose
    /// cap the escape came within.  Only the in-grid iterates before the
    /// escaping one are kept.
    fn trace(&mut self, c: Complex<f64>) {
        if self.rule.known_interior(c) {
            return;
        }
        self.orbit.clear();
        let mut z = Complex::new(0.0, 0.0);
        for step in 0..self.longest {
            z = self.rule.apply(z, c);
            if !(z.norm_sqr() <= self.limit) {
                self.plot(step);
                return;
            }
            if let Some(offset) = self.mapper.point_to_offset(&z) {
                self.orbit.push(offset);
            }
        }
    }

    /// The iterate at index `step` escaped, which takes `step + 1`
    /// iterations.
    fn plot(&mut self, step: u32) {
        for k in 0..TIERS {
            if step >= self.tiers[k] {
                continue;
            }
            self.counts.escaped[k] += 1;
            let cells = self.counts.tiers[k].values_mut();
            for &offset in &self.orbit {
                cells[offset] = cells[offset].saturating_add(1);
            }
        }
    }
}

/// Draws the request's seeds and accumulates their orbits.
pub fn compute(
    request: &NebulaRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<Histograms> {
    request.validate()?;
    config.validate()?;
    request
        .grid
        .ensure_within(request.bytes_per_pixel(config.threads), config.memory_ceiling)?;

    let mapper = PlaneMapper::new(request.grid, request.region);
    let domain = request.sample_region.unwrap_or(request.region);
    let (x_lo, x_hi) = domain.x_bound();
    let (y_lo, y_hi) = domain.y_bound();
    let (xs, ys) = (Uniform::new(x_lo, x_hi), Uniform::new(y_lo, y_hi));
    let (xs, ys) = (&xs, &ys);
    let seed = request.seed.unwrap_or_else(rand::random);
    let batches = request.seeds / BATCH_SIZE + u64::from(request.seeds % BATCH_SIZE != 0);
    debug!(
        "nebula: {} seeds in {} batches over {} workers, tiers {:?}, random seed {}",
        request.seeds, batches, config.threads, request.tiers, seed
    );

    let queue = Arc::new(Mutex::new(0..batches));
    let mapper = &mapper;
    let outcome = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Result<Histograms>>> = (0..config.threads)
            .map(|_| {
                let queue = queue.clone();
                spawner.spawn(move |_| -> Result<Histograms> {
                    let mut tracer = Tracer::new(request, mapper);
                    while let Some(batch) = next_unit(&*queue) {
                        let mut rng = batch_rng(seed, batch);
                        let drawn = BATCH_SIZE.min(request.seeds - batch * BATCH_SIZE);
                        for _ in 0..drawn {
                            cancel.check()?;
                            let c = Complex::new(xs.sample(&mut rng), ys.sample(&mut rng));
                            tracer.trace(c);
                        }
                    }
                    Ok(tracer.counts)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(RenderError::WorkerPanicked)))
            .collect::<Vec<Result<Histograms>>>()
    });

    let partials = match outcome {
        Ok(partials) => partials,
        Err(_) => return Err(RenderError::WorkerPanicked),
    };
    let mut totals = Histograms::new(request.grid);
    for partial in partials {
        totals.merge(&partial?);
    }
    debug!("nebula: escaped seeds per tier {:?}", totals.escaped);
    Ok(totals)
}

/// Renders the request to a finished raster.
pub fn render(request: &NebulaRequest, config: &RenderConfig) -> Result<Raster> {
    render_with_cancel(request, config, &CancelToken::new())
}

/// As `render`, stopping early with `Cancelled` if `cancel` fires.
pub fn render_with_cancel(
    request: &NebulaRequest,
    config: &RenderConfig,
    cancel: &CancelToken,
) -> Result<Raster> {
    if request.seeds == 0 {
        return Err(RenderError::invalid("seed-count", "must be positive"));
    }
    let started = Instant::now();
    let histograms = note_cancelled("nebula", compute(request, config, cancel))?;
    let [red, green, blue] = &histograms.tiers;
    let colors = colors::channel_colors([red, green, blue], request.gamma)?;
    let raster = Raster::from_colors(request.grid, colors)?;
    info!(
        "nebula: rendered {}x{} from {} seeds in {:?}",
        raster.width(),
        raster.height(),
        request.seeds,
        started.elapsed()
    );
    Ok(raster)
}
