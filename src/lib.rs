#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fractal renderer
//!
//! Three generators share one pipeline: a pixel grid is laid over a
//! window onto a plane, a number is measured for every pixel (or, for
//! the Nebulabrot, every orbit is counted into the pixels it crosses),
//! and the numbers are turned into colors.
//!
//! * [`escape`]: the Mandelbrot family.  How many steps does the orbit
//!   of zero under `z -> z^n + c` take to leave the horizon?
//! * [`lyapunov`]: Markus-Lyapunov fractals.  Is the logistic map,
//!   forced between two parameters, stable or chaotic?
//! * [`nebula`]: the Buddhabrot, three times over.  Where do escaping
//!   orbits go?
//!
//! Each generator takes an immutable request and a [`RenderConfig`]
//! and returns either a complete [`Raster`] or a [`RenderError`].  The
//! work runs on a pool of scoped worker threads inside the call.

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate itertools;
extern crate num;
extern crate num_cpus;
extern crate rand;

pub mod colors;
pub mod error;
pub mod escape;
pub mod field;
pub mod lyapunov;
pub mod nebula;
pub mod planes;
pub mod pool;
pub mod raster;
pub mod update;

pub use crate::colors::{ColorMap, ColorStop};
pub use crate::error::{RenderError, Result};
pub use crate::escape::EscapeTimeRequest;
pub use crate::field::ScalarField;
pub use crate::lyapunov::{Forcing, LyapunovRequest};
pub use crate::nebula::{Histograms, NebulaRequest};
pub use crate::planes::{Grid, Pixel, PlaneMapper, Region};
pub use crate::pool::{CancelToken, RenderConfig};
pub use crate::raster::Raster;
pub use crate::update::UpdateRule;
