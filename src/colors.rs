// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Color synthesis.  Every generator produces numbers; this module
//! turns them into colors.  The recipe is always the same: normalize
//! to [0, 1], raise to a gamma, and look the result up in a color map.
//! What differs is how many fields there are and how they combine:
//!
//! * escape-time: one field, one map;
//! * Lyapunov: one signed field, split by sign over two maps, each
//!   side with its own gamma;
//! * nebula: three histograms, each normalized on its own and used
//!   directly as the red, green and blue channels.

use crate::error::{RenderError, Result};
use crate::field::{finite_range, ScalarField};

/// An RGB color with channels in [0, 1].
pub type Rgb = [f64; 3];

/// A color pinned to a position along a map.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorStop {
    /// Where along the map, in [0, 1].
    pub position: f64,
    /// The color at that position.
    pub color: Rgb,
}

impl ColorStop {
    /// Shorthand constructor.
    pub fn new(position: f64, color: Rgb) -> Self {
        ColorStop { position, color }
    }
}

/// An ordered run of color stops, linearly interpolated between.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMap {
    stops: Vec<ColorStop>,
}

impl ColorMap {
    /// Builds a map.  Positions must lie in [0, 1] and never decrease;
    /// two stops may share a position, which makes a hard edge.
    pub fn new(stops: Vec<ColorStop>) -> Result<ColorMap> {
        if stops.is_empty() {
            return Err(RenderError::invalid("colormap", "needs at least one stop"));
        }
        let mut last = 0.0;
        for stop in &stops {
            if !(stop.position >= 0.0 && stop.position <= 1.0) {
                return Err(RenderError::invalid(
                    "colormap",
                    format!("stop position {} is outside [0, 1]", stop.position),
                ));
            }
            if stop.position < last {
                return Err(RenderError::invalid(
                    "colormap",
                    "stop positions must not decrease",
                ));
            }
            last = stop.position;
        }
        Ok(ColorMap { stops })
    }

    /// A two-stop ramp.
    pub fn linear(from: Rgb, to: Rgb) -> ColorMap {
        ColorMap {
            stops: vec![ColorStop::new(0.0, from), ColorStop::new(1.0, to)],
        }
    }

    /// Black to white.
    pub fn gray() -> ColorMap {
        ColorMap::linear([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    /// Black through slate blue to white, matching matplotlib's "bone".
    pub fn bone() -> ColorMap {
        ColorMap {
            stops: vec![
                ColorStop::new(0.0, [0.0, 0.0, 0.0]),
                ColorStop::new(0.365_079, [0.319_444, 0.319_444, 0.444_444]),
                ColorStop::new(0.746_032, [0.652_778, 0.777_778, 0.777_778]),
                ColorStop::new(1.0, [1.0, 1.0, 1.0]),
            ],
        }
    }

    /// Looks a map up by name: `gray`, `bone`, or either with an `_r`
    /// suffix for the reversed map.
    pub fn named(name: &str) -> Result<ColorMap> {
        let (base, reversed) = if name.ends_with("_r") {
            (&name[..name.len() - 2], true)
        } else {
            (name, false)
        };
        let map = match base {
            "gray" | "gist_gray" => ColorMap::gray(),
            "bone" => ColorMap::bone(),
            _ => {
                return Err(RenderError::invalid(
                    "colormap",
                    format!("unknown color map `{}`", name),
                ))
            }
        };
        Ok(if reversed { map.reversed() } else { map })
    }

    /// The stops, in order.
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// The same palette run backwards.
    pub fn reversed(&self) -> ColorMap {
        ColorMap {
            stops: self
                .stops
                .iter()
                .rev()
                .map(|stop| ColorStop::new(1.0 - stop.position, stop.color))
                .collect(),
        }
    }

    /// Repeats the palette `copies` times across [0, 1].  The palette
    /// itself is unchanged; each copy simply covers 1/copies of the
    /// range, so small differences in value turn into large
    /// differences in color.
    pub fn stacked(&self, copies: usize) -> Result<ColorMap> {
        if copies == 0 {
            return Err(RenderError::invalid("stack", "must be at least 1"));
        }
        let n = copies as f64;
        let stops = (0..copies)
            .flat_map(|k| {
                self.stops
                    .iter()
                    .map(move |stop| ColorStop::new((k as f64 + stop.position) / n, stop.color))
            })
            .collect();
        Ok(ColorMap { stops })
    }

    /// The color at `t`.  Values outside [0, 1] clamp to the ends, and
    /// NaN reads as 0.
    pub fn sample(&self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.max(0.0).min(1.0) };
        let upper = self.stops.partition_point(|stop| stop.position < t);
        if upper == 0 {
            return self.stops[0].color;
        }
        if upper == self.stops.len() {
            return self.stops[upper - 1].color;
        }
        let (a, b) = (&self.stops[upper - 1], &self.stops[upper]);
        let span = b.position - a.position;
        if span <= 0.0 {
            return b.color;
        }
        let f = (t - a.position) / span;
        [
            a.color[0] + (b.color[0] - a.color[0]) * f,
            a.color[1] + (b.color[1] - a.color[1]) * f,
            a.color[2] + (b.color[2] - a.color[2]) * f,
        ]
    }
}

/// Rejects gammas that are not positive and finite.
pub fn check_gamma(field: &'static str, gamma: f64) -> Result<()> {
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(RenderError::invalid(
            field,
            format!("must be a positive, finite number, got {}", gamma),
        ));
    }
    Ok(())
}

/// Maps `value` from [lo, hi] onto [0, 1].  A degenerate range maps
/// everything to 0.
#[inline]
pub fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if !(hi > lo) {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).max(0.0).min(1.0)
}

/// Colors a single field.  `range` pins the normalization bounds;
/// `None` uses the field's own finite minimum and maximum.
pub fn scalar_colors(
    field: &ScalarField<f64>,
    range: Option<(f64, f64)>,
    gamma: f64,
    map: &ColorMap,
) -> Result<Vec<Rgb>> {
    check_gamma("gamma", gamma)?;
    let (lo, hi) = match range {
        Some(range) => range,
        None => field.finite_range().unwrap_or((0.0, 0.0)),
    };
    Ok(field
        .values()
        .iter()
        .map(|&v| map.sample(normalize(v, lo, hi).powf(gamma)))
        .collect())
}

/// Colors a signed Lyapunov field.  Exponents at or below zero are
/// scaled by the most negative exponent and drawn from `negative`;
/// positive exponents are scaled by the largest finite exponent and
/// drawn from `positive`.  An infinite exponent sits at the top of the
/// positive map.  `gammas` is (negative, positive).
pub fn lyapunov_colors(
    field: &ScalarField<f64>,
    negative: &ColorMap,
    positive: &ColorMap,
    gammas: (f64, f64),
) -> Result<Vec<Rgb>> {
    check_gamma("negative gamma", gammas.0)?;
    check_gamma("positive gamma", gammas.1)?;
    let values = field.values();
    let lowest = finite_range(values.iter().cloned().filter(|&v| v < 0.0)).map(|r| r.0);
    let highest = finite_range(values.iter().cloned().filter(|&v| v > 0.0)).map(|r| r.1);

    Ok(values
        .iter()
        .map(|&v| {
            if v > 0.0 {
                let t = match highest {
                    Some(hi) if v.is_finite() => (v / hi).min(1.0),
                    _ => 1.0,
                };
                positive.sample(t.powf(gammas.1))
            } else {
                let t = match lowest {
                    Some(lo) if v.is_finite() => (v / lo).min(1.0),
                    _ => 0.0,
                };
                negative.sample(t.powf(gammas.0))
            }
        })
        .collect())
}

/// Composes three count fields into one image, one field per channel
/// in red, green, blue order.  Each channel is normalized by its own
/// maximum, so an empty channel stays black.
pub fn channel_colors(channels: [&ScalarField<u32>; 3], gamma: f64) -> Result<Vec<Rgb>> {
    check_gamma("gamma", gamma)?;
    let len = channels[0].values().len();
    if channels.iter().any(|c| c.values().len() != len) {
        return Err(RenderError::invalid(
            "channels",
            "all three channels must share a grid",
        ));
    }
    let peaks: Vec<f64> = channels
        .iter()
        .map(|c| f64::from(c.values().iter().cloned().max().unwrap_or(0)))
        .collect();

    Ok((0..len)
        .map(|i| {
            let mut rgb = [0.0; 3];
            for (k, channel) in channels.iter().enumerate() {
                let v = f64::from(channel.values()[i]);
                rgb[k] = normalize(v, 0.0, peaks[k]).powf(gamma);
            }
            rgb
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::Grid;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn map_rejects_bad_positions() {
        assert!(ColorMap::new(vec![]).is_err());
        assert!(ColorMap::new(vec![ColorStop::new(1.5, [0.0; 3])]).is_err());
        assert!(ColorMap::new(vec![
            ColorStop::new(0.6, [0.0; 3]),
            ColorStop::new(0.4, [1.0; 3]),
        ])
        .is_err());
        assert!(ColorMap::new(vec![
            ColorStop::new(0.0, [0.0; 3]),
            ColorStop::new(0.5, [1.0; 3]),
            ColorStop::new(0.5, [0.0; 3]),
        ])
        .is_ok());
    }

    #[test]
    fn sample_interpolates_between_stops() {
        let map = ColorMap::linear([0.0, 0.0, 0.0], [1.0, 0.5, 0.0]);
        let c = map.sample(0.25);
        assert!(close(c[0], 0.25));
        assert!(close(c[1], 0.125));
        assert!(close(c[2], 0.0));
    }

    #[test]
    fn sample_clamps() {
        let map = ColorMap::gray();
        assert_eq!(map.sample(-3.0), [0.0; 3]);
        assert_eq!(map.sample(3.0), [1.0; 3]);
        assert_eq!(map.sample(std::f64::NAN), [0.0; 3]);
    }

    #[test]
    fn bone_ends_black_and_white() {
        let bone = ColorMap::bone();
        assert_eq!(bone.sample(0.0), [0.0; 3]);
        assert_eq!(bone.sample(1.0), [1.0; 3]);
        let mid = bone.sample(0.5);
        assert!(mid[2] > mid[0], "bone is blue in the middle");
    }

    #[test]
    fn reversed_runs_backwards() {
        let bone_r = ColorMap::bone().reversed();
        assert_eq!(bone_r.sample(0.0), [1.0; 3]);
        assert_eq!(bone_r.sample(1.0), [0.0; 3]);
        assert_eq!(ColorMap::gray().reversed().reversed(), ColorMap::gray());
    }

    #[test]
    fn named_maps() {
        assert_eq!(ColorMap::named("gist_gray").unwrap(), ColorMap::gray());
        assert_eq!(ColorMap::named("bone_r").unwrap(), ColorMap::bone().reversed());
        assert!(ColorMap::named("viridis").is_err());
    }

    #[test]
    fn stacking_once_is_identity() {
        let bone = ColorMap::bone();
        assert_eq!(bone.stacked(1).unwrap(), bone);
    }

    #[test]
    fn stacking_repeats_the_palette() {
        let stacked = ColorMap::gray().stacked(4).unwrap();
        assert_eq!(stacked.stops().len(), 8);
        assert!(close(stacked.sample(0.125)[0], 0.5));
        assert!(close(stacked.sample(0.375)[0], 0.5));
        assert!(close(stacked.sample(0.9375)[0], 0.75));
        assert!(ColorMap::gray().stacked(0).is_err());
    }

    #[test]
    fn gamma_one_linear_map_reproduces_the_field() {
        let grid = Grid::from_pixels(5, 1).unwrap();
        let field = ScalarField::from_values(grid, vec![2.0, 3.0, 4.5, 5.0, 6.0]).unwrap();
        let colors = scalar_colors(&field, None, 1.0, &ColorMap::gray()).unwrap();
        let expected = [0.0, 0.25, 0.625, 0.75, 1.0];
        for (color, want) in colors.iter().zip(expected.iter()) {
            assert!(close(color[0], *want));
        }
    }

    #[test]
    fn gamma_reshapes_contrast() {
        let grid = Grid::from_pixels(1, 1).unwrap();
        let field = ScalarField::from_values(grid, vec![0.25]).unwrap();
        let colors = scalar_colors(&field, Some((0.0, 1.0)), 0.5, &ColorMap::gray()).unwrap();
        assert!(close(colors[0][0], 0.5));
        assert!(scalar_colors(&field, None, 0.0, &ColorMap::gray()).is_err());
    }

    #[test]
    fn constant_field_normalizes_to_zero() {
        let grid = Grid::from_pixels(2, 1).unwrap();
        let field = ScalarField::from_values(grid, vec![7.0, 7.0]).unwrap();
        let colors = scalar_colors(&field, None, 1.0, &ColorMap::gray()).unwrap();
        assert_eq!(colors, vec![[0.0; 3], [0.0; 3]]);
    }

    #[test]
    fn lyapunov_splits_by_sign() {
        let grid = Grid::from_pixels(4, 1).unwrap();
        let field =
            ScalarField::from_values(grid, vec![-2.0, -1.0, 0.5, std::f64::INFINITY]).unwrap();
        let negative = ColorMap::linear([0.0; 3], [1.0, 0.0, 0.0]);
        let positive = ColorMap::linear([0.0; 3], [0.0, 0.0, 1.0]);
        let colors = lyapunov_colors(&field, &negative, &positive, (1.0, 1.0)).unwrap();
        assert!(close(colors[0][0], 1.0));
        assert!(close(colors[1][0], 0.5));
        assert!(close(colors[2][2], 1.0));
        assert!(close(colors[3][2], 1.0));
        assert_eq!(colors[2][0], 0.0);
    }

    #[test]
    fn lyapunov_gammas_apply_per_side() {
        let grid = Grid::from_pixels(3, 1).unwrap();
        let field = ScalarField::from_values(grid, vec![-2.0, -1.0, 1.0]).unwrap();
        let map = ColorMap::gray();
        let colors = lyapunov_colors(&field, &map, &map, (2.0, 1.0)).unwrap();
        assert!(close(colors[1][0], 0.25));
        assert!(close(colors[2][0], 1.0));
    }

    #[test]
    fn channels_normalize_independently() {
        let grid = Grid::from_pixels(2, 1).unwrap();
        let red = ScalarField::from_values(grid, vec![10, 5]).unwrap();
        let green = ScalarField::from_values(grid, vec![1, 4]).unwrap();
        let blue = ScalarField::from_values(grid, vec![0, 0]).unwrap();
        let colors = channel_colors([&red, &green, &blue], 1.0).unwrap();
        assert!(close(colors[0][0], 1.0));
        assert!(close(colors[1][0], 0.5));
        assert!(close(colors[0][1], 0.25));
        assert!(close(colors[1][1], 1.0));
        assert_eq!(colors[0][2], 0.0);
        assert_eq!(colors[1][2], 0.0);
    }
}
