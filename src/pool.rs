// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The worker pool every generator runs on.  A fixed number of scoped
//! threads pull units of work (rows of the output, or batches of
//! seeds) from a shared queue until it runs dry; nothing a worker
//! writes is visible to another worker before the final join.

use crate::error::{RenderError, Result};
use crate::field::ScalarField;
use crate::planes::Pixel;
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One gibibyte.
pub const DEFAULT_MEMORY_CEILING: u64 = 1 << 30;

/// Per-call execution settings.  These do not change what gets
/// rendered, only how it is scheduled and how large it may be.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Worker threads to run.
    pub threads: usize,
    /// Largest working allocation, in bytes, a render may make.
    pub memory_ceiling: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            threads: num_cpus::get(),
            memory_ceiling: DEFAULT_MEMORY_CEILING,
        }
    }
}

impl RenderConfig {
    /// The default configuration with `threads` workers.
    pub fn with_threads(threads: usize) -> Self {
        RenderConfig {
            threads,
            ..RenderConfig::default()
        }
    }

    /// Rejects a pool with no workers.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RenderError::invalid("threads", "must be at least 1"));
        }
        Ok(())
    }
}

/// A cooperative cancellation handle.  Clones share the same flag, so
/// a caller can keep one and hand the other to the render.  Workers
/// check it between pixels and between seeds.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires when `cancel` is called.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// A token that also fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Asks every render holding this token to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once `cancel` was called or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.flag.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// `Err(Cancelled)` if the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(())
    }
}

/// Passes a result through, logging a warning if the render it came
/// from was cancelled.
pub(crate) fn note_cancelled<T>(generator: &str, result: Result<T>) -> Result<T> {
    if let Err(RenderError::Cancelled) = result {
        warn!("{}: render cancelled before completion", generator);
    }
    result
}

/// Pulls the next unit off a shared queue.  A poisoned lock means a
/// worker panicked; the iterator itself is still sound, and the panic
/// surfaces at join time.
pub(crate) fn next_unit<I: Iterator>(queue: &Mutex<I>) -> Option<I::Item> {
    match queue.lock() {
        Ok(mut units) => units.next(),
        Err(poisoned) => poisoned.into_inner().next(),
    }
}

/// Fills every cell of `field` with `compute(pixel)`.  Each row is a
/// unit of work; a worker takes a row, owns that slice of the field
/// exclusively while it fills it, and goes back for another.
pub fn fill_rows<T, F>(
    field: &mut ScalarField<T>,
    config: &RenderConfig,
    cancel: &CancelToken,
    compute: F,
) -> Result<()>
where
    T: Copy + Send,
    F: Fn(Pixel) -> T + Sync,
{
    config.validate()?;
    let columns = field.grid().columns();
    let rows = Arc::new(Mutex::new(field.values_mut().chunks_mut(columns).enumerate()));
    let compute = &compute;

    let outcome = crossbeam::scope(|spawner| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                let rows = rows.clone();
                spawner.spawn(move |_| -> Result<()> {
                    while let Some((row, cells)) = next_unit(&*rows) {
                        for (column, cell) in cells.iter_mut().enumerate() {
                            cancel.check()?;
                            *cell = compute(Pixel(column, row));
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(RenderError::WorkerPanicked)))
            .collect::<Vec<Result<()>>>()
    });

    match outcome {
        Ok(results) => results.into_iter().collect(),
        Err(_) => Err(RenderError::WorkerPanicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::Grid;

    #[test_log::test]
    fn cancelled_results_pass_through() {
        let cancelled: Result<u32> = Err(RenderError::Cancelled);
        assert_eq!(note_cancelled("test", cancelled), Err(RenderError::Cancelled));
        assert_eq!(note_cancelled("test", Ok(7)), Ok(7));
        let invalid: Result<u32> = Err(RenderError::invalid("horizon", "bad"));
        assert_eq!(
            note_cancelled("test", invalid),
            Err(RenderError::invalid("horizon", "bad"))
        );
    }

    #[test]
    fn fill_rows_visits_every_pixel_once() {
        let grid = Grid::from_pixels(17, 9).unwrap();
        let mut field: ScalarField<usize> = ScalarField::new(grid);
        fill_rows(
            &mut field,
            &RenderConfig::with_threads(4),
            &CancelToken::new(),
            |Pixel(column, row)| row * 100 + column,
        )
        .unwrap();
        assert_eq!(field.get(Pixel(0, 0)), 0);
        assert_eq!(field.get(Pixel(16, 8)), 816);
        assert_eq!(field.get(Pixel(3, 5)), 503);
    }

    #[test]
    fn results_do_not_depend_on_thread_count() {
        let grid = Grid::from_pixels(31, 13).unwrap();
        let render = |threads| {
            let mut field: ScalarField<f64> = ScalarField::new(grid);
            fill_rows(
                &mut field,
                &RenderConfig::with_threads(threads),
                &CancelToken::new(),
                |Pixel(column, row)| (column as f64).sin() * (row as f64).cos(),
            )
            .unwrap();
            field
        };
        assert_eq!(render(1), render(7));
    }

    #[test]
    fn zero_threads_is_invalid() {
        let grid = Grid::from_pixels(2, 2).unwrap();
        let mut field: ScalarField<u8> = ScalarField::new(grid);
        let result = fill_rows(
            &mut field,
            &RenderConfig::with_threads(0),
            &CancelToken::new(),
            |_| 1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn cancelled_token_stops_the_fill() {
        let grid = Grid::from_pixels(8, 8).unwrap();
        let mut field: ScalarField<u8> = ScalarField::new(grid);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = fill_rows(&mut field, &RenderConfig::with_threads(2), &cancel, |_| 1);
        assert_eq!(result, Err(RenderError::Cancelled));
    }

    #[test]
    fn expired_deadline_cancels() {
        let cancel = CancelToken::with_timeout(Duration::from_millis(0));
        assert!(cancel.is_cancelled());
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn clones_share_the_flag() {
        let cancel = CancelToken::new();
        let held = cancel.clone();
        cancel.cancel();
        assert!(held.is_cancelled());
    }
}
