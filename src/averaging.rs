//! Time-weighted averaging of the glucose curve.
//!
//! The curve between two meterings is taken to be linear, so the mean over a
//! window is the trapezoid-rule integral of the knots inside it divided by the
//! window width. Window boundaries rarely fall on a metering; their values are
//! interpolated and take part in the integral and in the min/max scan.

use crate::error::CurveError;
use crate::interpolation::{Interpolator, Lookup, Sample};
use chrono::{DateTime, TimeZone, Utc};
use log::trace;

/// Access to meterings stored outside the window being averaged.
pub trait SampleContext {
    /// Latest stored metering strictly before `when`.
    fn sample_before(&self, when: DateTime<Utc>) -> Option<Sample>;

    /// Earliest stored metering strictly after `when`.
    fn sample_after(&self, when: DateTime<Utc>) -> Option<Sample>;
}

/// Whole unix seconds of a moment, the resolution meterings are compared at.
pub fn unix_seconds<Tz: TimeZone>(when: &DateTime<Tz>) -> f64 {
    when.timestamp() as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrapezoidalAverager {
    curve: Interpolator,
}

impl TrapezoidalAverager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, timestamp: f64, value: f64) {
        self.curve.add_sample(timestamp, value);
    }

    pub fn curve(&self) -> &Interpolator {
        &self.curve
    }

    pub fn prepare(&mut self) -> Result<bool, CurveError> {
        self.curve.prepare()
    }

    /// Adds the stored meterings just outside `[begin, end]` so the curve
    /// keeps its real shape up to the window edges.
    ///
    /// Returns which sides were found (`before`, `after`).
    pub fn extend_with_context<C: SampleContext + ?Sized>(
        &mut self,
        context: &C,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (bool, bool) {
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };

        let before = context.sample_before(begin);
        let after = context.sample_after(end);
        for sample in before.iter().chain(after.iter()) {
            self.add_sample(sample.timestamp, sample.value);
        }

        trace!(
            "Context around [{}, {}]: before={:?} after={:?}",
            begin,
            end,
            before,
            after
        );
        (before.is_some(), after.is_some())
    }

    /// Curve value at a sampled moment or between two samples.
    pub fn value_at(&mut self, timestamp: f64) -> Result<f64, CurveError> {
        self.curve.value_at(timestamp, None, Lookup::Strict)
    }

    /// Time-weighted mean of the curve over `[begin, end]` (either order).
    pub fn average_over(&mut self, begin: f64, end: f64) -> Result<f64, CurveError> {
        let knots = self.knots(begin, end)?;
        Ok(average_of(&knots))
    }

    /// Smallest and largest curve values over `[begin, end]`.
    pub fn extremes_over(&mut self, begin: f64, end: f64) -> Result<(f64, f64), CurveError> {
        let knots = self.knots(begin, end)?;
        Ok(extremes_of(&knots))
    }

    pub fn summarize(&mut self, begin: f64, end: f64) -> Result<WindowStats, CurveError> {
        let knots = self.knots(begin, end)?;
        let (min, max) = extremes_of(&knots);
        Ok(WindowStats {
            average: average_of(&knots),
            min,
            max,
        })
    }

    /// Boundary points plus every sample strictly inside the clipped window.
    fn knots(&mut self, begin: f64, end: f64) -> Result<Vec<(f64, f64)>, CurveError> {
        self.curve.prepare()?;

        if !begin.is_finite() || !end.is_finite() {
            return Err(CurveError::NonFiniteWindow { begin, end });
        }
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };
        let (min, max) = self.curve.range().ok_or(CurveError::Empty)?;

        let clipped_begin = begin.max(min);
        let clipped_end = end.min(max);
        if clipped_end < clipped_begin {
            return Err(CurveError::OutsideSamples {
                begin,
                end,
                min,
                max,
            });
        }
        if clipped_end == clipped_begin {
            return Err(CurveError::DegenerateWindow { at: clipped_begin });
        }

        let begin_value = self.curve.evaluate(
            clipped_begin,
            self.curve.locate(clipped_begin),
            Lookup::Strict,
        )?;
        let end_value = self.curve.evaluate(
            clipped_end,
            self.curve.locate(clipped_end),
            Lookup::Strict,
        )?;

        let samples = self.curve.samples();
        let first_inner = samples.partition_point(|s| s.timestamp <= clipped_begin);

        let mut knots = Vec::with_capacity(samples.len() - first_inner + 2);
        knots.push((clipped_begin, begin_value));
        knots.extend(
            samples[first_inner..]
                .iter()
                .take_while(|s| s.timestamp < clipped_end)
                .map(|s| (s.timestamp, s.value)),
        );
        knots.push((clipped_end, end_value));
        Ok(knots)
    }
}

fn average_of(knots: &[(f64, f64)]) -> f64 {
    let integral: f64 = knots
        .windows(2)
        .map(|pair| {
            let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
            0.5 * (t1 - t0) * (v0 + v1)
        })
        .sum();
    let width = knots[knots.len() - 1].0 - knots[0].0;
    integral / width
}

fn extremes_of(knots: &[(f64, f64)]) -> (f64, f64) {
    knots
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &(_, v)| {
            (min.min(v), max.max(v))
        })
}
