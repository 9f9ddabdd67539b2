use crate::error::CurveError;
use log::trace;

/// Tolerance for timestamps that land on a sample boundary through float jitter.
pub const STAMPS_EPSILON: f64 = 1e-6;

/// One glucose measurement as a point of the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Unix time in seconds.
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// The line through two neighbouring samples: `value = scale * t + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub scale: f64,
    pub offset: f64,
}

impl Segment {
    fn through(prev: &Sample, next: &Sample) -> Self {
        let scale = (next.value - prev.value) / (next.timestamp - prev.timestamp);
        let offset = next.value - scale * next.timestamp;
        Self { scale, offset }
    }

    pub fn value_at(&self, timestamp: f64) -> f64 {
        self.scale * timestamp + self.offset
    }
}

/// How to treat timestamps outside the sampled range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Reject them with [`CurveError::OutOfRange`].
    Strict,
    /// Follow the nearest segment's line.
    Extrapolate,
}

/// Piecewise-linear curve through a set of samples.
///
/// Samples can be added in any order. Sorting and segment coefficients are
/// computed by [`Interpolator::prepare`], which only does work when samples
/// were added since the last call.
#[derive(Debug, Clone)]
pub struct Interpolator {
    samples: Vec<Sample>,
    stamps: Vec<f64>,
    segments: Vec<Segment>,
    is_prepared: bool,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            stamps: Vec::new(),
            segments: Vec::new(),
            is_prepared: true,
        }
    }

    pub fn add_sample(&mut self, timestamp: f64, value: f64) {
        self.samples.push(Sample::new(timestamp, value));
        self.is_prepared = false;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_prepared(&self) -> bool {
        self.is_prepared
    }

    /// Sorts the samples and rebuilds the segments.
    ///
    /// Returns `false` when nothing changed since the previous preparation.
    pub fn prepare(&mut self) -> Result<bool, CurveError> {
        if self.is_prepared {
            return Ok(false);
        }

        if let Some(bad) = self
            .samples
            .iter()
            .find(|s| !s.timestamp.is_finite() || !s.value.is_finite())
        {
            return Err(CurveError::NonFiniteSample { at: bad.timestamp });
        }

        // stable: equal stamps keep insertion order, so the duplicate report is deterministic
        self.samples
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        if let Some(pair) = self
            .samples
            .windows(2)
            .find(|pair| pair[0].timestamp == pair[1].timestamp)
        {
            return Err(CurveError::DuplicateTimestamp {
                at: pair[0].timestamp,
            });
        }

        self.stamps = self.samples.iter().map(|s| s.timestamp).collect();
        self.segments = self
            .samples
            .windows(2)
            .map(|pair| Segment::through(&pair[0], &pair[1]))
            .collect();
        self.is_prepared = true;

        trace!(
            "Prepared curve: {} samples, {} segments",
            self.samples.len(),
            self.segments.len()
        );
        Ok(true)
    }

    /// Sorted samples. Only meaningful after [`Interpolator::prepare`].
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First and last sampled timestamps of a prepared curve.
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.stamps.first(), self.stamps.last()) {
            (Some(first), Some(last)) => Some((*first, *last)),
            _ => None,
        }
    }

    /// Index of the last sample at or before `timestamp` (`bisect_right - 1`),
    /// `None` when `timestamp` precedes every sample.
    pub fn locate(&self, timestamp: f64) -> Option<usize> {
        self.stamps
            .partition_point(|&stamp| stamp <= timestamp)
            .checked_sub(1)
    }

    /// Value of the curve at `timestamp`.
    ///
    /// `hint` is a segment index the caller already knows; it is checked and
    /// ignored when it does not cover `timestamp`.
    pub fn value_at(
        &mut self,
        timestamp: f64,
        hint: Option<usize>,
        lookup: Lookup,
    ) -> Result<f64, CurveError> {
        self.prepare()?;
        self.evaluate(timestamp, hint, lookup)
    }

    pub(crate) fn evaluate(
        &self,
        timestamp: f64,
        hint: Option<usize>,
        lookup: Lookup,
    ) -> Result<f64, CurveError> {
        debug_assert!(self.is_prepared);

        let (min, max) = self.range().ok_or(CurveError::Empty)?;
        if lookup == Lookup::Strict
            && (timestamp < min - STAMPS_EPSILON || timestamp > max + STAMPS_EPSILON)
        {
            return Err(CurveError::OutOfRange {
                at: timestamp,
                min,
                max,
            });
        }

        let located = match hint {
            Some(idx) if self.covers(idx, timestamp) => Some(idx),
            _ => self.locate(timestamp),
        };

        if let Some(idx) = located {
            if self.stamps[idx] == timestamp {
                return Ok(self.samples[idx].value);
            }
        }

        if self.segments.is_empty() {
            return Ok(self.samples[0].value);
        }

        let idx = located.unwrap_or(0).min(self.segments.len() - 1);
        Ok(self.segments[idx].value_at(timestamp))
    }

    fn covers(&self, idx: usize, timestamp: f64) -> bool {
        idx < self.segments.len()
            && self.stamps[idx] <= timestamp
            && timestamp < self.stamps[idx + 1]
    }
}
