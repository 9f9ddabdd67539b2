use thiserror::Error;

/// Failures of the glucose curve (interpolation and averaging).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("glucose curve has no samples")]
    Empty,

    #[error("two samples share timestamp {at}")]
    DuplicateTimestamp { at: f64 },

    #[error("sample at {at} has a non-finite timestamp or value")]
    NonFiniteSample { at: f64 },

    #[error("timestamp {at} is outside the sampled range [{min}, {max}]")]
    OutOfRange { at: f64, min: f64, max: f64 },

    #[error("averaging window [{begin}, {end}] has a non-finite bound")]
    NonFiniteWindow { begin: f64, end: f64 },

    #[error("averaging window collapses to the single moment {at}")]
    DegenerateWindow { at: f64 },

    #[error("window [{begin}, {end}] does not overlap the sampled range [{min}, {max}]")]
    OutsideSamples {
        begin: f64,
        end: f64,
        min: f64,
        max: f64,
    },
}

/// Failures while parsing a one-decimal level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("empty level")]
    Empty,

    #[error("invalid level {0:?}")]
    Invalid(String),

    #[error("level {0:?} has more than one decimal digit")]
    TooPrecise(String),

    #[error("level {0:?} is out of range")]
    Overflow(String),
}
