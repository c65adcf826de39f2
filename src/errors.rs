use thiserror::Error;

/// Errors raised by the profile and consensus engine.
#[derive(Debug, Error)]
pub enum MorphError {
    /// An outline lacks a profile, landmark or segment that an operation needs.
    #[error("missing data: {0}")]
    MissingData(String),

    /// A fractional profile position outside [0, 1).
    #[error("position {0} is outside [0, 1)")]
    InvalidPosition(f64),

    /// A profile cannot be built from zero values.
    #[error("profile length must be greater than zero")]
    EmptyProfile,

    /// No valid members remain after filtering a population.
    #[error("population has no valid members")]
    EmptyPopulation,

    /// The brute-force offset search produced no usable score.
    #[error("no best-fit offset found: {0}")]
    AlignmentFailure(String),

    /// A segment list does not form a contiguous cover of the profile.
    #[error("invalid segment layout: {0}")]
    SegmentLayout(String),

    /// The cooperative cancellation flag was set at an iteration boundary.
    #[error("operation cancelled")]
    Cancelled,
}
