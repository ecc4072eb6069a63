use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("profiler has not been initialized or was already disposed")]
    Uninitialized,
}

/// A measurement channel whose stored series cannot be read back consistently.
/// The channel is left out of the artifact; the rest of the profile is kept.
#[derive(Debug, Error, PartialEq)]
pub enum MeasurementError {
    #[error("measurement series has {values} values but {timestamps} timestamps")]
    LengthMismatch { values: usize, timestamps: usize },
    #[error("requested {requested} measurement points but only {stored} are stored")]
    CountExceedsStored { requested: usize, stored: usize },
}
