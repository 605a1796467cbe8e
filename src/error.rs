//! Error taxonomy shared by the grid, interpolation and solver modules.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid enum argument, inconsistent shapes or a missing argument combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Interpolation target outside the source axis, even after periodic wrap.
    #[error("value {value} is outside the source axis range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Iterative solver failed to meet its convergence criteria.
    #[error("no convergence after {iterations} iterations (rms error {rms_error:e})")]
    Convergence { iterations: usize, rms_error: f64 },

    /// Input data contradicts what the caller claimed about it.
    #[error("data consistency error: {0}")]
    DataConsistency(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("grid cache error: {0}")]
    Cache(#[from] bincode::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Error::DataConsistency(msg.into())
    }
}
