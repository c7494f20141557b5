//! Error type shared by the grid, the transition builder and controller I/O.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A point lies outside the grid by more than half a cell.
    #[error("coordinate {value} on axis {axis} is outside the domain [{lower}, {upper}]")]
    OutOfDomain {
        axis: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Vectors or alphabets of incompatible dimensionality were combined.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// The supplied vector field produced NaN or infinity.
    #[error("non-finite successor for state {state:?} under input {input:?}")]
    NonFiniteState { state: Vec<f64>, input: Vec<f64> },

    /// Synthesis converged, but no state is winning.
    #[error("the winning region is empty")]
    EmptyWinningRegion,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
