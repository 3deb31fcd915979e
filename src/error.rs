use thiserror::Error;

/// The crate-wide error enum. Mirrors the fatal error kinds of the core
/// (shape checks, out-of-range indices, conflicting options, calling a
/// coarsening rule on a mesh with no finer level).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("index out of range: {0}")]
    OutOfRange(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}
