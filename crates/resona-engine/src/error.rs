use thiserror::Error;

/// Errors surfaced by control operations.
///
/// The control surface is deliberately narrow: operations addressing unknown
/// nodes or parameter names are silent no-ops, so only genuinely malformed
/// requests produce an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid engine config: {0}")]
    InvalidConfig(&'static str),
    #[error("fft size must be a power of two in [32, 32768], got {0}")]
    InvalidFftSize(usize),
    #[error("waveshaper curve must not be empty")]
    EmptyCurve,
}
