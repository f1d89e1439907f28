// ABOUTME: Fatal/warning error taxonomy for the hydrology core, with DHSVM-compatible exit codes
// ABOUTME: All fatal errors carry enough context to report the offending cell and step

use thiserror::Error;

/// Unified error type for the hydrology core.
///
/// Mirrors the fatal-error taxonomy of the original model: configuration, I/O,
/// numeric, and geometry failures. Each fatal variant maps to a stable exit
/// code matching the original model's `ReportError` codes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    // --- Configuration ---
    #[error("configuration: missing required field `{0}`")]
    MissingField(String),
    #[error("configuration: section `{0}` not found")]
    SectionNotFound(String),
    #[error("configuration: invalid value for `{field}`: {value}")]
    InvalidEnumValue { field: String, value: String },
    #[error("configuration: `{field}` out of range: {value}")]
    OutOfRange { field: String, value: String },

    // --- I/O ---
    #[error("io: cannot open `{0}`")]
    CannotOpen(String),
    #[error("io: unexpected end of file reading `{0}`")]
    UnexpectedEof(String),
    #[error("io: format mismatch in `{0}`")]
    FormatMismatch(String),

    // --- Numeric ---
    #[error("root finder: interval does not bracket a root after bracket expansion")]
    RootBracketing,
    #[error("root finder: iteration budget exhausted")]
    RootMaxIter,
    #[error("mass balance residual {residual:.6e} exceeds threshold {threshold:.6e} at step {step}")]
    MassBalance {
        residual: f64,
        threshold: f64,
        step: u64,
    },
    #[error("soil layer remains supersaturated after redistribution at cell ({y},{x})")]
    Supersaturated { y: usize, x: usize },
    #[error("negative storage encountered: {0}")]
    NegativeStorage(String),
    #[error("non-finite value encountered in `{0}`")]
    NonFinite(String),

    // --- Geometry ---
    #[error("flow-direction discontinuity at cell ({y},{x})")]
    FlowDiscontinuity { y: usize, x: usize },
    #[error("grid is not square: {rows}x{cols}")]
    GridNotSquare { rows: usize, cols: usize },

    // --- Time driver ---
    #[error("invalid time step: {0}")]
    InvalidTimeStep(String),

    // --- Forcing ---
    #[error("forcing record timestamp mismatch at station `{station}`: expected {expected}, got {got}")]
    MetDateMismatch {
        station: String,
        expected: String,
        got: String,
    },
}

impl CoreError {
    /// Exit code matching the original model's `ReportError` convention.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::MissingField(_)
            | CoreError::SectionNotFound(_)
            | CoreError::InvalidEnumValue { .. }
            | CoreError::OutOfRange { .. } => 10,
            CoreError::CannotOpen(_)
            | CoreError::UnexpectedEof(_)
            | CoreError::FormatMismatch(_) => 57,
            CoreError::RootMaxIter => 33,
            CoreError::RootBracketing => 34,
            CoreError::Supersaturated { .. } => 35,
            CoreError::MassBalance { .. } => 36,
            CoreError::NegativeStorage(_) => 37,
            CoreError::NonFinite(_) => 38,
            CoreError::FlowDiscontinuity { .. } => 40,
            CoreError::GridNotSquare { .. } => 41,
            CoreError::InvalidTimeStep(_) => 42,
            CoreError::MetDateMismatch { .. } => 43,
        }
    }
}

/// Convenience alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_original_model_error_constants() {
        assert_eq!(CoreError::RootMaxIter.exit_code(), 33);
        assert_eq!(CoreError::RootBracketing.exit_code(), 34);
        assert_eq!(CoreError::Supersaturated { y: 0, x: 0 }.exit_code(), 35);
        assert_eq!(CoreError::CannotOpen("x".into()).exit_code(), 57);
    }

    #[test]
    fn display_includes_cell_context() {
        let err = CoreError::Supersaturated { y: 3, x: 7 };
        assert!(err.to_string().contains("(3,7)"));
    }
}
