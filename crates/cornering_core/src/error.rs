use thiserror::Error;

/// Rejected run configuration. Raised before any solve starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid bounds for '{field}': min {min} exceeds max {max}")]
    InvalidBounds {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Tolerance {index} must be positive and finite, got {value}")]
    InvalidTolerance { index: usize, value: f64 },

    #[error("Invalid tire '{tire}', field '{field}': {reason}")]
    InvalidTire {
        tire: String,
        field: &'static str,
        reason: String,
    },

    #[error("Failed to start optimizer thread: {0}")]
    Spawn(String),
}

impl ConfigError {
    pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidValue {
                field,
                reason: format!("must be positive, got {value}"),
            })
        }
    }

    pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidValue {
                field,
                reason: format!("must be non-negative, got {value}"),
            })
        }
    }

    pub(crate) fn finite(field: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Self::InvalidValue {
                field,
                reason: format!("must be finite, got {value}"),
            })
        }
    }
}
