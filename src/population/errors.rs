//! Population error types
//!
//! Error codes:
//! - AERO_POPULATION_BUILDER_FAILED (ERROR)
//! - AERO_POPULATION_UPDATE_FAILED (ERROR)
//! - AERO_POPULATION_CONSTRAINT_VIOLATION (ERROR)
//! - AERO_POPULATION_SAMPLE_FAILED (ERROR)
//! - AERO_POPULATION_FLIP_FAILED (ERROR)
//! - AERO_POPULATION_FLIP_TARGET_MISSING (ERROR)
//! - AERO_POPULATION_SCAN_FAILED (ERROR)
//! - AERO_POPULATION_CANCELLED (ERROR)
//! - AERO_POPULATION_INVALID_CONFIG (ERROR)
//! - AERO_POPULATION_LOCK_POISONED (FATAL)
//!
//! Every population error is scoped to a single index. None of them is
//! propagated past the coordinator boundary; they are recorded on the
//! failing index builder instead.

use std::fmt;

use thiserror::Error;

/// Severity levels for population errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The affected index is failed, the rest of the system continues
    Error,
    /// Internal state can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable population error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationErrorCode {
    AeroPopulationBuilderFailed,
    AeroPopulationUpdateFailed,
    AeroPopulationConstraintViolation,
    AeroPopulationSampleFailed,
    AeroPopulationFlipFailed,
    AeroPopulationFlipTargetMissing,
    AeroPopulationScanFailed,
    AeroPopulationCancelled,
    AeroPopulationInvalidConfig,
    AeroPopulationLockPoisoned,
}

impl PopulationErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AeroPopulationBuilderFailed => "AERO_POPULATION_BUILDER_FAILED",
            Self::AeroPopulationUpdateFailed => "AERO_POPULATION_UPDATE_FAILED",
            Self::AeroPopulationConstraintViolation => "AERO_POPULATION_CONSTRAINT_VIOLATION",
            Self::AeroPopulationSampleFailed => "AERO_POPULATION_SAMPLE_FAILED",
            Self::AeroPopulationFlipFailed => "AERO_POPULATION_FLIP_FAILED",
            Self::AeroPopulationFlipTargetMissing => "AERO_POPULATION_FLIP_TARGET_MISSING",
            Self::AeroPopulationScanFailed => "AERO_POPULATION_SCAN_FAILED",
            Self::AeroPopulationCancelled => "AERO_POPULATION_CANCELLED",
            Self::AeroPopulationInvalidConfig => "AERO_POPULATION_INVALID_CONFIG",
            Self::AeroPopulationLockPoisoned => "AERO_POPULATION_LOCK_POISONED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            Self::AeroPopulationLockPoisoned => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for PopulationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Population error
///
/// The `Display` text is what ends up attached to a failed index builder
/// through `mark_as_failed`.
#[derive(Debug, Clone, Error)]
pub enum PopulationError {
    #[error("index builder failed: {0}")]
    BuilderFailed(String),

    #[error("update of entity {entity_id} failed: {reason}")]
    UpdateFailed { entity_id: u64, reason: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("index sampling failed: {0}")]
    SampleFailed(String),

    #[error("flip failed: {0}")]
    FlipFailed(#[source] Box<PopulationError>),

    #[error("no flip target set for index {0}")]
    FlipTargetMissing(String),

    #[error("store scan failed: {0}")]
    ScanFailed(String),

    #[error("population cancelled: {0}")]
    Cancelled(String),

    #[error("invalid population config: {0}")]
    InvalidConfig(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl PopulationError {
    /// Create a builder failure
    pub fn builder_failed(reason: impl Into<String>) -> Self {
        Self::BuilderFailed(reason.into())
    }

    /// Create an update failure for one entity
    pub fn update_failed(entity_id: u64, reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            entity_id,
            reason: reason.into(),
        }
    }

    /// Create a deferred constraint violation
    pub fn constraint_violation(reason: impl Into<String>) -> Self {
        Self::ConstraintViolation(reason.into())
    }

    /// Create a sampling failure
    pub fn sample_failed(reason: impl Into<String>) -> Self {
        Self::SampleFailed(reason.into())
    }

    /// Wrap the cause of a failed flip
    pub fn flip_failed(cause: PopulationError) -> Self {
        match cause {
            // never nest flip failures
            already @ Self::FlipFailed(_) => already,
            cause => Self::FlipFailed(Box::new(cause)),
        }
    }

    /// Create a scan failure
    pub fn scan_failed(reason: impl Into<String>) -> Self {
        Self::ScanFailed(reason.into())
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Create a config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Text attached to a failed builder via `mark_as_failed`
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns the error code
    pub fn code(&self) -> PopulationErrorCode {
        match self {
            Self::BuilderFailed(_) => PopulationErrorCode::AeroPopulationBuilderFailed,
            Self::UpdateFailed { .. } => PopulationErrorCode::AeroPopulationUpdateFailed,
            Self::ConstraintViolation(_) => PopulationErrorCode::AeroPopulationConstraintViolation,
            Self::SampleFailed(_) => PopulationErrorCode::AeroPopulationSampleFailed,
            Self::FlipFailed(_) => PopulationErrorCode::AeroPopulationFlipFailed,
            Self::FlipTargetMissing(_) => PopulationErrorCode::AeroPopulationFlipTargetMissing,
            Self::ScanFailed(_) => PopulationErrorCode::AeroPopulationScanFailed,
            Self::Cancelled(_) => PopulationErrorCode::AeroPopulationCancelled,
            Self::InvalidConfig(_) => PopulationErrorCode::AeroPopulationInvalidConfig,
            Self::LockPoisoned(_) => PopulationErrorCode::AeroPopulationLockPoisoned,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// The innermost error, looking through flip failures
    pub fn root_cause(&self) -> &PopulationError {
        match self {
            Self::FlipFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type for population operations
pub type PopulationResult<T> = Result<T, PopulationError>;
