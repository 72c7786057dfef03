//! Error types for the wizard core
//!
//! User-facing failures are recorded on [`WizardState`](crate::WizardState)
//! as well as returned, so a UI can render them without holding on to the
//! `Result`:
//! - Selection validation failures
//! - Option load failures
//! - Submission failures
//!
//! Programmer-facing guards (`StepNotReadyError`, `PreconditionError`) and
//! construction failures (`DefinitionError`, `ConfigError`) are only returned.

use crate::types::StepId;
use std::fmt;
use std::path::PathBuf;

/// Why a wizard currently refuses mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    /// A submission is in flight
    Submitting,
    /// A submission succeeded; the wizard is done
    Finished,
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitting => f.write_str("submission in flight"),
            Self::Finished => f.write_str("wizard already submitted"),
        }
    }
}

/// A selection was rejected by `select`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Index past the last step
    #[error("step index {index} out of range (wizard has {len} steps)")]
    UnknownStep { index: usize, len: usize },

    /// Step lies ahead of the cursor
    #[error("step {step} is not reachable yet (cursor at {cursor})")]
    StepNotReached { step: StepId, cursor: usize },

    /// A validator rejected the value
    #[error("{message}")]
    Rejected { step: StepId, message: String },

    /// Value is not among the loaded options
    #[error("{value} is not an available option for {step}")]
    NotAnOption { step: StepId, value: String },

    /// Options have not been loaded (or failed to load)
    #[error("options for {step} are not available")]
    OptionsUnavailable { step: StepId },

    /// Wizard refuses edits
    #[error("wizard is locked: {0}")]
    Locked(LockReason),
}

impl ValidationError {
    /// Whether this error belongs inline on a field (as opposed to a
    /// misuse of the controller)
    #[inline]
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::NotAnOption { .. } | Self::OptionsUnavailable { .. }
        )
    }
}

/// `go_next` was called before the current step could be left
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepNotReadyError {
    /// Nothing selected yet
    #[error("step {step} has no selection")]
    MissingSelection { step: StepId },

    /// Current selection no longer passes the step's validators
    #[error("selection for {step} is invalid: {message}")]
    InvalidSelection { step: StepId, message: String },

    /// Options still loading
    #[error("options for {step} are still loading")]
    Loading { step: StepId },

    /// Option load failed; retry or go back
    #[error("loading options for {step} failed")]
    LoadFailed { step: StepId },

    /// Cursor already on the confirm step
    #[error("already at the confirm step")]
    AtConfirm,

    /// Wizard refuses navigation
    #[error("wizard is locked: {0}")]
    Locked(LockReason),
}

/// Option source failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Network/transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with an error
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Source did not answer in time
    #[error("load timed out after {0}ms")]
    Timeout(u64),

    /// The step this one depends on has no selection
    #[error("parent step {0} has no selection to load from")]
    MissingParent(StepId),
}

impl LoadError {
    /// Check if a manual retry can reasonably succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Service { status, .. } => *status >= 500,
            Self::MissingParent(_) => false,
        }
    }
}

/// Submission backend failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Network/transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend rejected the request
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Backend did not answer in time
    #[error("submission timed out after {0}ms")]
    Timeout(u64),
}

impl SubmissionError {
    /// Check if resubmitting the same payload can reasonably succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// `submit` was called on a state that cannot be submitted
///
/// This is a defect in the caller, not a user-facing condition. With the
/// `strict-debug` feature enabled it panics instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// Cursor is not on the confirm step
    #[error("submit requires the confirm step (cursor at {cursor} of {len})")]
    NotAtConfirm { cursor: usize, len: usize },

    /// A step has no valid selection
    #[error("step {step} has no valid selection")]
    IncompleteStep { step: StepId },

    /// A submission already succeeded
    #[error("wizard already submitted")]
    AlreadySubmitted,
}

/// Invalid wizard definition
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// No steps
    #[error("wizard {0} has no steps")]
    Empty(String),

    /// A step has a blank id
    #[error("wizard {0} has a step with an empty id")]
    EmptyStepId(String),

    /// Two steps share an id
    #[error("duplicate step id: {0}")]
    DuplicateStep(StepId),

    /// `depends_on` names a step that does not exist
    #[error("step {step} depends on unknown step {depends_on}")]
    UnknownDependency { step: StepId, depends_on: StepId },

    /// `depends_on` names the step itself or a later one
    #[error("step {step} depends on {depends_on}, which does not come before it")]
    ForwardDependency { step: StepId, depends_on: StepId },

    /// Validator pattern does not compile
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Static step without choices
    #[error("static step {0} has no choices")]
    NoChoices(StepId),

    /// Fallback choices given for a step that never loads
    #[error("step {0} has fallback choices but does not load its options")]
    FallbackWithoutLoad(StepId),
}

/// Manifest loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not read the manifest file
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON
    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// Unrecognized manifest extension
    #[error("unsupported manifest format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Manifest parsed but describes an invalid wizard
    #[error("invalid wizard definition: {0}")]
    Definition(#[from] DefinitionError),
}

/// Umbrella error for callers that do not care which operation failed
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// Selection rejected
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Navigation refused
    #[error("step not ready: {0}")]
    NotReady(#[from] StepNotReadyError),

    /// Submit misuse
    #[error("precondition violated: {0}")]
    Precondition(#[from] PreconditionError),

    /// Submission failed
    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),

    /// Bad definition
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Bad manifest
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::Rejected {
            step: StepId::new("name"),
            message: "Bucket name must be 3-63 characters".to_string(),
        };
        assert_eq!(err.to_string(), "Bucket name must be 3-63 characters");
        assert!(err.is_user_facing());
        assert!(!ValidationError::Locked(LockReason::Submitting).is_user_facing());
    }

    #[test]
    fn load_error_is_retryable() {
        assert!(LoadError::Transport("reset".into()).is_retryable());
        assert!(LoadError::Timeout(500).is_retryable());
        assert!(LoadError::Service {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!LoadError::Service {
            status: 404,
            message: "missing".into()
        }
        .is_retryable());
        assert!(!LoadError::MissingParent(StepId::new("repo")).is_retryable());
    }

    #[test]
    fn submission_error_is_retryable() {
        assert!(SubmissionError::Timeout(1000).is_retryable());
        assert!(!SubmissionError::Rejected {
            status: 400,
            message: "name taken".into()
        }
        .is_retryable());
    }

    #[test]
    fn umbrella_conversion() {
        let err: WizardError = StepNotReadyError::AtConfirm.into();
        assert!(err.to_string().contains("step not ready"));
    }

    #[test]
    fn lock_reason_display() {
        let err = StepNotReadyError::Locked(LockReason::Finished);
        assert_eq!(err.to_string(), "wizard is locked: wizard already submitted");
    }
}
