//! Wizard Core - Staged Selection Controller
//!
//! Drives multi-step selection wizards where each step's options depend on
//! the previous step's choice:
//! - Sequences steps and gates forward movement on valid selections
//! - Loads dependent options asynchronously, dropping stale responses
//! - Clears downstream steps when an upstream choice changes
//! - Submits the aggregate payload exactly once per confirmation
//!
//! Loads and submissions run as spawned tasks, so every operation that can
//! issue one (`start`, `go_next`, `go_back`, `retry`, `submit`) must be
//! called from within a Tokio runtime.
//!
//! # Example
//!
//! ```rust,ignore
//! use wizard_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn SubmissionBackend>) -> Result<(), WizardError> {
//! let definition = WizardDefinition::new(
//!     "run-pipeline",
//!     vec![
//!         StepDefinition::remote("project", "Select Project"),
//!         StepDefinition::remote("repo", "Select Repository").depends_on("project"),
//!     ],
//! )?;
//! let source = StaticOptionSource::new()
//!     .with_root("project", vec!["atonix-api".into()])
//!     .with_children("repo", "atonix-api", vec!["atonix-api-mobile".into()]);
//!
//! let mut wizard = WizardController::new(definition, Arc::new(source), backend);
//! wizard.start();
//! wizard.settle().await;
//! wizard.select(0, "atonix-api".into())?;
//! wizard.go_next()?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod controller;
pub mod definition;
pub mod error;
pub(crate) mod loader;
pub mod source;
pub mod submission;
pub mod types;

// Re-exports for convenience
pub use config::{ManifestKind, StepManifest, WizardConfig, WizardManifest};
pub use controller::{Advance, Selected, SummaryEntry, WizardController, WizardEvent};
pub use definition::{StepDefinition, StepKind, Validator, WizardDefinition};
pub use error::{
    ConfigError, DefinitionError, LoadError, LockReason, PreconditionError, StepNotReadyError,
    SubmissionError, ValidationError, WizardError,
};
pub use source::{OptionSource, StaticOptionSource, SubmissionBackend, TimeoutSource, ROOT_KEY};
pub use submission::{build_payload, SubmissionHandle};
pub use types::{
    display_value, Choice, LoadStatus, Payload, StepId, StepState, SubmissionStatus, WizardState,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a wizard
    pub use crate::{
        Advance, Choice, LoadStatus, OptionSource, StaticOptionSource, StepDefinition, StepId,
        SubmissionBackend, SubmissionStatus, WizardConfig, WizardController, WizardDefinition,
        WizardError, WizardEvent, WizardManifest, WizardState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
