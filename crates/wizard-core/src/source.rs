//! External collaborators
//!
//! The controller consumes two contracts supplied by the host application:
//! - [`OptionSource`]: lists the choices for a step given its parent selection
//! - [`SubmissionBackend`]: accepts the final payload and returns an opaque result
//!
//! Both report failure through their `Result`, never by panicking, so the
//! loader's generation check applies uniformly.

use crate::error::{LoadError, SubmissionError};
use crate::types::{display_value, Choice, Payload, StepId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Lists the valid choices for a step
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptionSource: Send + Sync {
    /// Choices for `step`, keyed by the selection of the step it depends on
    async fn list(&self, step: &StepId, parent: Option<Value>) -> Result<Vec<Choice>, LoadError>;
}

/// Accepts the aggregate payload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Create the resource; the result is handed back to the opener verbatim
    async fn create(&self, payload: Payload) -> Result<Value, SubmissionError>;
}

/// Key used for steps listed without a parent selection
pub const ROOT_KEY: &str = "*";

/// In-memory option tables: step -> parent key -> choices
///
/// Parent keys are the parent selection rendered for display (strings
/// without quotes); [`ROOT_KEY`] holds the choices for a step loaded without
/// a parent. Unknown steps and parents resolve to an empty list.
///
/// Keys are strings, so distinct parent values can collide: `3` and `"3"`
/// share the key `3`, and a parent selection of `"*"` reads the root table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticOptionSource {
    tables: HashMap<StepId, HashMap<String, Vec<Choice>>>,
}

impl StaticOptionSource {
    /// Create empty source
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choices for a step loaded without a parent
    #[must_use]
    pub fn with_root(mut self, step: impl Into<StepId>, choices: Vec<Choice>) -> Self {
        self.tables
            .entry(step.into())
            .or_default()
            .insert(ROOT_KEY.to_string(), choices);
        self
    }

    /// Choices for a step under one parent selection
    #[must_use]
    pub fn with_children(
        mut self,
        step: impl Into<StepId>,
        parent: impl Into<String>,
        choices: Vec<Choice>,
    ) -> Self {
        self.tables
            .entry(step.into())
            .or_default()
            .insert(parent.into(), choices);
        self
    }

    /// Parse tables from JSON
    ///
    /// # Errors
    /// `serde_json::Error` on malformed input
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Synchronous lookup
    #[must_use]
    pub fn lookup(&self, step: &StepId, parent: Option<&Value>) -> Vec<Choice> {
        let key = parent.map_or_else(|| ROOT_KEY.to_string(), display_value);
        self.tables
            .get(step)
            .and_then(|t| t.get(&key))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl OptionSource for StaticOptionSource {
    async fn list(&self, step: &StepId, parent: Option<Value>) -> Result<Vec<Choice>, LoadError> {
        Ok(self.lookup(step, parent.as_ref()))
    }
}

/// Bounds every load of an inner source
pub struct TimeoutSource {
    inner: Arc<dyn OptionSource>,
    timeout: Duration,
}

impl TimeoutSource {
    /// Wrap a source
    #[inline]
    #[must_use]
    pub fn new(inner: Arc<dyn OptionSource>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl OptionSource for TimeoutSource {
    async fn list(&self, step: &StepId, parent: Option<Value>) -> Result<Vec<Choice>, LoadError> {
        match tokio::time::timeout(self.timeout, self.inner.list(step, parent)).await {
            Ok(result) => result,
            Err(_) => {
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(step = %step, timeout_ms = ms, "option load timed out");
                Err(LoadError::Timeout(ms))
            }
        }
    }
}
