//! Core types for the wizard
//!
//! Defines the data the controller owns:
//! - Step identifiers and choices
//! - Per-step load status and selection
//! - The aggregate wizard state and its submission status

use crate::error::{LoadError, SubmissionError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

/// Create-request payload: step id -> selected value
pub type Payload = serde_json::Map<String, Value>;

/// Stable step identifier (e.g. `"project"`, `"region"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Create step ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One value offered at a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChoiceRepr")]
pub struct Choice {
    /// Value stored as the selection
    pub value: Value,
    /// Display label
    pub label: String,
    /// Optional secondary text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Choice {
    /// Create choice
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            description: None,
        }
    }

    /// Add description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Case-insensitive match against label and description
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.label.to_lowercase().contains(&query)
            || self
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Self::new(value, value)
    }
}

/// Accepts either a bare string or a full `{ value, label, description }` table
#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceRepr {
    Plain(String),
    Full {
        value: Value,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<ChoiceRepr> for Choice {
    fn from(repr: ChoiceRepr) -> Self {
        match repr {
            ChoiceRepr::Plain(s) => Choice::new(s.clone(), s),
            ChoiceRepr::Full {
                value,
                label,
                description,
            } => {
                let label = label.unwrap_or_else(|| display_value(&value));
                Choice {
                    value,
                    label,
                    description,
                }
            }
        }
    }
}

/// Render a selection for display; strings without quotes
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Option load status of a step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    /// Not loaded (or invalidated)
    #[default]
    Idle,
    /// Load in flight
    Loading,
    /// Options available
    Ready,
    /// Load failed; error kept for display and retry
    Failed(LoadError),
}

impl LoadStatus {
    /// Check if loading
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Check if failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Load error, if failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Submission status of the wizard
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SubmissionStatus {
    /// Nothing submitted
    #[default]
    Idle,
    /// Request in flight
    Submitting,
    /// Backend accepted; result handed back verbatim
    Succeeded(Value),
    /// Backend failed; wizard stays on confirm for retry
    Failed(SubmissionError),
}

impl SubmissionStatus {
    /// Check if in flight
    #[inline]
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    /// Check if succeeded
    #[inline]
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Mutable state of one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub(crate) id: StepId,
    pub(crate) selection: Option<Value>,
    pub(crate) options: Vec<Choice>,
    pub(crate) load_status: LoadStatus,
    pub(crate) validation_error: Option<ValidationError>,
}

impl StepState {
    pub(crate) fn new(id: StepId) -> Self {
        Self {
            id,
            selection: None,
            options: Vec::new(),
            load_status: LoadStatus::Idle,
            validation_error: None,
        }
    }

    /// Step ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> &StepId {
        &self.id
    }

    /// Current selection
    #[inline]
    #[must_use]
    pub fn selection(&self) -> Option<&Value> {
        self.selection.as_ref()
    }

    /// Last loaded options
    #[inline]
    #[must_use]
    pub fn options(&self) -> &[Choice] {
        &self.options
    }

    /// Load status
    #[inline]
    #[must_use]
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// Last inline validation error
    #[inline]
    #[must_use]
    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    /// Loaded option matching the selection
    #[must_use]
    pub fn selected_choice(&self) -> Option<&Choice> {
        let selection = self.selection.as_ref()?;
        self.options.iter().find(|c| &c.value == selection)
    }

    /// Display label of the selection
    #[must_use]
    pub fn selected_label(&self) -> Option<String> {
        self.selected_choice()
            .map(|c| c.label.clone())
            .or_else(|| self.selection.as_ref().map(display_value))
    }

    /// Options matching a search query
    #[must_use]
    pub fn filter_options(&self, query: &str) -> Vec<&Choice> {
        self.options.iter().filter(|c| c.matches(query)).collect()
    }

    /// Whether the step holds anything that invalidation would clear
    pub(crate) fn is_pristine(&self) -> bool {
        self.selection.is_none()
            && self.options.is_empty()
            && self.load_status == LoadStatus::Idle
            && self.validation_error.is_none()
    }

    /// Clear selection, options and status
    pub(crate) fn invalidate(&mut self) {
        self.selection = None;
        self.options.clear();
        self.load_status = LoadStatus::Idle;
        self.validation_error = None;
    }
}

/// Aggregate wizard state
///
/// `cursor == steps.len()` is the confirm step.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub(crate) steps: Vec<StepState>,
    pub(crate) cursor: usize,
    pub(crate) submission: SubmissionStatus,
}

impl WizardState {
    /// Fresh state for the given step ids
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = StepId>) -> Self {
        Self {
            steps: ids.into_iter().map(StepState::new).collect(),
            cursor: 0,
            submission: SubmissionStatus::Idle,
        }
    }

    /// All steps, in order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[StepState] {
        &self.steps
    }

    /// Step by index
    #[inline]
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&StepState> {
        self.steps.get(index)
    }

    /// Step by id
    #[must_use]
    pub fn step_by_id(&self, id: &str) -> Option<&StepState> {
        self.steps.iter().find(|s| s.id.as_str() == id)
    }

    /// Index of the step being edited
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Step under the cursor; `None` on the confirm step
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&StepState> {
        self.steps.get(self.cursor)
    }

    /// Number of steps (confirm excluded)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if there are no steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if on the confirm step
    #[inline]
    #[must_use]
    pub fn is_at_confirm(&self) -> bool {
        self.cursor == self.steps.len()
    }

    /// Submission status
    #[inline]
    #[must_use]
    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    /// (1-based position, total positions including confirm)
    #[inline]
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor + 1, self.steps.len() + 1)
    }

    /// Present selections keyed by step id
    #[must_use]
    pub fn selections(&self) -> Payload {
        self.steps
            .iter()
            .filter_map(|s| {
                s.selection
                    .as_ref()
                    .map(|v| (s.id.to_string(), v.clone()))
            })
            .collect()
    }

    pub(crate) fn index_of(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|s| &s.id == id)
    }
}
