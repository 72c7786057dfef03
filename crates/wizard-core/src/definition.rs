//! Static wizard description
//!
//! A [`WizardDefinition`] is the ordered list of [`StepDefinition`]s a
//! controller is built from. Definitions are immutable once constructed and
//! are checked up front:
//! - at least one step
//! - unique step ids
//! - `depends_on` always names an earlier step

use crate::error::DefinitionError;
use crate::types::{display_value, Choice, StepId};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Where a step's options come from
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Loaded from the option source, keyed by the parent selection
    Remote,
    /// Fixed choices, ready as soon as the step is entered
    Static(Vec<Choice>),
    /// Free-form value with no options
    Input,
}

impl StepKind {
    /// Whether a selection must be one of the step's options
    #[inline]
    #[must_use]
    pub fn is_option_backed(&self) -> bool {
        !matches!(self, Self::Input)
    }
}

type CheckFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A rule a selection must satisfy before the wizard may advance
#[derive(Clone)]
pub enum Validator {
    /// Non-null and, for strings, non-blank
    Required { message: String },
    /// Trimmed string of at least `min` characters
    MinLength { min: usize, message: String },
    /// Trimmed string of at most `max` characters
    MaxLength { max: usize, message: String },
    /// String matching a regular expression
    Pattern { regex: Regex, message: String },
    /// Arbitrary predicate
    Custom { check: CheckFn, message: String },
}

impl Validator {
    /// Required value
    #[must_use]
    pub fn required(message: impl Into<String>) -> Self {
        Self::Required {
            message: message.into(),
        }
    }

    /// Minimum trimmed length
    #[must_use]
    pub fn min_length(min: usize, message: impl Into<String>) -> Self {
        Self::MinLength {
            min,
            message: message.into(),
        }
    }

    /// Maximum trimmed length
    #[must_use]
    pub fn max_length(max: usize, message: impl Into<String>) -> Self {
        Self::MaxLength {
            max,
            message: message.into(),
        }
    }

    /// Regex pattern
    ///
    /// # Errors
    /// `DefinitionError::InvalidPattern` if `pattern` does not compile
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self, DefinitionError> {
        let regex = Regex::new(pattern).map_err(|source| DefinitionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::Pattern {
            regex,
            message: message.into(),
        })
    }

    /// Custom predicate
    #[must_use]
    pub fn custom(
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::Custom {
            check: Arc::new(check),
            message: message.into(),
        }
    }

    /// Check a value, returning the rule's message on failure
    ///
    /// # Errors
    /// The validator's message if the value is rejected
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            Self::Required { .. } => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            },
            Self::MinLength { min, .. } => {
                trimmed(value).is_some_and(|s| s.chars().count() >= *min)
            }
            Self::MaxLength { max, .. } => {
                trimmed(value).is_some_and(|s| s.chars().count() <= *max)
            }
            Self::Pattern { regex, .. } => value.as_str().is_some_and(|s| regex.is_match(s)),
            Self::Custom { check, .. } => check(value),
        };
        if ok {
            Ok(())
        } else {
            Err(self.message().to_string())
        }
    }

    /// Failure message
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Required { message }
            | Self::MinLength { message, .. }
            | Self::MaxLength { message, .. }
            | Self::Pattern { message, .. }
            | Self::Custom { message, .. } => message,
        }
    }
}

fn trimmed(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim)
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required { message } => f.debug_struct("Required").field("message", message).finish(),
            Self::MinLength { min, message } => f
                .debug_struct("MinLength")
                .field("min", min)
                .field("message", message)
                .finish(),
            Self::MaxLength { max, message } => f
                .debug_struct("MaxLength")
                .field("max", max)
                .field("message", message)
                .finish(),
            Self::Pattern { regex, message } => f
                .debug_struct("Pattern")
                .field("regex", &regex.as_str())
                .field("message", message)
                .finish(),
            Self::Custom { message, .. } => f
                .debug_struct("Custom")
                .field("message", message)
                .finish_non_exhaustive(),
        }
    }
}

/// Static description of one step
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// Step ID
    pub id: StepId,
    /// Display title
    pub title: String,
    /// Option provenance
    pub kind: StepKind,
    /// Step whose selection keys this step's options
    pub depends_on: Option<StepId>,
    /// Rules a selection must pass
    pub validators: Vec<Validator>,
    /// Select the first option after a load if nothing is selected
    pub auto_select_first: bool,
    /// Options used when a remote load fails or comes back empty
    pub fallback: Vec<Choice>,
}

impl StepDefinition {
    fn with_kind(id: impl Into<StepId>, title: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            depends_on: None,
            validators: Vec::new(),
            auto_select_first: false,
            fallback: Vec::new(),
        }
    }

    /// Step whose options come from the option source
    #[must_use]
    pub fn remote(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self::with_kind(id, title, StepKind::Remote)
    }

    /// Step with fixed choices
    #[must_use]
    pub fn fixed(id: impl Into<StepId>, title: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::with_kind(id, title, StepKind::Static(choices))
    }

    /// Free-form input step
    #[must_use]
    pub fn input(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self::with_kind(id, title, StepKind::Input)
    }

    /// Key this step's options by another step's selection
    #[must_use]
    pub fn depends_on(mut self, step: impl Into<StepId>) -> Self {
        self.depends_on = Some(step.into());
        self
    }

    /// Add validator
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Shorthand for a `Required` validator
    #[must_use]
    pub fn require(self, message: impl Into<String>) -> Self {
        self.with_validator(Validator::required(message))
    }

    /// Auto-select the first loaded option
    #[must_use]
    pub fn auto_select_first(mut self) -> Self {
        self.auto_select_first = true;
        self
    }

    /// Options to fall back to when loading fails or returns nothing
    #[must_use]
    pub fn with_fallback(mut self, choices: Vec<Choice>) -> Self {
        self.fallback = choices;
        self
    }

    /// Run all validators, returning the first failure message
    ///
    /// # Errors
    /// The first failing validator's message
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validators.iter().try_for_each(|v| v.check(value))
    }

    /// Check a value against all validators
    #[inline]
    #[must_use]
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Whether entering the step requires an option load
    #[inline]
    #[must_use]
    pub fn needs_load(&self) -> bool {
        matches!(self.kind, StepKind::Remote)
    }
}

/// Ordered, checked list of steps
#[derive(Debug, Clone)]
pub struct WizardDefinition {
    name: String,
    steps: Vec<StepDefinition>,
    parents: Vec<Option<usize>>,
}

impl WizardDefinition {
    /// Build and check a definition
    ///
    /// # Errors
    /// - `DefinitionError::Empty` if there are no steps
    /// - `DefinitionError::EmptyStepId` on a blank id
    /// - `DefinitionError::DuplicateStep` on repeated ids
    /// - `DefinitionError::UnknownDependency` / `ForwardDependency` on bad `depends_on`
    /// - `DefinitionError::NoChoices` on a static step without choices
    /// - `DefinitionError::FallbackWithoutLoad` on fallback choices for a non-remote step
    pub fn new(
        name: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(DefinitionError::Empty(name));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.as_str().trim().is_empty() {
                return Err(DefinitionError::EmptyStepId(name));
            }
            if !seen.insert(step.id.clone()) {
                return Err(DefinitionError::DuplicateStep(step.id.clone()));
            }
            if matches!(&step.kind, StepKind::Static(c) if c.is_empty()) {
                return Err(DefinitionError::NoChoices(step.id.clone()));
            }
            if !step.fallback.is_empty() && !step.needs_load() {
                return Err(DefinitionError::FallbackWithoutLoad(step.id.clone()));
            }
        }

        let mut parents = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let parent = match &step.depends_on {
                None => None,
                Some(dep) => {
                    let Some(pos) = steps.iter().position(|s| &s.id == dep) else {
                        return Err(DefinitionError::UnknownDependency {
                            step: step.id.clone(),
                            depends_on: dep.clone(),
                        });
                    };
                    if pos >= index {
                        return Err(DefinitionError::ForwardDependency {
                            step: step.id.clone(),
                            depends_on: dep.clone(),
                        });
                    }
                    Some(pos)
                }
            };
            parents.push(parent);
        }

        Ok(Self {
            name,
            steps,
            parents,
        })
    }

    /// Wizard name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Step by index
    #[inline]
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a checked definition
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of a step id
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id.as_str() == id)
    }

    /// Index of the step whose selection keys `index`'s options
    #[inline]
    #[must_use]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Step ids in order
    pub fn ids(&self) -> impl Iterator<Item = StepId> + '_ {
        self.steps.iter().map(|s| s.id.clone())
    }

    /// Render a selection with the step's static choice label when there is one
    #[must_use]
    pub fn label_for(&self, index: usize, value: &Value) -> String {
        match self.steps.get(index).map(|s| &s.kind) {
            Some(StepKind::Static(choices)) => choices
                .iter()
                .find(|c| &c.value == value)
                .map_or_else(|| display_value(value), |c| c.label.clone()),
            _ => display_value(value),
        }
    }
}
