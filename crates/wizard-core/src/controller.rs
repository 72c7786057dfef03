//! Wizard controller
//!
//! The only component that mutates [`WizardState`]. It sequences the user's
//! choices, triggers dependent loads, and applies their completions.
//!
//! # Transitions
//! 1. `select` validates a value and clears every later step when it changes
//! 2. `go_next` leaves a step once it has a valid selection and is not loading
//! 3. `go_back` returns to the previous step, keeping its cached options
//! 4. `submit` sends the payload from the confirm step
//! 5. `reset` restores the freshly constructed state
//!
//! Loads and submissions complete asynchronously. The owner drives them with
//! [`WizardController::next_event`] (awaits one completion) or
//! [`WizardController::pump`] (applies whatever has already arrived).

use crate::config::WizardConfig;
use crate::definition::{StepKind, WizardDefinition};
use crate::error::{
    LoadError, LockReason, PreconditionError, StepNotReadyError, ValidationError,
};
use crate::loader::{Completion, DependentLoader};
use crate::source::{OptionSource, SubmissionBackend, TimeoutSource};
use crate::submission::{build_payload, SubmissionCoordinator, SubmissionHandle};
use crate::types::{
    display_value, Choice, LoadStatus, StepId, SubmissionStatus, WizardState,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of a successful `go_next`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Now editing the step at this index
    Step(usize),
    /// Now on the confirm step
    Confirm,
}

/// Result of a successful `select`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selected {
    /// The selection differed from the previous one
    pub changed: bool,
    /// Later steps that held data and were cleared
    pub invalidated: usize,
    /// Set when `advance_on_select` moved the cursor
    pub advanced: Option<Advance>,
}

/// A completion applied to the state
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    /// Options arrived for a step
    OptionsLoaded { step: StepId, count: usize },
    /// Option load failed
    LoadFailed { step: StepId, error: LoadError },
    /// A superseded load finished and was dropped
    LoadDiscarded { step: StepId, generation: u64 },
    /// Backend accepted the submission
    Submitted(Value),
    /// Backend failed the submission
    SubmissionFailed(crate::error::SubmissionError),
    /// An abandoned submission finished and was dropped
    SubmissionDiscarded,
}

/// Confirm-step summary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Step ID
    pub step: StepId,
    /// Step title
    pub title: String,
    /// Selection label, if any
    pub value: Option<String>,
}

/// State machine driving one open wizard
pub struct WizardController {
    definition: Arc<WizardDefinition>,
    config: WizardConfig,
    state: WizardState,
    loader: DependentLoader,
    coordinator: SubmissionCoordinator,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    pending: usize,
}

impl WizardController {
    /// Create a controller with default configuration
    #[must_use]
    pub fn new(
        definition: impl Into<Arc<WizardDefinition>>,
        source: Arc<dyn OptionSource>,
        backend: Arc<dyn SubmissionBackend>,
    ) -> Self {
        Self::with_config(definition, source, backend, WizardConfig::default())
    }

    /// Create a controller with custom configuration
    #[must_use]
    pub fn with_config(
        definition: impl Into<Arc<WizardDefinition>>,
        source: Arc<dyn OptionSource>,
        backend: Arc<dyn SubmissionBackend>,
        config: WizardConfig,
    ) -> Self {
        let definition = definition.into();
        let source: Arc<dyn OptionSource> = match config.load_timeout() {
            Some(timeout) => Arc::new(TimeoutSource::new(source, timeout)),
            None => source,
        };
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            state: WizardState::new(definition.ids()),
            loader: DependentLoader::new(source, definition.len(), completions_tx.clone()),
            coordinator: SubmissionCoordinator::new(backend, config.submit_timeout()),
            definition,
            config,
            completions_tx,
            completions_rx,
            pending: 0,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Wizard definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &WizardDefinition {
        &self.definition
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Requests whose completion has not been applied yet
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Title of the step under the cursor, or `None` on confirm
    #[must_use]
    pub fn current_title(&self) -> Option<&str> {
        self.definition
            .step(self.state.cursor)
            .map(|s| s.title.as_str())
    }

    /// Enter the step under the cursor, loading its options if needed
    ///
    /// Call once after construction and after `reset`.
    /// Returns true if a load was issued.
    ///
    /// # Panics
    /// If a load is issued outside a Tokio runtime
    pub fn start(&mut self) -> bool {
        if self.state.is_at_confirm() {
            return false;
        }
        self.enter(self.state.cursor)
    }

    /// Choose a value for step `index`
    ///
    /// Re-selecting the current value is a no-op. A different value clears
    /// every later step and, if `index` lies behind the cursor, moves the
    /// cursor back to `index`.
    ///
    /// # Errors
    /// `ValidationError` if the value is rejected; user-facing variants are
    /// also recorded on the step.
    ///
    /// # Panics
    /// With `advance_on_select`, if the advance issues a load outside a
    /// Tokio runtime
    pub fn select(&mut self, index: usize, value: Value) -> Result<Selected, ValidationError> {
        if let Some(reason) = self.lock_reason() {
            return Err(ValidationError::Locked(reason));
        }
        let len = self.state.len();
        let Some(def) = self.definition.step(index) else {
            return Err(ValidationError::UnknownStep { index, len });
        };
        if index > self.state.cursor {
            return Err(ValidationError::StepNotReached {
                step: def.id.clone(),
                cursor: self.state.cursor,
            });
        }

        if let Err(err) = self.check_selection(index, &value) {
            tracing::debug!(step = %def.id, error = %err, "selection rejected");
            self.state.steps[index].validation_error = Some(err.clone());
            return Err(err);
        }

        let step = &mut self.state.steps[index];
        step.validation_error = None;
        if step.selection.as_ref() == Some(&value) {
            return Ok(Selected::default());
        }

        let at_cursor = index == self.state.cursor;
        let invalidated = self.apply_selection(index, value);
        let mut outcome = Selected {
            changed: true,
            invalidated,
            advanced: None,
        };
        if self.config.advance_on_select && at_cursor {
            outcome.advanced = self.go_next().ok();
        }
        Ok(outcome)
    }

    /// Select a step by id
    ///
    /// # Errors
    /// As [`select`](Self::select); unknown ids report `UnknownStep`.
    pub fn select_by_id(&mut self, id: &str, value: Value) -> Result<Selected, ValidationError> {
        let index = self
            .definition
            .index_of(id)
            .unwrap_or(self.definition.len());
        self.select(index, value)
    }

    /// Whether `go_next` would succeed
    ///
    /// # Errors
    /// The reason the cursor cannot move
    pub fn check_next(&self) -> Result<(), StepNotReadyError> {
        if let Some(reason) = self.lock_reason() {
            return Err(StepNotReadyError::Locked(reason));
        }
        let cursor = self.state.cursor;
        let (Some(def), Some(step)) = (self.definition.step(cursor), self.state.step(cursor))
        else {
            return Err(StepNotReadyError::AtConfirm);
        };

        match step.load_status {
            LoadStatus::Loading => {
                return Err(StepNotReadyError::Loading {
                    step: def.id.clone(),
                })
            }
            LoadStatus::Failed(_) => {
                return Err(StepNotReadyError::LoadFailed {
                    step: def.id.clone(),
                })
            }
            LoadStatus::Idle | LoadStatus::Ready => {}
        }

        let Some(selection) = &step.selection else {
            return Err(StepNotReadyError::MissingSelection {
                step: def.id.clone(),
            });
        };
        def.validate(selection)
            .map_err(|message| StepNotReadyError::InvalidSelection {
                step: def.id.clone(),
                message,
            })
    }

    /// Leave the current step
    ///
    /// # Errors
    /// `StepNotReadyError` if the step cannot be left; state is unchanged
    ///
    /// # Panics
    /// If entering the next step issues a load outside a Tokio runtime
    pub fn go_next(&mut self) -> Result<Advance, StepNotReadyError> {
        if let Err(err) = self.check_next() {
            tracing::debug!(cursor = self.state.cursor, error = %err, "advance refused");
            return Err(err);
        }

        self.state.cursor += 1;
        let cursor = self.state.cursor;
        tracing::debug!(cursor, "advanced");
        if cursor == self.state.len() {
            Ok(Advance::Confirm)
        } else {
            self.enter(cursor);
            Ok(Advance::Step(cursor))
        }
    }

    /// Return to the previous step
    ///
    /// Loads in flight for the step being left (and later ones) are dropped.
    /// The step returned to keeps its options unless it was invalidated
    /// meanwhile, in which case it is reloaded. Returns false at step 0 or
    /// while locked.
    ///
    /// # Panics
    /// If the reload is issued outside a Tokio runtime
    pub fn go_back(&mut self) -> bool {
        if self.lock_reason().is_some() || self.state.cursor == 0 {
            return false;
        }

        let left = self.state.cursor;
        for index in left..self.state.len() {
            if self.state.steps[index].load_status.is_loading() {
                self.loader.supersede(index);
                self.state.steps[index].load_status = LoadStatus::Idle;
            }
        }
        if matches!(self.state.submission, SubmissionStatus::Failed(_)) {
            self.state.submission = SubmissionStatus::Idle;
        }

        self.state.cursor -= 1;
        let cursor = self.state.cursor;
        tracing::debug!(cursor, "went back");
        self.enter(cursor);
        true
    }

    /// Reload the current step after a failed load
    ///
    /// Returns true if a load was issued.
    ///
    /// # Panics
    /// Outside a Tokio runtime
    pub fn retry(&mut self) -> bool {
        let cursor = self.state.cursor;
        match self.state.step(cursor) {
            Some(step) if step.load_status.is_failed() => {
                self.state.steps[cursor].load_status = LoadStatus::Idle;
                self.enter(cursor)
            }
            _ => false,
        }
    }

    /// Return to the freshly constructed state
    ///
    /// Every outstanding load and submission is superseded; their
    /// completions are discarded when they arrive.
    pub fn reset(&mut self) {
        self.loader.supersede_from(0);
        self.coordinator.abandon();
        self.state = WizardState::new(self.definition.ids());
        tracing::info!(wizard = self.definition.name(), "wizard reset");
    }

    /// Submit the selections from the confirm step
    ///
    /// While a submission is in flight this returns the existing handle and
    /// sends nothing. The outcome is also recorded in the state once the
    /// completion is applied via `next_event`/`pump`.
    ///
    /// # Errors
    /// `PreconditionError` if the wizard is not complete. This is a caller
    /// defect; under the `strict-debug` feature it panics instead.
    ///
    /// # Panics
    /// Outside a Tokio runtime, or on a precondition violation with
    /// `strict-debug` enabled
    pub fn submit(&mut self) -> Result<SubmissionHandle, PreconditionError> {
        if let Some(handle) = self.coordinator.in_flight() {
            return Ok(handle);
        }
        if self.state.submission.is_succeeded() {
            return Err(precondition_failed(PreconditionError::AlreadySubmitted));
        }

        let payload = build_payload(&self.definition, &self.state).map_err(precondition_failed)?;
        self.state.submission = SubmissionStatus::Submitting;
        self.pending += 1;
        Ok(self.coordinator.submit(payload, &self.completions_tx))
    }

    /// Result of a successful submission
    #[must_use]
    pub fn outcome(&self) -> Option<&Value> {
        match &self.state.submission {
            SubmissionStatus::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    /// Wait for the next completion and apply it
    ///
    /// Returns `None` when nothing is outstanding.
    pub async fn next_event(&mut self) -> Option<WizardEvent> {
        if self.pending == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply every completion that has already arrived
    pub fn pump(&mut self) -> Vec<WizardEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            events.push(self.apply(completion));
        }
        events
    }

    /// Wait until nothing is outstanding, returning every applied event
    pub async fn settle(&mut self) -> Vec<WizardEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Options of step `index` matching a search query
    #[must_use]
    pub fn search(&self, index: usize, query: &str) -> Vec<&Choice> {
        self.state
            .step(index)
            .map(|s| s.filter_options(query))
            .unwrap_or_default()
    }

    /// (title, selection label) for every step, for the confirm view
    #[must_use]
    pub fn summary(&self) -> Vec<SummaryEntry> {
        self.definition
            .steps()
            .iter()
            .zip(self.state.steps())
            .enumerate()
            .map(|(index, (def, step))| SummaryEntry {
                step: def.id.clone(),
                title: def.title.clone(),
                value: step.selected_choice().map_or_else(
                    || {
                        step.selection
                            .as_ref()
                            .map(|v| self.definition.label_for(index, v))
                    },
                    |c| Some(c.label.clone()),
                ),
            })
            .collect()
    }

    /// Index of the first step without a valid selection (`len` if none)
    #[must_use]
    pub fn first_incomplete(&self) -> usize {
        self.definition
            .steps()
            .iter()
            .zip(self.state.steps())
            .position(|(def, step)| !step.selection.as_ref().is_some_and(|v| def.is_valid(v)))
            .unwrap_or(self.state.len())
    }

    fn lock_reason(&self) -> Option<LockReason> {
        match self.state.submission {
            SubmissionStatus::Submitting => Some(LockReason::Submitting),
            SubmissionStatus::Succeeded(_) => Some(LockReason::Finished),
            SubmissionStatus::Idle | SubmissionStatus::Failed(_) => None,
        }
    }

    fn check_selection(&self, index: usize, value: &Value) -> Result<(), ValidationError> {
        let def = &self.definition.steps()[index];
        let step = &self.state.steps[index];

        def.validate(value)
            .map_err(|message| ValidationError::Rejected {
                step: def.id.clone(),
                message,
            })?;

        if def.kind.is_option_backed() {
            if step.load_status != LoadStatus::Ready {
                return Err(ValidationError::OptionsUnavailable {
                    step: def.id.clone(),
                });
            }
            if !step.options.iter().any(|c| &c.value == value) {
                return Err(ValidationError::NotAnOption {
                    step: def.id.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }

    /// Store a new selection and clear everything after it
    fn apply_selection(&mut self, index: usize, value: Value) -> usize {
        self.state.steps[index].selection = Some(value);

        let mut invalidated = 0;
        for later in index + 1..self.state.len() {
            self.loader.supersede(later);
            let step = &mut self.state.steps[later];
            if !step.is_pristine() {
                step.invalidate();
                invalidated += 1;
            }
        }

        if self.state.cursor > index {
            self.state.cursor = index;
        }
        if matches!(self.state.submission, SubmissionStatus::Failed(_)) {
            self.state.submission = SubmissionStatus::Idle;
        }

        tracing::debug!(
            step = %self.state.steps[index].id,
            invalidated,
            "selection changed"
        );
        invalidated
    }

    /// Populate an idle step; returns true if a load was issued
    fn enter(&mut self, index: usize) -> bool {
        let definition = Arc::clone(&self.definition);
        let def = &definition.steps()[index];
        if self.state.steps[index].load_status != LoadStatus::Idle {
            return false;
        }

        match &def.kind {
            StepKind::Input => {
                self.state.steps[index].load_status = LoadStatus::Ready;
                false
            }
            StepKind::Static(choices) => {
                self.populate(index, choices.clone());
                false
            }
            StepKind::Remote => {
                let parent = match definition.parent_of(index) {
                    None => None,
                    Some(p) => {
                        if let Some(value) = self.state.steps[p].selection.clone() {
                            Some(value)
                        } else {
                            let parent_id = definition.steps()[p].id.clone();
                            tracing::warn!(step = %def.id, parent = %parent_id, "no parent selection");
                            self.state.steps[index].load_status =
                                LoadStatus::Failed(LoadError::MissingParent(parent_id));
                            return false;
                        }
                    }
                };
                let step = &mut self.state.steps[index];
                step.options.clear();
                step.load_status = LoadStatus::Loading;
                self.loader.load(index, def.id.clone(), parent);
                self.pending += 1;
                true
            }
        }
    }

    /// Install options on a step and apply auto-selection
    fn populate(&mut self, index: usize, options: Vec<Choice>) {
        let definition = Arc::clone(&self.definition);
        let def = &definition.steps()[index];
        let step = &mut self.state.steps[index];
        step.options = options;
        step.load_status = LoadStatus::Ready;

        if def.auto_select_first && step.selection.is_none() {
            if let Some(first) = step.options.first().map(|c| c.value.clone()) {
                tracing::debug!(step = %def.id, "auto-selecting first option");
                self.apply_selection(index, first);
            }
        }
    }

    fn apply(&mut self, completion: Completion) -> WizardEvent {
        self.pending = self.pending.saturating_sub(1);
        match completion {
            Completion::Load {
                index,
                generation,
                result,
            } => self.apply_load(index, generation, result),
            Completion::Submission { generation, result } => {
                if !self.coordinator.complete(generation) {
                    tracing::debug!(generation, "discarding abandoned submission");
                    return WizardEvent::SubmissionDiscarded;
                }
                match result {
                    Ok(value) => {
                        tracing::info!(wizard = self.definition.name(), "submission succeeded");
                        self.state.submission = SubmissionStatus::Succeeded(value.clone());
                        WizardEvent::Submitted(value)
                    }
                    Err(err) => {
                        tracing::warn!(wizard = self.definition.name(), error = %err, "submission failed");
                        self.state.submission = SubmissionStatus::Failed(err.clone());
                        WizardEvent::SubmissionFailed(err)
                    }
                }
            }
        }
    }

    fn apply_load(
        &mut self,
        index: usize,
        generation: u64,
        result: Result<Vec<Choice>, LoadError>,
    ) -> WizardEvent {
        let definition = Arc::clone(&self.definition);
        let def = &definition.steps()[index];
        let step = def.id.clone();
        if !self.loader.is_current(index, generation) {
            tracing::debug!(
                step = %step,
                generation,
                current = self.loader.generation(index),
                "discarding stale option load"
            );
            return WizardEvent::LoadDiscarded { step, generation };
        }

        let has_fallback = !def.fallback.is_empty();
        match result {
            Ok(options) if options.is_empty() && has_fallback => {
                let fallback = def.fallback.clone();
                tracing::debug!(step = %step, "empty load, using fallback options");
                let count = fallback.len();
                self.populate(index, fallback);
                WizardEvent::OptionsLoaded { step, count }
            }
            Ok(options) => {
                let count = options.len();
                tracing::debug!(step = %step, count, "options loaded");
                self.populate(index, options);
                WizardEvent::OptionsLoaded { step, count }
            }
            Err(error) if has_fallback => {
                let fallback = def.fallback.clone();
                tracing::warn!(step = %step, error = %error, "option load failed, using fallback options");
                let count = fallback.len();
                self.populate(index, fallback);
                WizardEvent::OptionsLoaded { step, count }
            }
            Err(error) => {
                tracing::warn!(step = %step, error = %error, "option load failed");
                self.state.steps[index].load_status = LoadStatus::Failed(error.clone());
                WizardEvent::LoadFailed { step, error }
            }
        }
    }
}

impl std::fmt::Debug for WizardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardController")
            .field("wizard", &self.definition.name())
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Precondition violations are defects; fail loudly when asked to
fn precondition_failed(err: PreconditionError) -> PreconditionError {
    #[cfg(feature = "strict-debug")]
    panic!("wizard precondition violated: {err}");

    #[cfg(not(feature = "strict-debug"))]
    {
        tracing::error!(error = %err, "wizard precondition violated");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StepDefinition;
    use crate::error::SubmissionError;
    use crate::source::{MockOptionSource, MockSubmissionBackend};
    use serde_json::json;

    fn pipeline() -> WizardDefinition {
        WizardDefinition::new(
            "run-pipeline",
            vec![
                StepDefinition::remote("project", "Select Project"),
                StepDefinition::remote("repo", "Select Repository").depends_on("project"),
                StepDefinition::remote("branch", "Select Branch")
                    .depends_on("repo")
                    .auto_select_first(),
            ],
        )
        .unwrap()
    }

    fn source() -> MockOptionSource {
        let mut mock = MockOptionSource::new();
        mock.expect_list().returning(|step, parent| {
            let parent = parent.map(|p| display_value(&p));
            Ok(match (step.as_str(), parent.as_deref()) {
                ("project", None) => vec!["atonix-api".into(), "atonix-web".into()],
                ("repo", Some("atonix-api")) => {
                    vec!["atonix-api".into(), "atonix-api-mobile".into()]
                }
                ("repo", Some("atonix-web")) => vec!["atonix-web".into()],
                ("branch", Some(_)) => vec!["develop".into(), "main".into()],
                _ => vec![],
            })
        });
        mock
    }

    fn backend() -> MockSubmissionBackend {
        let mut mock = MockSubmissionBackend::new();
        mock.expect_create()
            .returning(|payload| Ok(json!({ "pipeline_id": "pipe_1", "branch": payload["branch"] })));
        mock
    }

    fn controller() -> WizardController {
        WizardController::new(pipeline(), Arc::new(source()), Arc::new(backend()))
    }

    #[tokio::test]
    async fn walk_to_submission() {
        let mut wizard = controller();
        assert!(wizard.start());
        wizard.settle().await;
        assert_eq!(wizard.current_title(), Some("Select Project"));

        wizard.select(0, json!("atonix-api")).unwrap();
        assert_eq!(wizard.go_next(), Ok(Advance::Step(1)));
        wizard.settle().await;

        wizard.select(1, json!("atonix-api-mobile")).unwrap();
        wizard.go_next().unwrap();
        wizard.settle().await;

        // branch auto-selected its first option
        assert_eq!(wizard.state().steps()[2].selection(), Some(&json!("develop")));
        assert_eq!(wizard.go_next(), Ok(Advance::Confirm));

        let summary = wizard.summary();
        assert_eq!(summary[1].value.as_deref(), Some("atonix-api-mobile"));

        let handle = wizard.submit().unwrap();
        assert!(wizard.state().submission().is_submitting());
        let events = wizard.settle().await;
        assert_eq!(
            events,
            vec![WizardEvent::Submitted(
                json!({ "pipeline_id": "pipe_1", "branch": "develop" })
            )]
        );
        assert_eq!(handle.await.unwrap()["pipeline_id"], json!("pipe_1"));
        assert!(wizard.outcome().is_some());
        assert_eq!(
            wizard.select(0, json!("atonix-web")),
            Err(ValidationError::Locked(LockReason::Finished))
        );
    }

    #[tokio::test]
    async fn select_rejects_unknown_option_and_records_it() {
        let mut wizard = controller();
        wizard.start();

        assert!(matches!(
            wizard.select(0, json!("atonix-api")),
            Err(ValidationError::OptionsUnavailable { .. })
        ));
        wizard.settle().await;

        let err = wizard.select(0, json!("nope")).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnOption { .. }));
        assert_eq!(wizard.state().steps()[0].validation_error(), Some(&err));

        wizard.select(0, json!("atonix-web")).unwrap();
        assert!(wizard.state().steps()[0].validation_error().is_none());
        assert!(matches!(
            wizard.select(2, json!("main")),
            Err(ValidationError::StepNotReached { .. })
        ));
        assert!(matches!(
            wizard.select(9, json!("main")),
            Err(ValidationError::UnknownStep { index: 9, len: 3 })
        ));
    }

    #[tokio::test]
    async fn go_next_gating() {
        let mut wizard = controller();
        wizard.start();

        assert!(matches!(wizard.go_next(), Err(StepNotReadyError::Loading { .. })));
        wizard.settle().await;
        assert!(matches!(
            wizard.go_next(),
            Err(StepNotReadyError::MissingSelection { .. })
        ));
        assert_eq!(wizard.state().cursor(), 0);
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let mut mock = MockOptionSource::new();
        let mut calls = 0;
        mock.expect_list().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(LoadError::Transport("connection refused".into()))
            } else {
                Ok(vec!["atonix-api".into()])
            }
        });
        let mut wizard = WizardController::new(pipeline(), Arc::new(mock), Arc::new(backend()));

        wizard.start();
        let events = wizard.settle().await;
        assert!(matches!(events[0], WizardEvent::LoadFailed { .. }));
        assert!(wizard.state().steps()[0].load_status().is_failed());
        assert!(matches!(
            wizard.go_next(),
            Err(StepNotReadyError::LoadFailed { .. })
        ));

        assert!(wizard.retry());
        wizard.settle().await;
        assert_eq!(wizard.state().steps()[0].load_status(), &LoadStatus::Ready);
        assert!(!wizard.retry());
    }

    #[tokio::test]
    async fn fallback_options_on_failure() {
        let def = WizardDefinition::new(
            "deploy",
            vec![StepDefinition::remote("image", "Image")
                .with_fallback(vec!["ubuntu-22.04".into(), "debian-12".into()])],
        )
        .unwrap();
        let mut mock = MockOptionSource::new();
        mock.expect_list()
            .returning(|_, _| Err(LoadError::Service { status: 503, message: "not configured".into() }));
        let mut wizard = WizardController::new(def, Arc::new(mock), Arc::new(backend()));

        wizard.start();
        wizard.settle().await;
        assert_eq!(wizard.state().steps()[0].options().len(), 2);
        assert_eq!(wizard.state().steps()[0].load_status(), &LoadStatus::Ready);
    }

    #[tokio::test]
    async fn failed_submission_keeps_selections() {
        let def = WizardDefinition::new(
            "bucket",
            vec![StepDefinition::input("name", "Name").require("Name is required")],
        )
        .unwrap();
        let mut backend = MockSubmissionBackend::new();
        backend.expect_create().returning(|_| {
            Err(SubmissionError::Rejected {
                status: 409,
                message: "bucket already exists".into(),
            })
        });
        let mut wizard =
            WizardController::new(def, Arc::new(MockOptionSource::new()), Arc::new(backend));

        wizard.start();
        wizard.select(0, json!("logs")).unwrap();
        wizard.go_next().unwrap();
        let _handle = wizard.submit().unwrap();
        wizard.settle().await;

        assert!(matches!(
            wizard.state().submission(),
            SubmissionStatus::Failed(SubmissionError::Rejected { status: 409, .. })
        ));
        assert!(wizard.state().is_at_confirm());
        assert_eq!(wizard.state().steps()[0].selection(), Some(&json!("logs")));
    }

    #[tokio::test]
    async fn submit_before_confirm_is_precondition_error() {
        let mut wizard = controller();
        assert!(matches!(
            wizard.submit(),
            Err(PreconditionError::NotAtConfirm { cursor: 0, len: 3 })
        ));
        assert_eq!(wizard.state().submission(), &SubmissionStatus::Idle);
    }

    #[tokio::test]
    async fn advance_on_select() {
        let mut wizard = WizardController::with_config(
            pipeline(),
            Arc::new(source()),
            Arc::new(backend()),
            WizardConfig::new().with_advance_on_select(true),
        );
        wizard.start();
        wizard.settle().await;

        let selected = wizard.select(0, json!("atonix-api")).unwrap();
        assert_eq!(selected.advanced, Some(Advance::Step(1)));
        assert!(wizard.state().steps()[1].load_status().is_loading());
    }

    #[test]
    #[should_panic]
    fn start_needs_a_runtime() {
        let mut wizard = controller();
        wizard.start();
    }

    #[cfg(feature = "strict-debug")]
    #[tokio::test]
    #[should_panic(expected = "wizard precondition violated")]
    async fn strict_debug_panics_on_early_submit() {
        let mut wizard = controller();
        let _ = wizard.submit();
    }

    #[tokio::test]
    async fn search_filters_options() {
        let mut wizard = controller();
        wizard.start();
        wizard.settle().await;

        assert_eq!(wizard.search(0, "WEB").len(), 1);
        assert_eq!(wizard.search(0, "").len(), 2);
        assert!(wizard.search(7, "x").is_empty());
    }
}
