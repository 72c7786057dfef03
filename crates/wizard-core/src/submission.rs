//! Submission coordinator
//!
//! Packages the selections of a fully valid wizard into a create-request and
//! runs it against the [`SubmissionBackend`]. At most one request is in
//! flight: submitting again while one is pending hands back the same shared
//! handle instead of issuing a duplicate.

use crate::definition::WizardDefinition;
use crate::error::{PreconditionError, SubmissionError};
use crate::loader::Completion;
use crate::source::SubmissionBackend;
use crate::types::{Payload, WizardState};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

/// Awaitable outcome of a submission; clones share one request
#[derive(Clone)]
#[must_use = "the handle resolves to the submission outcome"]
pub struct SubmissionHandle {
    inner: Shared<BoxFuture<'static, Result<Value, SubmissionError>>>,
}

impl std::fmt::Debug for SubmissionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionHandle")
            .field("resolved", &self.inner.peek().is_some())
            .finish()
    }
}

impl Future for SubmissionHandle {
    type Output = Result<Value, SubmissionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// Build the create-request from a complete state
///
/// # Errors
/// - `PreconditionError::NotAtConfirm` if the cursor is not on the confirm step
/// - `PreconditionError::IncompleteStep` if any step lacks a valid selection
pub fn build_payload(
    definition: &WizardDefinition,
    state: &WizardState,
) -> Result<Payload, PreconditionError> {
    if !state.is_at_confirm() {
        return Err(PreconditionError::NotAtConfirm {
            cursor: state.cursor(),
            len: state.len(),
        });
    }

    let mut payload = Payload::new();
    for (def, step) in definition.steps().iter().zip(state.steps()) {
        match step.selection() {
            Some(value) if def.is_valid(value) => {
                payload.insert(def.id.to_string(), value.clone());
            }
            _ => {
                return Err(PreconditionError::IncompleteStep {
                    step: def.id.clone(),
                })
            }
        }
    }
    Ok(payload)
}

/// Runs submissions and tracks the one in flight
pub(crate) struct SubmissionCoordinator {
    backend: Arc<dyn SubmissionBackend>,
    timeout: Option<Duration>,
    generation: u64,
    in_flight: Option<SubmissionHandle>,
}

impl SubmissionCoordinator {
    pub(crate) fn new(backend: Arc<dyn SubmissionBackend>, timeout: Option<Duration>) -> Self {
        Self {
            backend,
            timeout,
            generation: 0,
            in_flight: None,
        }
    }

    /// Pending request, if any
    pub(crate) fn in_flight(&self) -> Option<SubmissionHandle> {
        self.in_flight.clone()
    }

    /// Send `payload` and report the outcome on `completions`
    ///
    /// Panics outside a Tokio runtime.
    pub(crate) fn submit(
        &mut self,
        payload: Payload,
        completions: &mpsc::UnboundedSender<Completion>,
    ) -> SubmissionHandle {
        if let Some(handle) = &self.in_flight {
            return handle.clone();
        }

        self.generation += 1;
        let generation = self.generation;
        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;
        tracing::info!(generation, fields = payload.len(), "submitting wizard");

        let request = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, backend.create(payload))
                    .await
                    .unwrap_or_else(|_| {
                        Err(SubmissionError::Timeout(
                            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        ))
                    }),
                None => backend.create(payload).await,
            }
        }
        .boxed()
        .shared();

        let handle = SubmissionHandle { inner: request };
        let driver = handle.clone();
        let completions = completions.clone();
        tokio::spawn(async move {
            let result = driver.await;
            let _ = completions.send(Completion::Submission { generation, result });
        });

        self.in_flight = Some(handle.clone());
        handle
    }

    /// Accept a completion if it belongs to the pending request
    pub(crate) fn complete(&mut self, generation: u64) -> bool {
        if self.in_flight.is_some() && generation == self.generation {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Forget the pending request; its completion will be discarded
    pub(crate) fn abandon(&mut self) {
        if self.in_flight.take().is_some() {
            tracing::debug!(generation = self.generation, "abandoning in-flight submission");
        }
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StepDefinition;
    use crate::source::MockSubmissionBackend;
    use crate::types::StepId;
    use serde_json::json;

    fn definition() -> WizardDefinition {
        WizardDefinition::new(
            "bucket",
            vec![
                StepDefinition::input("name", "Name").require("required"),
                StepDefinition::input("region", "Region"),
            ],
        )
        .unwrap()
    }

    fn complete_state() -> WizardState {
        let mut state = WizardState::new(definition().ids());
        state.steps[0].selection = Some(json!("logs"));
        state.steps[1].selection = Some(json!("us-east-1"));
        state.cursor = 2;
        state
    }

    #[test]
    fn payload_from_complete_state() {
        let payload = build_payload(&definition(), &complete_state()).unwrap();
        assert_eq!(payload["name"], json!("logs"));
        assert_eq!(payload["region"], json!("us-east-1"));
    }

    #[test]
    fn payload_preconditions() {
        let def = definition();
        let mut state = complete_state();

        state.cursor = 1;
        assert_eq!(
            build_payload(&def, &state),
            Err(PreconditionError::NotAtConfirm { cursor: 1, len: 2 })
        );

        state.cursor = 2;
        state.steps[0].selection = Some(json!("  "));
        assert_eq!(
            build_payload(&def, &state),
            Err(PreconditionError::IncompleteStep {
                step: StepId::new("name")
            })
        );
    }

    #[tokio::test]
    async fn duplicate_submit_shares_request() {
        let mut backend = MockSubmissionBackend::new();
        backend
            .expect_create()
            .times(1)
            .returning(|payload| Ok(json!({ "id": "bkt-1", "fields": payload.len() })));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coordinator = SubmissionCoordinator::new(Arc::new(backend), None);

        let first = coordinator.submit(Payload::new(), &tx);
        let second = coordinator.submit(Payload::new(), &tx);

        assert_eq!(first.await, Ok(json!({ "id": "bkt-1", "fields": 0 })));
        assert_eq!(second.await, Ok(json!({ "id": "bkt-1", "fields": 0 })));

        match rx.recv().await.unwrap() {
            Completion::Submission { generation, result } => {
                assert!(coordinator.complete(generation));
                assert!(result.is_ok());
            }
            Completion::Load { .. } => panic!("unexpected load"),
        }
        assert!(coordinator.in_flight().is_none());
    }

    #[tokio::test]
    async fn abandoned_submission_is_not_completed() {
        let mut backend = MockSubmissionBackend::new();
        backend.expect_create().returning(|_| {
            Err(SubmissionError::Transport("connection reset".into()))
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coordinator = SubmissionCoordinator::new(Arc::new(backend), None);

        let handle = coordinator.submit(Payload::new(), &tx);
        coordinator.abandon();

        assert!(handle.await.is_err());
        match rx.recv().await.unwrap() {
            Completion::Submission { generation, .. } => assert!(!coordinator.complete(generation)),
            Completion::Load { .. } => panic!("unexpected load"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submission_timeout() {
        struct Hang;
        #[async_trait::async_trait]
        impl SubmissionBackend for Hang {
            async fn create(&self, _: Payload) -> Result<Value, SubmissionError> {
                std::future::pending().await
            }
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut coordinator =
            SubmissionCoordinator::new(Arc::new(Hang), Some(Duration::from_millis(250)));

        let handle = coordinator.submit(Payload::new(), &tx);
        assert_eq!(handle.await, Err(SubmissionError::Timeout(250)));
    }
}
