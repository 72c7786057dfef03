//! Testing utilities for the staged wizard workspace
//!
//! Shared test doubles and fixture wizards.

#![allow(missing_docs)]

pub mod fixtures;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use wizard_core::{
    Choice, LoadError, OptionSource, Payload, StepId, SubmissionBackend, SubmissionError,
};

pub use fixtures::*;

/// A recorded `list` call
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub step: StepId,
    pub parent: Option<Value>,
}

type LoadReply = oneshot::Sender<Result<Vec<Choice>, LoadError>>;

/// Option source whose responses are released by the test, in any order
///
/// Requests are numbered in arrival order.
#[derive(Default)]
pub struct GatedSource {
    slots: Mutex<Vec<(LoadRequest, Option<LoadReply>)>>,
}

impl GatedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<LoadRequest> {
        self.slots.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn request_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Release request `n`; false if it was already answered or never made
    pub fn respond(&self, n: usize, result: Result<Vec<Choice>, LoadError>) -> bool {
        let reply = self.slots.lock().get_mut(n).and_then(|(_, r)| r.take());
        reply.is_some_and(|tx| tx.send(result).is_ok())
    }

    /// Release request `n` with plain string choices
    pub fn respond_with(&self, n: usize, values: &[&str]) -> bool {
        self.respond(n, Ok(choices(values)))
    }

    /// Release every unanswered request with an empty list
    pub fn drain(&self) {
        for (_, reply) in self.slots.lock().iter_mut() {
            if let Some(tx) = reply.take() {
                let _ = tx.send(Ok(Vec::new()));
            }
        }
    }
}

#[async_trait]
impl OptionSource for GatedSource {
    async fn list(&self, step: &StepId, parent: Option<Value>) -> Result<Vec<Choice>, LoadError> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().push((
            LoadRequest {
                step: step.clone(),
                parent,
            },
            Some(tx),
        ));
        rx.await
            .unwrap_or_else(|_| Err(LoadError::Transport("gate closed".into())))
    }
}

type SubmitReply = oneshot::Sender<Result<Value, SubmissionError>>;

/// Submission backend whose outcome is released by the test
#[derive(Default)]
pub struct GatedBackend {
    slots: Mutex<Vec<(Payload, Option<SubmitReply>)>>,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.slots.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn respond(&self, n: usize, result: Result<Value, SubmissionError>) -> bool {
        let reply = self.slots.lock().get_mut(n).and_then(|(_, r)| r.take());
        reply.is_some_and(|tx| tx.send(result).is_ok())
    }
}

#[async_trait]
impl SubmissionBackend for GatedBackend {
    async fn create(&self, payload: Payload) -> Result<Value, SubmissionError> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().push((payload, Some(tx)));
        rx.await
            .unwrap_or_else(|_| Err(SubmissionError::Transport("gate closed".into())))
    }
}

/// Backend answering from a queue of outcomes, recording every payload
///
/// Once the queue is empty it succeeds with `{"id": "res_<n>"}`.
#[derive(Default)]
pub struct ScriptedBackend {
    outcomes: Mutex<VecDeque<Result<Value, SubmissionError>>>,
    payloads: Mutex<Vec<Payload>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(self, outcome: Result<Value, SubmissionError>) -> Self {
        self.outcomes.lock().push_back(outcome);
        self
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.payloads.lock().len()
    }
}

#[async_trait]
impl SubmissionBackend for ScriptedBackend {
    async fn create(&self, payload: Payload) -> Result<Value, SubmissionError> {
        let n = {
            let mut payloads = self.payloads.lock();
            payloads.push(payload);
            payloads.len()
        };
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "id": format!("res_{n}") })))
    }
}

/// Yield until `source` has seen `n` requests
///
/// # Panics
/// If the requests never arrive
pub async fn wait_for_requests(source: &GatedSource, n: usize) {
    for _ in 0..10_000 {
        if source.request_count() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "expected {n} option requests, saw {}",
        source.request_count()
    );
}

/// Yield until `backend` has seen `n` submissions
///
/// # Panics
/// If the submissions never arrive
pub async fn wait_for_submissions(backend: &GatedBackend, n: usize) {
    for _ in 0..10_000 {
        if backend.call_count() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {n} submissions, saw {}", backend.call_count());
}

/// Plain string choices
pub fn choices(values: &[&str]) -> Vec<Choice> {
    values.iter().map(|v| Choice::from(*v)).collect()
}
