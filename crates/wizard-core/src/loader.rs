//! Dependent data loader
//!
//! Issues option loads for steps and stamps each with a per-step generation
//! token. Loads run as spawned tasks and report back over the controller's
//! completion channel; a completion is only applied if its token is still
//! the step's current one. Superseding a load bumps the token; the request
//! itself keeps running and its answer is dropped on arrival.

use crate::error::{LoadError, SubmissionError};
use crate::source::OptionSource;
use crate::types::{Choice, StepId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of an asynchronous request, routed back to the controller
#[derive(Debug)]
pub(crate) enum Completion {
    /// Option load finished
    Load {
        index: usize,
        generation: u64,
        result: Result<Vec<Choice>, LoadError>,
    },
    /// Submission finished
    Submission {
        generation: u64,
        result: Result<Value, SubmissionError>,
    },
}

/// Per-step generation bookkeeping plus the task spawner
pub(crate) struct DependentLoader {
    source: Arc<dyn OptionSource>,
    generations: Vec<u64>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl DependentLoader {
    pub(crate) fn new(
        source: Arc<dyn OptionSource>,
        steps: usize,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            source,
            generations: vec![0; steps],
            completions,
        }
    }

    /// Start a load for `index`, superseding any earlier one for that step
    ///
    /// Returns the generation stamped on the request.
    /// Panics outside a Tokio runtime.
    pub(crate) fn load(&mut self, index: usize, step: StepId, parent: Option<Value>) -> u64 {
        let generation = self.bump(index);
        tracing::debug!(step = %step, generation, "issuing option load");

        let source = Arc::clone(&self.source);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = source.list(&step, parent).await;
            // Receiver gone means the wizard was closed
            let _ = completions.send(Completion::Load {
                index,
                generation,
                result,
            });
        });

        generation
    }

    /// Logically cancel whatever load is outstanding for `index`
    pub(crate) fn supersede(&mut self, index: usize) {
        self.bump(index);
    }

    /// Supersede `from..` (all steps from `from` on)
    pub(crate) fn supersede_from(&mut self, from: usize) {
        for index in from..self.generations.len() {
            self.bump(index);
        }
    }

    /// Check whether a completion still belongs to the step's latest request
    pub(crate) fn is_current(&self, index: usize, generation: u64) -> bool {
        self.generations.get(index) == Some(&generation)
    }

    /// Current generation of a step
    pub(crate) fn generation(&self, index: usize) -> u64 {
        self.generations.get(index).copied().unwrap_or_default()
    }

    fn bump(&mut self, index: usize) -> u64 {
        let slot = &mut self.generations[index];
        *slot += 1;
        *slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockOptionSource;

    fn loader(
        mock: MockOptionSource,
        steps: usize,
    ) -> (DependentLoader, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DependentLoader::new(Arc::new(mock), steps, tx), rx)
    }

    #[tokio::test]
    async fn load_reports_completion_with_generation() {
        let mut mock = MockOptionSource::new();
        mock.expect_list()
            .returning(|step, _| Ok(vec![Choice::from(step.as_str())]));
        let (mut loader, mut rx) = loader(mock, 2);

        let generation = loader.load(1, StepId::new("repo"), None);
        assert_eq!(generation, 1);

        match rx.recv().await.unwrap() {
            Completion::Load {
                index,
                generation,
                result,
            } => {
                assert_eq!(index, 1);
                assert!(loader.is_current(index, generation));
                assert_eq!(result.unwrap()[0].label, "repo");
            }
            Completion::Submission { .. } => panic!("unexpected submission"),
        }
    }

    #[tokio::test]
    async fn newer_load_supersedes_older() {
        let mut mock = MockOptionSource::new();
        mock.expect_list().returning(|_, _| Ok(vec![]));
        let (mut loader, _rx) = loader(mock, 1);

        let first = loader.load(0, StepId::new("project"), None);
        let second = loader.load(0, StepId::new("project"), None);

        assert!(second > first);
        assert!(!loader.is_current(0, first));
        assert!(loader.is_current(0, second));
    }

    #[tokio::test]
    async fn supersede_never_rewinds() {
        let (mut loader, _rx) = loader(MockOptionSource::new(), 3);

        loader.supersede(0);
        loader.supersede_from(1);
        loader.supersede_from(0);

        assert_eq!(loader.generation(0), 2);
        assert_eq!(loader.generation(1), 2);
        assert_eq!(loader.generation(2), 2);
        assert!(!loader.is_current(5, 0));
    }
}
