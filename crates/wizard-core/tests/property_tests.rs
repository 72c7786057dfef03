//! Property tests over random operation sequences

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use wizard_core::{StaticOptionSource, WizardController, WizardState};
use wizard_test_utils::{choices, three_step_wizard, ScriptedBackend};

const VALUES: [&str; 7] = ["a1", "a2", "b1", "b2", "b3", "c1", "zz"];

#[derive(Debug, Clone)]
enum Op {
    Select(usize, usize),
    Next,
    Back,
    Settle,
    Retry,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, 0..VALUES.len()).prop_map(|(step, value)| Op::Select(step, value)),
        Just(Op::Next),
        Just(Op::Back),
        Just(Op::Settle),
        Just(Op::Retry),
    ]
}

fn source() -> StaticOptionSource {
    StaticOptionSource::new()
        .with_root("a", choices(&["a1", "a2"]))
        .with_children("b", "a1", choices(&["b1", "b2"]))
        .with_children("b", "a2", choices(&["b3"]))
        .with_children("c", "b1", choices(&["c1"]))
        .with_children("c", "b3", choices(&["c1"]))
}

fn controller() -> WizardController {
    WizardController::new(
        three_step_wizard(),
        Arc::new(source()),
        Arc::new(ScriptedBackend::new()),
    )
}

async fn apply(wizard: &mut WizardController, op: &Op) {
    match op {
        Op::Select(step, value) => {
            let _ = wizard.select(*step, json!(VALUES[*value]));
        }
        Op::Next => {
            let _ = wizard.go_next();
        }
        Op::Back => {
            wizard.go_back();
        }
        Op::Settle => {
            wizard.settle().await;
        }
        Op::Retry => {
            wizard.retry();
        }
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn reset_always_restores_initial_state(ops in prop::collection::vec(op_strategy(), 0..30)) {
        let state = block_on(async {
            let mut wizard = controller();
            wizard.start();
            for op in &ops {
                apply(&mut wizard, op).await;
            }
            wizard.reset();
            let after_reset = wizard.state().clone();
            // late completions must not disturb the reset state
            wizard.settle().await;
            prop_assert_eq!(wizard.state(), &after_reset);
            Ok(after_reset)
        })?;

        prop_assert_eq!(state, WizardState::new(three_step_wizard().ids()));
    }

    #[test]
    fn steps_behind_cursor_are_complete(ops in prop::collection::vec(op_strategy(), 0..30)) {
        block_on(async {
            let mut wizard = controller();
            wizard.start();
            for op in &ops {
                apply(&mut wizard, op).await;
                let state = wizard.state();
                prop_assert!(state.cursor() <= state.len());
                for step in &state.steps()[..state.cursor()] {
                    prop_assert!(step.selection().is_some());
                    prop_assert!(!step.load_status().is_loading());
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn reselection_is_idempotent(ops in prop::collection::vec(op_strategy(), 0..20)) {
        block_on(async {
            let mut wizard = controller();
            wizard.start();
            for op in &ops {
                apply(&mut wizard, op).await;
            }
            wizard.settle().await;

            let cursor = wizard.state().cursor();
            let current = wizard
                .state()
                .steps()
                .iter()
                .take(cursor + 1)
                .enumerate()
                .filter_map(|(i, s)| s.selection().cloned().map(|v| (i, v)))
                .last();
            if let Some((index, value)) = current {
                let before = wizard.state().clone();
                let selected = wizard.select(index, value).unwrap();
                prop_assert!(!selected.changed);
                prop_assert_eq!(wizard.state(), &before);
            }
            Ok(())
        })?;
    }

    #[test]
    fn refused_advance_changes_nothing(ops in prop::collection::vec(op_strategy(), 0..20)) {
        block_on(async {
            let mut wizard = controller();
            wizard.start();
            for op in &ops {
                apply(&mut wizard, op).await;
                if wizard.check_next().is_err() {
                    let before = wizard.state().clone();
                    prop_assert!(wizard.go_next().is_err());
                    prop_assert_eq!(wizard.state(), &before);
                }
            }
            Ok(())
        })?;
    }
}
