//! Staged wizard command-line driver
//!
//! `inspect` validates a manifest and prints its step graph; `run` walks a
//! wizard end to end against static option tables and an echoing backend.

#![allow(missing_docs)]

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, Command};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wizard_core::{
    Advance, Payload, StaticOptionSource, StepKind, SubmissionBackend, SubmissionError,
    WizardController, WizardDefinition, WizardEvent, WizardManifest,
};

/// Backend that acknowledges every payload by echoing it
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoBackend;

#[async_trait]
impl SubmissionBackend for EchoBackend {
    async fn create(&self, payload: Payload) -> Result<Value, SubmissionError> {
        Ok(json!({ "status": "created", "payload": payload }))
    }
}

pub fn build_cli() -> Command {
    Command::new("staged-wizard")
        .version(wizard_core::VERSION)
        .about("Drive dependency-chained selection wizards")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log controller events at debug level"),
        )
        .subcommand(
            Command::new("inspect")
                .about("Validate a manifest and print its steps")
                .arg(
                    Arg::new("manifest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Wizard manifest (.toml or .json)"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Walk a wizard to submission")
                .arg(
                    Arg::new("manifest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Wizard manifest (.toml or .json)"),
                )
                .arg(
                    Arg::new("data")
                        .long("data")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON option tables: step -> parent -> choices"),
                )
                .arg(
                    Arg::new("pick")
                        .long("pick")
                        .action(ArgAction::Append)
                        .value_parser(parse_pick)
                        .help("Selection as step=value; value is JSON or a bare string"),
                ),
        )
}

/// Parse `step=value`; the value is read as JSON, falling back to a string
///
/// # Errors
/// A message when `=` or the step name is missing
pub fn parse_pick(input: &str) -> Result<(String, Value), String> {
    let (step, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("expected step=value, got `{input}`"))?;
    let step = step.trim();
    if step.is_empty() {
        return Err(format!("missing step name in `{input}`"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((step.to_string(), value))
}

/// Load a manifest and check it
///
/// # Errors
/// I/O, parse, or definition errors
pub fn load_manifest(path: &Path) -> Result<(WizardDefinition, wizard_core::WizardConfig)> {
    let manifest = WizardManifest::load(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    let (definition, config) = manifest
        .into_definition()
        .with_context(|| format!("invalid wizard in {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        wizard = definition.name(),
        steps = definition.len(),
        "manifest loaded"
    );
    Ok((definition, config))
}

/// Human-readable step graph
#[must_use]
pub fn describe(definition: &WizardDefinition) -> String {
    let mut out = format!("wizard `{}` ({} steps)\n", definition.name(), definition.len());
    for (index, step) in definition.steps().iter().enumerate() {
        let kind = match &step.kind {
            StepKind::Remote => "remote".to_string(),
            StepKind::Static(choices) => format!("static, {} choices", choices.len()),
            StepKind::Input => "input".to_string(),
        };
        let _ = write!(out, "  {}. {} [{}] ({kind})", index + 1, step.title, step.id);
        if let Some(parent) = &step.depends_on {
            let _ = write!(out, " <- {parent}");
        }
        if !step.validators.is_empty() {
            let _ = write!(out, ", {} validators", step.validators.len());
        }
        if step.auto_select_first {
            out.push_str(", auto-select");
        }
        if !step.fallback.is_empty() {
            let _ = write!(out, ", {} fallback", step.fallback.len());
        }
        out.push('\n');
    }
    out
}

fn print_events(events: &[WizardEvent]) {
    for event in events {
        match event {
            WizardEvent::OptionsLoaded { step, count } => println!("  {step}: {count} options"),
            WizardEvent::LoadFailed { step, error } => println!("  {step}: load failed: {error}"),
            WizardEvent::LoadDiscarded { step, generation } => {
                println!("  {step}: discarded stale load #{generation}");
            }
            WizardEvent::Submitted(_) => println!("  submitted"),
            WizardEvent::SubmissionFailed(err) => println!("  submission failed: {err}"),
            WizardEvent::SubmissionDiscarded => println!("  discarded abandoned submission"),
        }
    }
}

/// Walk every step with the given picks, then submit
///
/// A step without a pick keeps whatever was auto-selected.
///
/// # Errors
/// Rejected picks, failed loads, or a failed submission
pub async fn run_wizard(
    definition: WizardDefinition,
    config: wizard_core::WizardConfig,
    source: StaticOptionSource,
    picks: &[(String, Value)],
) -> Result<Value> {
    let mut wizard = WizardController::with_config(
        definition,
        Arc::new(source),
        Arc::new(EchoBackend),
        config.with_advance_on_select(false),
    );
    wizard.start();

    loop {
        print_events(&wizard.settle().await);
        let cursor = wizard.state().cursor();
        let Some(step) = wizard.definition().step(cursor) else {
            break;
        };
        let id = step.id.clone();
        println!("[{}/{}] {}", cursor + 1, wizard.state().len(), step.title);

        if let Some((_, value)) = picks.iter().rev().find(|(s, _)| s == id.as_str()) {
            tracing::debug!(step = %id, value = %value, "applying pick");
            wizard
                .select(cursor, value.clone())
                .with_context(|| format!("pick for `{id}` rejected"))?;
        }
        if let Some(label) = wizard.state().steps()[cursor].selected_label() {
            println!("  -> {label}");
        }
        match wizard.go_next() {
            Ok(Advance::Step(_) | Advance::Confirm) => {}
            Err(err) => bail!("cannot leave `{id}`: {err}"),
        }
    }

    println!("Summary:");
    for entry in wizard.summary() {
        println!("  {}: {}", entry.title, entry.value.unwrap_or_default());
    }

    tracing::info!(wizard = wizard.definition().name(), "submitting");
    let handle = wizard.submit().map_err(|err| anyhow!("cannot submit: {err}"))?;
    let result = handle.await;
    print_events(&wizard.settle().await);
    result.context("submission failed")
}

/// Dispatch parsed arguments
///
/// # Errors
/// Any error from the chosen subcommand
pub async fn execute(matches: &clap::ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("inspect", args)) => {
            let path = args
                .get_one::<PathBuf>("manifest")
                .ok_or_else(|| anyhow!("manifest is required"))?;
            let (definition, config) = load_manifest(path)?;
            print!("{}", describe(&definition));
            println!("config: {}", serde_json::to_string(&config)?);
            Ok(())
        }
        Some(("run", args)) => {
            let path = args
                .get_one::<PathBuf>("manifest")
                .ok_or_else(|| anyhow!("manifest is required"))?;
            let (definition, config) = load_manifest(path)?;
            let source = match args.get_one::<PathBuf>("data") {
                Some(data) => {
                    let input = std::fs::read_to_string(data)
                        .with_context(|| format!("failed to read {}", data.display()))?;
                    StaticOptionSource::from_json_str(&input)
                        .with_context(|| format!("invalid option tables in {}", data.display()))?
                }
                None => {
                    tracing::warn!("no --data given, remote steps will load empty option lists");
                    StaticOptionSource::new()
                }
            };
            let picks: Vec<(String, Value)> = args
                .get_many::<(String, Value)>("pick")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();

            let result = run_wizard(definition, config, source, &picks).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        _ => bail!("unknown command"),
    }
}
