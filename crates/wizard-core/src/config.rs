//! Controller configuration and declarative wizard manifests
//!
//! Manifests describe a wizard in TOML or JSON:
//!
//! ```toml
//! name = "create-bucket"
//!
//! [config]
//! load_timeout_ms = 5000
//!
//! [[step]]
//! id = "name"
//! kind = "input"
//! pattern = "^[a-z0-9]([a-z0-9-]{1,61}[a-z0-9])?$"
//! message = "Bucket name must be 3-63 lowercase alphanum/hyphens."
//!
//! [[step]]
//! id = "region"
//! kind = "static"
//! choices = ["us-east-1", "eu-west-1"]
//! ```

use crate::definition::{StepDefinition, Validator, WizardDefinition};
use crate::error::{ConfigError, DefinitionError};
use crate::types::Choice;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// A successful selection on the cursor step also advances
    pub advance_on_select: bool,
    /// Per-load timeout applied around the option source
    pub load_timeout_ms: Option<u64>,
    /// Timeout applied around the submission backend
    pub submit_timeout_ms: Option<u64>,
}

impl WizardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With advance-on-select
    #[inline]
    #[must_use]
    pub fn with_advance_on_select(mut self, enabled: bool) -> Self {
        self.advance_on_select = enabled;
        self
    }

    /// With load timeout
    #[inline]
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// With submission timeout
    #[inline]
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Load timeout as a duration
    #[inline]
    #[must_use]
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Submission timeout as a duration
    #[inline]
    #[must_use]
    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Step kind as written in a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    /// Options from the option source
    #[default]
    Remote,
    /// Inline `choices`
    Static,
    /// Free-form input
    Input,
}

/// One `[[step]]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepManifest {
    /// Step ID
    pub id: String,
    /// Title; defaults to the id
    pub title: Option<String>,
    /// Kind
    pub kind: ManifestKind,
    /// Parent step
    pub depends_on: Option<String>,
    /// Inline choices for static steps
    pub choices: Vec<Choice>,
    /// Reject blank values
    pub required: bool,
    /// Minimum trimmed length
    pub min_length: Option<usize>,
    /// Maximum trimmed length
    pub max_length: Option<usize>,
    /// Regex the value must match
    pub pattern: Option<String>,
    /// Message shown for any validator failure
    pub message: Option<String>,
    /// Auto-select the first loaded option
    pub auto_select_first: bool,
    /// Fallback options for remote steps
    pub fallback: Vec<Choice>,
}

impl StepManifest {
    fn into_definition(self) -> Result<StepDefinition, DefinitionError> {
        let title = self.title.unwrap_or_else(|| self.id.clone());
        let mut step = match self.kind {
            ManifestKind::Remote => StepDefinition::remote(self.id.as_str(), title),
            ManifestKind::Static => StepDefinition::fixed(self.id.as_str(), title, self.choices),
            ManifestKind::Input => StepDefinition::input(self.id.as_str(), title),
        };

        let message = |fallback: String| self.message.clone().unwrap_or(fallback);

        if self.required {
            step = step.with_validator(Validator::required(message(format!(
                "{} is required",
                self.id
            ))));
        }
        if let Some(min) = self.min_length {
            step = step.with_validator(Validator::min_length(
                min,
                message(format!("{} must be at least {min} characters", self.id)),
            ));
        }
        if let Some(max) = self.max_length {
            step = step.with_validator(Validator::max_length(
                max,
                message(format!("{} must be at most {max} characters", self.id)),
            ));
        }
        if let Some(pattern) = &self.pattern {
            step = step.with_validator(Validator::pattern(
                pattern,
                message(format!("{} has an invalid format", self.id)),
            )?);
        }
        if let Some(parent) = self.depends_on {
            step = step.depends_on(parent);
        }
        if self.auto_select_first {
            step = step.auto_select_first();
        }
        if !self.fallback.is_empty() {
            step = step.with_fallback(self.fallback);
        }
        Ok(step)
    }
}

/// Declarative wizard: name, configuration, and steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WizardManifest {
    /// Wizard name
    pub name: String,
    /// Controller configuration
    #[serde(default)]
    pub config: WizardConfig,
    /// Steps in order
    #[serde(default, rename = "step")]
    pub steps: Vec<StepManifest>,
}

impl WizardManifest {
    /// Parse TOML
    ///
    /// # Errors
    /// `ConfigError::Toml` on malformed input
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Parse JSON
    ///
    /// # Errors
    /// `ConfigError::Json` on malformed input
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load from a `.toml` or `.json` file
    ///
    /// # Errors
    /// I/O, parse, or unsupported-extension errors
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&input),
            Some("json") => Self::from_json_str(&input),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Convert into a checked definition plus its configuration
    ///
    /// # Errors
    /// Any `DefinitionError` raised while building steps or the definition
    pub fn into_definition(self) -> Result<(WizardDefinition, WizardConfig), DefinitionError> {
        let steps = self
            .steps
            .into_iter()
            .map(StepManifest::into_definition)
            .collect::<Result<Vec<_>, _>>()?;
        let definition = WizardDefinition::new(self.name, steps)?;
        tracing::debug!(
            wizard = definition.name(),
            steps = definition.len(),
            "loaded wizard manifest"
        );
        Ok((definition, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const BUCKET: &str = r#"
name = "create-bucket"

[config]
load_timeout_ms = 5000

[[step]]
id = "name"
title = "Bucket name"
kind = "input"
required = true
pattern = "^[a-z0-9]([a-z0-9-]{1,61}[a-z0-9])?$"
message = "Bucket name must be 3-63 lowercase alphanum/hyphens."

[[step]]
id = "region"
kind = "static"
choices = ["us-east-1", { value = "eu-west-1", label = "EU (Ireland)" }]

[[step]]
id = "encryption"
kind = "static"
depends_on = "region"
choices = ["sse-s3", "sse-kms"]
"#;

    #[test]
    fn config_builder() {
        let config = WizardConfig::new()
            .with_advance_on_select(true)
            .with_load_timeout(Duration::from_secs(2));

        assert!(config.advance_on_select);
        assert_eq!(config.load_timeout(), Some(Duration::from_millis(2000)));
        assert_eq!(config.submit_timeout(), None);
    }

    #[test]
    fn parse_toml_manifest() {
        let manifest = WizardManifest::from_toml_str(BUCKET).unwrap();
        assert_eq!(manifest.config.load_timeout_ms, Some(5000));
        assert_eq!(manifest.steps.len(), 3);

        let (def, config) = manifest.into_definition().unwrap();
        assert_eq!(def.name(), "create-bucket");
        assert_eq!(config.load_timeout_ms, Some(5000));

        let name = def.step(0).unwrap();
        assert_eq!(name.title, "Bucket name");
        assert!(name.is_valid(&json!("my-logs")));
        assert_eq!(
            name.validate(&json!("Nope!")),
            Err("Bucket name must be 3-63 lowercase alphanum/hyphens.".to_string())
        );

        assert_eq!(def.step(1).unwrap().title, "region");
        assert_eq!(def.label_for(1, &json!("eu-west-1")), "EU (Ireland)");
        assert_eq!(def.parent_of(2), Some(1));
    }

    #[test]
    fn parse_json_manifest() {
        let manifest = WizardManifest::from_json_str(
            r#"{"name": "deploy", "step": [
                {"id": "image", "fallback": ["ubuntu-22.04"], "auto_select_first": true},
                {"id": "server_name", "kind": "input", "min_length": 2}
            ]}"#,
        )
        .unwrap();

        let (def, config) = manifest.into_definition().unwrap();
        assert_eq!(config, WizardConfig::default());
        let image = def.step(0).unwrap();
        assert!(image.needs_load());
        assert!(image.auto_select_first);
        assert_eq!(image.fallback.len(), 1);
        assert!(!def.step(1).unwrap().is_valid(&json!("a")));
    }

    #[test]
    fn manifest_errors() {
        assert!(matches!(
            WizardManifest::from_toml_str("name = ["),
            Err(ConfigError::Toml(_))
        ));

        let bad_dep = WizardManifest::from_toml_str(
            "name = \"w\"\n[[step]]\nid = \"a\"\ndepends_on = \"b\"\n",
        )
        .unwrap();
        assert!(matches!(
            bad_dep.into_definition(),
            Err(DefinitionError::UnknownDependency { .. })
        ));

        let no_id = WizardManifest::from_toml_str("name = \"w\"\n[[step]]\nkind = \"input\"\n")
            .unwrap();
        assert!(matches!(
            no_id.into_definition(),
            Err(DefinitionError::EmptyStepId(_))
        ));

        let static_fallback = WizardManifest::from_toml_str(
            "name = \"w\"\n[[step]]\nid = \"region\"\nkind = \"static\"\nchoices = [\"us-east-1\"]\nfallback = [\"eu-west-1\"]\n",
        )
        .unwrap();
        assert!(matches!(
            static_fallback.into_definition(),
            Err(DefinitionError::FallbackWithoutLoad(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(BUCKET.as_bytes()).unwrap();

        let manifest = WizardManifest::load(file.path()).unwrap();
        assert_eq!(manifest.name, "create-bucket");

        let other = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            WizardManifest::load(other.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            WizardManifest::load("/nonexistent/wizard.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
