//! Fixture wizards and their option tables

use crate::choices;
use wizard_core::{
    Choice, StaticOptionSource, StepDefinition, Validator, WizardDefinition,
};

/// Bucket name rule: 3-63 lowercase alphanumerics or hyphens
pub const BUCKET_NAME_PATTERN: &str = "^[a-z0-9]([a-z0-9-]{1,61}[a-z0-9])?$";

/// project -> repo -> file -> pipeline, plus branch keyed by repo
pub fn pipeline_wizard() -> WizardDefinition {
    WizardDefinition::new(
        "run-pipeline",
        vec![
            StepDefinition::remote("project", "Select Project"),
            StepDefinition::remote("repo", "Select Repository").depends_on("project"),
            StepDefinition::remote("file", "Select Pipeline File").depends_on("repo"),
            StepDefinition::remote("pipeline", "Select Pipeline").depends_on("file"),
            StepDefinition::remote("branch", "Select Branch")
                .depends_on("repo")
                .auto_select_first(),
        ],
    )
    .expect("pipeline fixture is well-formed")
}

/// Option tables for [`pipeline_wizard`]
pub fn pipeline_source() -> StaticOptionSource {
    StaticOptionSource::new()
        .with_root(
            "project",
            vec![
                Choice::new("proj_123", "atonix-api").with_description("API backend"),
                Choice::new("proj_124", "atonix-web").with_description("Frontend application"),
            ],
        )
        .with_children(
            "repo",
            "proj_123",
            vec![
                Choice::new("repo_456", "atonix-api"),
                Choice::new("repo_457", "atonix-api-mobile"),
            ],
        )
        .with_children("repo", "proj_124", vec![Choice::new("repo_458", "atonix-web")])
        .with_children(
            "file",
            "repo_456",
            vec![
                Choice::new("file_789", ".atonix/pipeline.yaml"),
                Choice::new("file_790", ".atonix/pipelines/deploy.yaml"),
            ],
        )
        .with_children("file", "repo_457", vec![Choice::new("file_791", ".atonix/pipeline.yaml")])
        .with_children("file", "repo_458", vec![Choice::new("file_792", ".atonix/pipeline.yaml")])
        .with_children("pipeline", "file_789", choices(&["build", "deploy"]))
        .with_children("pipeline", "file_790", choices(&["deploy-prod"]))
        .with_children("pipeline", "file_791", choices(&["build"]))
        .with_children("pipeline", "file_792", choices(&["build-deploy"]))
        .with_children("branch", "repo_456", choices(&["main", "develop", "feature/login"]))
        .with_children("branch", "repo_457", choices(&["develop", "main"]))
        .with_children("branch", "repo_458", choices(&["main", "staging"]))
}

/// Bucket creation: validated name, static region and encryption
pub fn bucket_wizard() -> WizardDefinition {
    WizardDefinition::new(
        "create-bucket",
        vec![
            StepDefinition::input("bucket_name", "Bucket name")
                .require("Bucket name is required")
                .with_validator(
                    Validator::pattern(
                        BUCKET_NAME_PATTERN,
                        "Bucket name must be 3-63 lowercase alphanum/hyphens.",
                    )
                    .expect("bucket pattern compiles"),
                ),
            StepDefinition::fixed(
                "region",
                "Region",
                vec![
                    Choice::new("us-east-1", "US East (New York)"),
                    Choice::new("us-west-1", "US West (Los Angeles)"),
                    Choice::new("eu-west-1", "Europe (Frankfurt)"),
                    Choice::new("ap-south-1", "Asia Pacific (Singapore)"),
                    Choice::new("af-south-1", "Africa (Johannesburg)"),
                ],
            ),
            StepDefinition::fixed(
                "encryption_type",
                "Encryption",
                vec![
                    Choice::new("sse-s3", "SSE-S3").with_description("Managed by the provider"),
                    Choice::new("sse-kms", "SSE-KMS").with_description("Your KMS key"),
                ],
            ),
        ],
    )
    .expect("bucket fixture is well-formed")
}

/// Server deployment: image and flavor with fallbacks, then a name
pub fn deploy_wizard() -> WizardDefinition {
    WizardDefinition::new(
        "deploy-server",
        vec![
            StepDefinition::remote("image", "Choose Image").with_fallback(fallback_images()),
            StepDefinition::remote("flavor", "Choose Flavor").with_fallback(fallback_flavors()),
            StepDefinition::input("server_name", "Name").with_validator(Validator::min_length(
                2,
                "Server name must be at least 2 characters",
            )),
        ],
    )
    .expect("deploy fixture is well-formed")
}

pub fn fallback_images() -> Vec<Choice> {
    vec![
        Choice::new("ubuntu-22", "Ubuntu 22.04 LTS"),
        Choice::new("debian-12", "Debian 12"),
        Choice::new("centos-9", "CentOS Stream 9"),
        Choice::new("win-2022", "Windows Server 2022"),
    ]
}

pub fn fallback_flavors() -> Vec<Choice> {
    vec![
        Choice::new("small", "Starter").with_description("1 vCPU, 1 GB"),
        Choice::new("medium", "Standard").with_description("2 vCPU, 4 GB"),
        Choice::new("large", "Performance").with_description("4 vCPU, 8 GB"),
        Choice::new("gpu-v1", "GPU Compute").with_description("8 vCPU, 32 GB, GPU"),
    ]
}

/// Three chained remote steps `a -> b -> c`
pub fn three_step_wizard() -> WizardDefinition {
    WizardDefinition::new(
        "three-step",
        vec![
            StepDefinition::remote("a", "Step A"),
            StepDefinition::remote("b", "Step B").depends_on("a"),
            StepDefinition::remote("c", "Step C").depends_on("b"),
        ],
    )
    .expect("three-step fixture is well-formed")
}
