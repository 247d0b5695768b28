//! deploy-forge - Environment file and compose manifest generation
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure composition and substitution logic separated from file-system concerns
//! - Clean boundaries between the two generation pipelines and their shared primitives
//! - The CLI is one thin caller among possible others (Makefiles, release tooling)

pub mod compose;
pub mod document;
pub mod domain;
pub mod envfile;
pub mod overrides;
pub mod report;
pub mod variables;

// Re-export main types for convenient access
pub use domain::{
    Domain, EnvironmentKind, ForgeError, ForgeResult, VariableMap, DEFAULT_DOMAIN,
};

pub use document::{apply, apply_variables, collapse_blank_lines, strip_section, SubstitutionOutcome};

pub use variables::{compose_domain_variables, environment_settings};

pub use overrides::{load_overrides, parse_overrides};

pub use envfile::{generate_env_file, render_env, EnvGenOptions};

pub use compose::{
    generate_compose_file, render_compose, ComposeGenOptions, ComposeRules, ServiceRule,
};

pub use report::{GenerationReport, OutputFormat, ReportFormatter};

/// Generate an env file with the fixed template and output paths for a kind
pub fn generate_env(kind: EnvironmentKind, domain: Domain) -> ForgeResult<GenerationReport> {
    envfile::generate_env_file(&EnvGenOptions::new(kind, domain))
}

/// Generate the production compose manifest with the fixed paths
pub fn generate_compose() -> ForgeResult<GenerationReport> {
    compose::generate_compose_file(&ComposeGenOptions::default())
}
