//! Env file generation pipeline
//!
//! CDD Principle: Domain Services - The generator orchestrates the leaf transformations
//! - Compose domain variables, substitute, strip the stale overrides section,
//!   apply fixed settings and operator overrides, prepend the header, collapse
//! - The pure pipeline is separated from the I/O wrapper, which writes only on full success

use crate::document;
use crate::domain::{Domain, EnvironmentKind, ForgeError, ForgeResult, VariableMap};
use crate::report::GenerationReport;
use crate::variables::{compose_domain_variables, environment_settings};
use chrono::Local;
use std::fs;
use std::path::PathBuf;

/// Default checked-in template the generation starts from
pub const DEFAULT_ENV_TEMPLATE: &str = "templates/env.complete.sample";

/// Markers delimiting the production-overrides block in the template
///
/// The block carries sample production values for documentation. It is
/// stripped before substitution output so the composed values are not
/// duplicated.
pub const PRODUCTION_SECTION_START: &str = "# PRODUCTION-START";
pub const PRODUCTION_SECTION_END: &str = "# PRODUCTION-END";

/// Options for one env-file generation run
#[derive(Debug, Clone)]
pub struct EnvGenOptions {
    /// Environment to generate for
    pub kind: EnvironmentKind,
    /// Base hostname all derived URLs are built from
    pub domain: Domain,
    /// Template to read; defaults to [`DEFAULT_ENV_TEMPLATE`]
    pub template_path: PathBuf,
    /// Output path; defaults to the kind's fixed filename
    pub output_path: PathBuf,
    /// Optional override file applied after the composed values
    pub override_path: Option<PathBuf>,
}

impl EnvGenOptions {
    /// Options with the fixed template and output paths for a kind
    pub fn new(kind: EnvironmentKind, domain: Domain) -> Self {
        Self {
            kind,
            domain,
            template_path: PathBuf::from(DEFAULT_ENV_TEMPLATE),
            output_path: PathBuf::from(kind.env_file_name()),
            override_path: None,
        }
    }
}

/// Run the pure env-file pipeline over template content
///
/// Returns the generated document alongside a report of every substitution
/// decision. Nothing is read from or written to disk.
pub fn render_env(
    template: &str,
    domain: &Domain,
    kind: EnvironmentKind,
    overrides: Option<&VariableMap>,
) -> ForgeResult<(String, GenerationReport)> {
    let mut report = GenerationReport::new();
    report.kind = Some(kind);
    report.domain = Some(domain.as_str().to_string());

    let domain_vars = compose_domain_variables(domain, kind);
    let mut content = apply_recorded(template, &domain_vars, &mut report)?;

    // Drop the stale sample block before the remaining passes re-set its keys
    content = document::strip_section(&content, PRODUCTION_SECTION_START, PRODUCTION_SECTION_END)?;

    content = apply_recorded(&content, &environment_settings(kind), &mut report)?;

    if let Some(overrides) = overrides {
        content = apply_recorded(&content, overrides, &mut report)?;
    }

    let generated = format!("{}{}", environment_header(kind, domain), content);
    Ok((document::collapse_blank_lines(&generated), report))
}

fn apply_recorded(
    content: &str,
    vars: &VariableMap,
    report: &mut GenerationReport,
) -> ForgeResult<String> {
    document::apply_variables(content, vars, |key, value, outcome| {
        tracing::debug!("{} {} = {}", outcome.as_str(), key, value);
        report.record(key, value, outcome);
    })
}

/// Generate the env file on disk
///
/// Reads the template, runs the pipeline, and writes the output path only
/// after the whole pipeline succeeded, so a failing run leaves no partial
/// artifact behind.
pub fn generate_env_file(options: &EnvGenOptions) -> ForgeResult<GenerationReport> {
    if !options.template_path.exists() {
        return Err(ForgeError::not_found(&options.template_path));
    }
    let template = fs::read_to_string(&options.template_path)?;

    let overrides = match &options.override_path {
        Some(path) => Some(crate::overrides::load_overrides(path)?),
        None => None,
    };

    let (content, mut report) =
        render_env(&template, &options.domain, options.kind, overrides.as_ref())?;

    fs::write(&options.output_path, content)?;
    report.set_artifact(&options.output_path);
    tracing::info!("Wrote {}", options.output_path.display());

    Ok(report)
}

/// Header block prepended to every generated env file
fn environment_header(kind: EnvironmentKind, domain: &Domain) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    match kind {
        EnvironmentKind::Development => format!(
            "# Querido Diário - Development Environment\n\
             # ==========================================\n\
             #\n\
             # Auto-generated on {timestamp}\n\
             # Domain configured: {domain}\n\
             #\n\
             # Configured URLs:\n\
             # • Frontend: http://localhost:4200 (development server)\n\
             # • API: http://localhost:8080 → api.{domain} (via Traefik)\n\
             # • Backend: http://localhost:8000 → backend-api.{domain} (via Traefik)\n\
             #\n\
             # To regenerate: make setup-env-dev\n\n"
        ),
        EnvironmentKind::Production => format!(
            "# Querido Diário - Production Environment\n\
             # =========================================\n\
             #\n\
             # Auto-generated on {timestamp}\n\
             # Domain configured: {domain}\n\
             #\n\
             # Configured URLs:\n\
             # • Frontend: https://{domain}\n\
             # • API: https://api.{domain}\n\
             # • Backend/Admin: https://backend-api.{domain}\n\
             #\n\
             # To regenerate: make setup-env-prod\n\
             #\n\
             # IMPORTANT: Review and configure before deploying:\n\
             # - External database connection strings\n\
             # - OpenSearch endpoints and credentials\n\
             # - Storage endpoints and credentials\n\
             # - Email service credentials\n\
             # - Django secret key (QD_BACKEND_SECRET_KEY)\n\n"
        ),
    }
}
