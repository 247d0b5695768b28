//! Generation summary reporting
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - GenerationReport (domain) is converted to human or JSON representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Generation logic stays pure while supporting multiple presentation needs

use crate::document::SubstitutionOutcome;
use crate::domain::{EnvironmentKind, ForgeError, ForgeResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Supported output formats for generation summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with a variable recap
    Human,
    /// JSON format for programmatic consumption
    Json,
}

/// One substitution decision recorded during generation
#[derive(Debug, Clone, Serialize)]
pub struct SubstitutionRecord {
    /// Configuration key that was written
    pub key: String,
    /// Final value of the key
    pub value: String,
    /// Whether the key replaced an existing line or was appended
    pub outcome: SubstitutionOutcome,
}

/// Summary of one generation run
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Path of the written artifact (set by the I/O wrapper)
    pub artifact: Option<PathBuf>,
    /// Environment kind, for env-file runs
    pub kind: Option<EnvironmentKind>,
    /// Configured domain, for env-file runs
    pub domain: Option<String>,
    /// Every substitution decision, in application order
    pub substitutions: Vec<SubstitutionRecord>,
    /// Service names the compose rule table matched, for compose runs
    pub services: Vec<String>,
    /// When this report was produced
    pub generated_at: DateTime<Utc>,
}

impl GenerationReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            artifact: None,
            kind: None,
            domain: None,
            substitutions: Vec::new(),
            services: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Record one substitution decision
    pub fn record(&mut self, key: &str, value: &str, outcome: SubstitutionOutcome) {
        self.substitutions.push(SubstitutionRecord {
            key: key.to_string(),
            value: value.to_string(),
            outcome,
        });
    }

    /// Set the written artifact path
    pub fn set_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifact = Some(path.into());
    }

    /// Number of keys that replaced an existing line
    pub fn replaced_count(&self) -> usize {
        self.substitutions
            .iter()
            .filter(|r| r.outcome == SubstitutionOutcome::Replaced)
            .count()
    }

    /// Number of keys appended as new lines
    pub fn appended_count(&self) -> usize {
        self.substitutions
            .iter()
            .filter(|r| r.outcome == SubstitutionOutcome::Appended)
            .count()
    }
}

impl Default for GenerationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats generation reports for terminal or machine consumption
#[derive(Debug, Default)]
pub struct ReportFormatter;

impl ReportFormatter {
    /// Format a report in the requested output format
    pub fn format_report(
        &self,
        report: &GenerationReport,
        format: OutputFormat,
    ) -> ForgeResult<String> {
        match format {
            OutputFormat::Human => Ok(self.format_human(report)),
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| ForgeError::manifest(format!("Failed to serialize report: {e}"))),
        }
    }

    fn format_human(&self, report: &GenerationReport) -> String {
        let mut output = String::new();

        if let Some(artifact) = &report.artifact {
            output.push_str(&format!("✅ Generated {}\n", artifact.display()));
        }
        if let Some(kind) = report.kind {
            output.push_str(&format!("   Environment: {kind}\n"));
        }
        if let Some(domain) = &report.domain {
            output.push_str(&format!("   Domain: {domain}\n"));
        }

        if !report.substitutions.is_empty() {
            output.push_str("\n📋 Configured variables:\n");
            for record in &report.substitutions {
                output.push_str(&format!("   {} = {}\n", record.key, record.value));
            }
            output.push_str(&format!(
                "   ({} replaced, {} appended)\n",
                report.replaced_count(),
                report.appended_count()
            ));
        }

        if !report.services.is_empty() {
            output.push_str("\n🐳 Configured services:\n");
            for service in &report.services {
                output.push_str(&format!("   {service}\n"));
            }
        }

        if report.kind == Some(EnvironmentKind::Production) {
            output.push_str("\n⚠️  Next steps for production:\n");
            output.push_str("   1. Review the generated file\n");
            output.push_str("   2. Configure external service connection strings\n");
            output.push_str("   3. Configure the backend secret key\n");
            output.push_str("   4. Deploy with: make prod\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> GenerationReport {
        let mut report = GenerationReport::new();
        report.kind = Some(EnvironmentKind::Production);
        report.domain = Some("example.com".to_string());
        report.set_artifact(".env.production");
        report.record("DOMAIN", "example.com", SubstitutionOutcome::Replaced);
        report.record("NEW_KEY", "value", SubstitutionOutcome::Appended);
        report
    }

    #[test]
    fn test_outcome_counts() {
        let report = sample_report();
        assert_eq!(report.replaced_count(), 1);
        assert_eq!(report.appended_count(), 1);
    }

    #[test]
    fn test_human_format_recaps_variables() {
        let formatted = ReportFormatter
            .format_report(&sample_report(), OutputFormat::Human)
            .unwrap();

        assert!(formatted.contains("Generated .env.production"));
        assert!(formatted.contains("Environment: production"));
        assert!(formatted.contains("DOMAIN = example.com"));
        assert!(formatted.contains("Next steps for production"));
    }

    #[test]
    fn test_human_format_skips_production_checklist_for_development() {
        let mut report = sample_report();
        report.kind = Some(EnvironmentKind::Development);

        let formatted = ReportFormatter.format_report(&report, OutputFormat::Human).unwrap();
        assert!(!formatted.contains("Next steps for production"));
    }

    #[test]
    fn test_json_format_is_parseable() {
        let formatted = ReportFormatter
            .format_report(&sample_report(), OutputFormat::Json)
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&formatted).unwrap();
        assert_eq!(parsed["domain"], "example.com");
        assert_eq!(parsed["kind"], "production");
        assert!(parsed["substitutions"].is_array());
        assert_eq!(parsed["substitutions"][1]["outcome"], "appended");
    }
}
