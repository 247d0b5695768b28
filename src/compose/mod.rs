//! Production compose manifest generation
//!
//! CDD Principle: Domain Services - The engine applies the rule table to a structured manifest
//! - Development-only services and volumes are pruned, every survivor runs through the rules
//! - Mapping order is preserved end to end, so generated output stays diffable
//! - The manifest is only written after the whole transformation succeeded

pub mod rules;

pub use rules::{ComposeRules, EnvEntry, MemoryBudget, ServiceRule, TraefikRoute};

use crate::domain::{ForgeError, ForgeResult};
use crate::report::GenerationReport;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::PathBuf;

/// Default checked-in compose template
pub const DEFAULT_COMPOSE_TEMPLATE: &str = "templates/docker-compose.yml";
/// Fixed output path for the generated production manifest
pub const DEFAULT_COMPOSE_OUTPUT: &str = "docker-compose-portainer.yml";

/// Options for one compose generation run
#[derive(Debug, Clone)]
pub struct ComposeGenOptions {
    /// Template to read; defaults to [`DEFAULT_COMPOSE_TEMPLATE`]
    pub template_path: PathBuf,
    /// Output path; defaults to [`DEFAULT_COMPOSE_OUTPUT`]
    pub output_path: PathBuf,
    /// Optional rule file; the built-in table is used when absent
    pub rules_path: Option<PathBuf>,
}

impl Default for ComposeGenOptions {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_COMPOSE_TEMPLATE),
            output_path: PathBuf::from(DEFAULT_COMPOSE_OUTPUT),
            rules_path: None,
        }
    }
}

/// Apply the per-service rules to one service configuration
///
/// Unmatched service names only receive internal-network membership; every
/// other edit requires a rule in the table.
pub fn transform_service(
    service: &mut Mapping,
    service_name: &str,
    rules: &ComposeRules,
) -> ForgeResult<()> {
    let rule = rules.rule(service_name);

    // Routing labels: drop stale traefik entries, then append the fixed list
    if let Some(route) = rule.and_then(|r| r.traefik.as_ref()) {
        let labels = ensure_sequence(service, "labels", service_name)?;
        labels.retain(|label| !label.as_str().map_or(false, |s| s.starts_with("traefik.")));
        labels.extend(route.labels(&rules.frontend_network).into_iter().map(Value::String));
    }

    // Network membership, duplicate-free
    let wants_frontend = rule.map_or(false, |r| r.frontend_network);
    let networks = ensure_sequence(service, "networks", service_name)?;
    if wants_frontend && !sequence_contains(networks, &rules.frontend_network) {
        networks.push(Value::String(rules.frontend_network.clone()));
    }
    if !sequence_contains(networks, &rules.internal_network) {
        networks.push(Value::String(rules.internal_network.clone()));
    }

    let Some(rule) = rule else {
        return Ok(());
    };

    // Resource budget under deploy/resources
    if let Some(memory) = &rule.memory {
        let deploy = ensure_mapping(service, "deploy", service_name)?;
        let resources = ensure_mapping(deploy, "resources", service_name)?;
        let limits = ensure_mapping(resources, "limits", service_name)?;
        limits.insert("memory".into(), Value::String(memory.limit.clone()));
        let reservations = ensure_mapping(resources, "reservations", service_name)?;
        reservations.insert("memory".into(), Value::String(memory.reservation.clone()));
    }

    if let Some(replicas) = &rule.replicas {
        let deploy = ensure_mapping(service, "deploy", service_name)?;
        deploy.insert("replicas".into(), Value::String(replicas.clone()));
    }

    // Merge production environment; keys outside the fixed set are kept
    if !rule.environment.is_empty() {
        let environment = ensure_mapping(service, "environment", service_name)?;
        for entry in &rule.environment {
            environment
                .insert(Value::String(entry.key.clone()), Value::String(entry.value.clone()));
        }
    }

    if let Some(command) = &rule.command {
        service.insert("command".into(), Value::String(command.clone()));
    }

    Ok(())
}

/// Transform a whole compose document in place
///
/// Returns the names of services the rule table matched, in manifest order.
pub fn transform_manifest(manifest: &mut Value, rules: &ComposeRules) -> ForgeResult<Vec<String>> {
    let root = manifest
        .as_mapping_mut()
        .ok_or_else(|| ForgeError::manifest("Compose document root must be a mapping"))?;

    let services = root
        .get_mut("services")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| ForgeError::manifest("Compose document must contain a 'services' mapping"))?;

    for name in &rules.dev_services {
        services.shift_remove(name.as_str());
    }

    let mut configured = Vec::new();
    for (name, config) in services.iter_mut() {
        let name = name
            .as_str()
            .ok_or_else(|| ForgeError::manifest("Service names must be strings"))?
            .to_string();
        let config = config
            .as_mapping_mut()
            .ok_or_else(|| ForgeError::manifest(format!("Service '{name}' must be a mapping")))?;

        transform_service(config, &name, rules)?;
        if rules.rule(&name).is_some() {
            configured.push(name);
        }
    }

    if let Some(volumes) = root.get_mut("volumes").and_then(Value::as_mapping_mut) {
        for name in &rules.dev_volumes {
            volumes.shift_remove(name.as_str());
        }
    }

    root.insert("networks".into(), network_definitions(rules));

    Ok(configured)
}

/// Render the production manifest from template content
pub fn render_compose(
    template_yaml: &str,
    rules: &ComposeRules,
    template_label: &str,
) -> ForgeResult<(String, Vec<String>)> {
    let mut manifest: Value = serde_yaml::from_str(template_yaml)
        .map_err(|e| ForgeError::manifest(format!("Failed to parse compose template: {e}")))?;

    let configured = transform_manifest(&mut manifest, rules)?;

    let body = serde_yaml::to_string(&manifest)
        .map_err(|e| ForgeError::manifest(format!("Failed to serialize compose manifest: {e}")))?;

    Ok((format!("{}{}", generated_banner(template_label), body), configured))
}

/// Generate the production manifest on disk
pub fn generate_compose_file(options: &ComposeGenOptions) -> ForgeResult<GenerationReport> {
    if !options.template_path.exists() {
        return Err(ForgeError::not_found(&options.template_path));
    }
    let template = fs::read_to_string(&options.template_path)?;

    let rules = match &options.rules_path {
        Some(path) => ComposeRules::load_from_file(path)?,
        None => ComposeRules::with_defaults(),
    };

    let label = options.template_path.display().to_string();
    let (content, configured) = render_compose(&template, &rules, &label)?;

    fs::write(&options.output_path, content)?;
    tracing::info!("Wrote {}", options.output_path.display());

    let mut report = GenerationReport::new();
    report.set_artifact(&options.output_path);
    report.services = configured;
    Ok(report)
}

fn generated_banner(template: &str) -> String {
    format!(
        "# Auto-generated from {template} by deploy-forge\n\
         # DO NOT EDIT MANUALLY - Make changes to {template} and regenerate\n\n"
    )
}

/// Fixed production network topology, overwriting any prior definition
fn network_definitions(rules: &ComposeRules) -> Value {
    let mut frontend = Mapping::new();
    frontend.insert("external".into(), Value::Bool(true));
    frontend.insert("name".into(), Value::String(rules.frontend_network.clone()));

    let mut internal = Mapping::new();
    internal.insert("driver".into(), Value::String("bridge".to_string()));
    internal.insert("internal".into(), Value::Bool(false));

    let mut networks = Mapping::new();
    networks.insert(Value::String(rules.frontend_network.clone()), Value::Mapping(frontend));
    networks.insert(Value::String(rules.internal_network.clone()), Value::Mapping(internal));
    Value::Mapping(networks)
}

/// Fetch `key` as a mutable sequence, creating it when absent or null
fn ensure_sequence<'a>(
    map: &'a mut Mapping,
    key: &str,
    service: &str,
) -> ForgeResult<&'a mut Vec<Value>> {
    let slot = map.entry(Value::from(key)).or_insert_with(|| Value::Sequence(Vec::new()));
    if slot.is_null() {
        *slot = Value::Sequence(Vec::new());
    }
    match slot {
        Value::Sequence(sequence) => Ok(sequence),
        _ => Err(ForgeError::manifest(format!(
            "'{key}' of service '{service}' must be a sequence"
        ))),
    }
}

/// Fetch `key` as a mutable mapping, creating it when absent or null
fn ensure_mapping<'a>(
    map: &'a mut Mapping,
    key: &str,
    service: &str,
) -> ForgeResult<&'a mut Mapping> {
    let slot = map.entry(Value::from(key)).or_insert_with(|| Value::Mapping(Mapping::new()));
    if slot.is_null() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ForgeError::manifest(format!(
            "'{key}' of service '{service}' must be a mapping"
        ))),
    }
}

fn sequence_contains(sequence: &[Value], needle: &str) -> bool {
    sequence.iter().any(|value| value.as_str() == Some(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEMPLATE: &str = "\
services:
  querido-diario-api:
    image: querido-diario-api:latest
    labels:
      - traefik.enable=false
      - com.example.team=search
    environment:
      QUERIDO_DIARIO_OPENSEARCH_HOST: opensearch
      QUERIDO_DIARIO_SUGGESTION_MAILJET_API_KEY: local-key
  querido-diario-backend:
    image: querido-diario-backend:latest
    command: python manage.py runserver 0.0.0.0:8000
  celery-worker:
    image: querido-diario-backend:latest
  redis:
    image: redis:7
  postgres:
    image: postgres:14
  opensearch:
    image: opensearchproject/opensearch:2
  minio:
    image: minio/minio
volumes:
  postgres-data: ~
  opensearch-data: ~
  minio-data: ~
  backend-static: ~
networks:
  default:
    driver: bridge
";

    fn rendered() -> (Value, Vec<String>) {
        let rules = ComposeRules::with_defaults();
        let (content, configured) =
            render_compose(TEMPLATE, &rules, "templates/docker-compose.yml").unwrap();
        let manifest: Value = serde_yaml::from_str(&content).unwrap();
        (manifest, configured)
    }

    fn service<'a>(manifest: &'a Value, name: &str) -> &'a Value {
        &manifest["services"][name]
    }

    #[test]
    fn test_development_services_and_volumes_are_removed() {
        let (manifest, _) = rendered();
        let services = manifest["services"].as_mapping().unwrap();

        for gone in ["postgres", "opensearch", "minio"] {
            assert!(!services.contains_key(gone), "{gone} must be pruned");
        }

        let volumes = manifest["volumes"].as_mapping().unwrap();
        for gone in ["postgres-data", "opensearch-data", "minio-data"] {
            assert!(!volumes.contains_key(gone), "{gone} must be pruned");
        }
        assert!(volumes.contains_key("backend-static"));
    }

    #[test]
    fn test_api_labels_replace_stale_traefik_entries() {
        let (manifest, _) = rendered();
        let labels = service(&manifest, "querido-diario-api")["labels"]
            .as_sequence()
            .unwrap();
        let labels: Vec<&str> = labels.iter().filter_map(Value::as_str).collect();

        // The stale traefik.enable=false is gone, unrelated labels survive
        assert!(!labels.contains(&"traefik.enable=false"));
        assert_eq!(labels[0], "com.example.team=search");
        assert!(labels.contains(&"traefik.enable=true"));
        assert!(labels.contains(
            &"traefik.http.services.querido-diario-api.loadbalancer.server.port=8080"
        ));
        assert!(labels.contains(
            &"traefik.http.middlewares.https-redirect.redirectscheme.scheme=https"
        ));
    }

    #[test]
    fn test_network_membership() {
        let (manifest, _) = rendered();

        let api_networks = service(&manifest, "querido-diario-api")["networks"]
            .as_sequence()
            .unwrap();
        assert!(sequence_contains(api_networks, "frontend"));
        assert!(sequence_contains(api_networks, "querido-diario-internal"));

        // Internal-only services never join the frontend network
        let redis_networks = service(&manifest, "redis")["networks"].as_sequence().unwrap();
        assert!(!sequence_contains(redis_networks, "frontend"));
        assert!(sequence_contains(redis_networks, "querido-diario-internal"));
    }

    #[test]
    fn test_transform_is_idempotent_for_network_membership() {
        let rules = ComposeRules::with_defaults();
        let mut manifest: Value = serde_yaml::from_str(TEMPLATE).unwrap();
        transform_manifest(&mut manifest, &rules).unwrap();
        transform_manifest(&mut manifest, &rules).unwrap();

        let networks = manifest["services"]["redis"]["networks"].as_sequence().unwrap();
        assert_eq!(networks.len(), 1);
    }

    #[test]
    fn test_worker_gets_replicas_and_memory_but_no_labels() {
        let (manifest, _) = rendered();
        let worker = service(&manifest, "celery-worker");

        assert_eq!(
            worker["deploy"]["replicas"].as_str(),
            Some("${CELERY_WORKER_REPLICAS:-2}")
        );
        assert_eq!(
            worker["deploy"]["resources"]["limits"]["memory"].as_str(),
            Some("${CELERY_WORKER_MEMORY_LIMIT:-1G}")
        );
        assert_eq!(
            worker["deploy"]["resources"]["reservations"]["memory"].as_str(),
            Some("${CELERY_WORKER_MEMORY_RESERVATION:-512M}")
        );
        assert!(worker["labels"].is_null(), "worker must not receive routing labels");
    }

    #[test]
    fn test_api_environment_externalizes_hardcoded_hosts() {
        let (manifest, _) = rendered();
        let environment = service(&manifest, "querido-diario-api")["environment"]
            .as_mapping()
            .unwrap();

        // The hard-coded local host is replaced with a placeholder reference
        assert_eq!(
            environment.get("QUERIDO_DIARIO_OPENSEARCH_HOST").and_then(Value::as_str),
            Some("${QUERIDO_DIARIO_OPENSEARCH_HOST}")
        );
        // Keys outside the fixed set survive untouched
        assert_eq!(
            environment
                .get("QUERIDO_DIARIO_SUGGESTION_MAILJET_API_KEY")
                .and_then(Value::as_str),
            Some("local-key")
        );
        assert_eq!(
            environment.get("QUERIDO_DIARIO_DEBUG").and_then(Value::as_str),
            Some("${QUERIDO_DIARIO_DEBUG:-False}")
        );
    }

    #[test]
    fn test_backend_command_is_replaced() {
        let (manifest, _) = rendered();
        let command = service(&manifest, "querido-diario-backend")["command"]
            .as_str()
            .unwrap();
        assert!(command.starts_with("gunicorn config.wsgi:application"));
        assert!(command.contains("${BACKEND_WORKERS:-2}"));
    }

    #[test]
    fn test_unmatched_service_only_gains_internal_network() {
        let rules = ComposeRules::with_defaults();
        let template = "services:\n  unknown-service:\n    image: busybox\n";
        let mut manifest: Value = serde_yaml::from_str(template).unwrap();
        transform_manifest(&mut manifest, &rules).unwrap();

        let unknown = manifest["services"]["unknown-service"].as_mapping().unwrap();
        assert!(unknown.contains_key("image"));
        assert!(unknown.contains_key("networks"));
        assert!(!unknown.contains_key("labels"));
        assert!(!unknown.contains_key("deploy"));
        assert!(!unknown.contains_key("command"));
    }

    #[test]
    fn test_network_definitions_are_rewritten() {
        let (manifest, _) = rendered();
        let networks = manifest["networks"].as_mapping().unwrap();

        assert!(!networks.contains_key("default"), "prior definition is overwritten");
        assert_eq!(networks["frontend"]["external"].as_bool(), Some(true));
        assert_eq!(networks["frontend"]["name"].as_str(), Some("frontend"));
        assert_eq!(
            networks["querido-diario-internal"]["driver"].as_str(),
            Some("bridge")
        );
        assert_eq!(networks["querido-diario-internal"]["internal"].as_bool(), Some(false));
    }

    #[test]
    fn test_configured_services_follow_manifest_order() {
        let (_, configured) = rendered();
        assert_eq!(
            configured,
            vec!["querido-diario-api", "querido-diario-backend", "celery-worker", "redis"]
        );
    }

    #[test]
    fn test_service_order_is_preserved_in_output() {
        let rules = ComposeRules::with_defaults();
        let (content, _) =
            render_compose(TEMPLATE, &rules, "templates/docker-compose.yml").unwrap();

        let api = content.find("querido-diario-api:").unwrap();
        let backend = content.find("querido-diario-backend:").unwrap();
        let worker = content.find("celery-worker:").unwrap();
        let redis = content.find("redis:").unwrap();
        assert!(api < backend && backend < worker && worker < redis);
    }

    #[test]
    fn test_banner_warns_against_manual_edits() {
        let rules = ComposeRules::with_defaults();
        let (content, _) =
            render_compose(TEMPLATE, &rules, "templates/docker-compose.yml").unwrap();

        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("# Auto-generated from templates/docker-compose.yml by deploy-forge")
        );
        assert!(lines.next().unwrap().starts_with("# DO NOT EDIT MANUALLY"));
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let rules = ComposeRules::with_defaults();
        let err = render_compose("- a\n- b\n", &rules, "x.yml").unwrap_err();
        assert!(matches!(err, ForgeError::Manifest { .. }));
    }

    #[test]
    fn test_missing_services_mapping_is_rejected() {
        let rules = ComposeRules::with_defaults();
        let err = render_compose("volumes: {}\n", &rules, "x.yml").unwrap_err();
        assert!(matches!(err, ForgeError::Manifest { .. }));
    }

    #[test]
    fn test_generate_writes_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let template_path = temp_dir.path().join("docker-compose.yml");
        fs::write(&template_path, TEMPLATE).unwrap();

        let options = ComposeGenOptions {
            template_path: template_path.clone(),
            output_path: temp_dir.path().join("docker-compose-portainer.yml"),
            rules_path: None,
        };

        let report = generate_compose_file(&options).unwrap();

        let written = fs::read_to_string(&options.output_path).unwrap();
        assert!(written.starts_with("# Auto-generated from"));
        assert!(report.services.contains(&"querido-diario-api".to_string()));
    }

    #[test]
    fn test_generate_missing_template_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let options = ComposeGenOptions {
            template_path: temp_dir.path().join("absent.yml"),
            output_path: temp_dir.path().join("out.yml"),
            rules_path: None,
        };

        let err = generate_compose_file(&options).unwrap_err();
        assert!(matches!(err, ForgeError::NotFound { .. }));
        assert!(!options.output_path.exists());
    }
}
