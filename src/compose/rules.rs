//! Per-service transformation rules for the compose generator
//!
//! Architecture: Anti-Corruption Layer - Rules are structured data, not executable branches
//! - Each service name maps to a declarative record of the edits it receives
//! - The built-in table mirrors the checked-in production topology; operators may load their own
//! - Raw YAML rule files are validated before they reach the transformation engine

use crate::domain::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Traefik routing declaration for one public-facing service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraefikRoute {
    /// Router and load-balancer name
    pub router: String,
    /// Host rule, placeholder-substitutable (e.g. `api.${DOMAIN}`)
    pub host: String,
    /// Middleware chain for the HTTPS router
    pub middlewares: String,
    /// Container port the load balancer targets
    pub port: u16,
    /// Whether this route also declares the shared https-redirect middleware
    #[serde(default)]
    pub emit_redirect_middleware: bool,
}

impl TraefikRoute {
    /// Expand the route into its fixed ordered label list
    pub fn labels(&self, frontend_network: &str) -> Vec<String> {
        let TraefikRoute { router, host, middlewares, port, .. } = self;

        let mut labels = vec![
            "traefik.enable=true".to_string(),
            format!("traefik.docker.network={frontend_network}"),
            // HTTP router redirects to HTTPS
            format!("traefik.http.routers.{router}-http.rule=Host(`{host}`)"),
            format!("traefik.http.routers.{router}-http.entrypoints=web"),
            format!("traefik.http.routers.{router}-http.middlewares=https-redirect"),
            // HTTPS router with TLS and the middleware chain
            format!("traefik.http.routers.{router}-https.rule=Host(`{host}`)"),
            format!("traefik.http.routers.{router}-https.entrypoints=websecure"),
            format!("traefik.http.routers.{router}-https.tls=true"),
            format!("traefik.http.routers.{router}-https.tls.certresolver=${{CERT_RESOLVER}}"),
            format!("traefik.http.routers.{router}-https.middlewares={middlewares}"),
            // Load balancer target
            format!("traefik.http.services.{router}.loadbalancer.server.port={port}"),
        ];

        if self.emit_redirect_middleware {
            labels.push(
                "traefik.http.middlewares.https-redirect.redirectscheme.scheme=https".to_string(),
            );
            labels.push(
                "traefik.http.middlewares.https-redirect.redirectscheme.permanent=true"
                    .to_string(),
            );
        }

        labels
    }
}

/// Memory limit/reservation pair, placeholder-substitutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBudget {
    pub limit: String,
    pub reservation: String,
}

/// One production environment entry merged into a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
}

/// The transformation record for one service name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRule {
    /// Exact service name this rule matches
    pub name: String,
    /// Traefik routing labels, public services only
    #[serde(default)]
    pub traefik: Option<TraefikRoute>,
    /// Whether the service joins the external frontend network
    #[serde(default)]
    pub frontend_network: bool,
    /// Memory budget merged into deploy/resources
    #[serde(default)]
    pub memory: Option<MemoryBudget>,
    /// Replica count, placeholder-substitutable
    #[serde(default)]
    pub replicas: Option<String>,
    /// Production environment entries merged into the service
    #[serde(default)]
    pub environment: Vec<EnvEntry>,
    /// Startup command override
    #[serde(default)]
    pub command: Option<String>,
}

/// The full rule set driving the compose transformation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRules {
    /// Development-only services deleted from the manifest
    pub dev_services: Vec<String>,
    /// Named volumes deleted alongside the development services
    pub dev_volumes: Vec<String>,
    /// External network shared with the reverse proxy
    pub frontend_network: String,
    /// Internal bridge network every service joins
    pub internal_network: String,
    /// Per-service transformation records
    pub services: Vec<ServiceRule>,
}

impl ComposeRules {
    /// Load rules from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ForgeError::not_found(path));
        }
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents).map_err(|e| {
            ForgeError::manifest(format!("Failed to load rules from '{}': {}", path.display(), e))
        })
    }

    /// Load rules from string content
    pub fn load_from_str(content: &str) -> ForgeResult<Self> {
        let rules: Self = serde_yaml::from_str(content)
            .map_err(|e| ForgeError::manifest(format!("Failed to parse rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    /// The rule for a service name, if the table carries one
    pub fn rule(&self, service_name: &str) -> Option<&ServiceRule> {
        self.services.iter().find(|rule| rule.name == service_name)
    }

    /// Validate the rule set for consistency
    pub fn validate(&self) -> ForgeResult<()> {
        if self.frontend_network.is_empty() || self.internal_network.is_empty() {
            return Err(ForgeError::manifest("Network names must not be empty"));
        }

        for rule in &self.services {
            let duplicates = self.services.iter().filter(|r| r.name == rule.name).count();
            if duplicates > 1 {
                return Err(ForgeError::manifest(format!(
                    "Duplicate rule for service '{}'",
                    rule.name
                )));
            }

            if let Some(route) = &rule.traefik {
                if route.router.is_empty() || route.host.is_empty() {
                    return Err(ForgeError::manifest(format!(
                        "Service '{}' has an incomplete Traefik route",
                        rule.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// The built-in rule table for the production topology
    pub fn with_defaults() -> Self {
        Self {
            dev_services: vec![
                "postgres".to_string(),
                "opensearch".to_string(),
                "minio".to_string(),
            ],
            dev_volumes: vec![
                "postgres-data".to_string(),
                "opensearch-data".to_string(),
                "minio-data".to_string(),
            ],
            frontend_network: "frontend".to_string(),
            internal_network: "querido-diario-internal".to_string(),
            services: vec![
                ServiceRule {
                    name: "querido-diario-api".to_string(),
                    traefik: Some(TraefikRoute {
                        router: "querido-diario-api".to_string(),
                        host: "api.${DOMAIN}".to_string(),
                        middlewares: "cors-headers,api-rate-limit,security-headers,compression"
                            .to_string(),
                        port: 8080,
                        emit_redirect_middleware: true,
                    }),
                    frontend_network: true,
                    memory: Some(MemoryBudget {
                        limit: "${API_MEMORY_LIMIT:-1G}".to_string(),
                        reservation: "${API_MEMORY_RESERVATION:-512M}".to_string(),
                    }),
                    replicas: None,
                    environment: api_production_environment(),
                    command: None,
                },
                ServiceRule {
                    name: "querido-diario-backend".to_string(),
                    traefik: Some(TraefikRoute {
                        router: "querido-diario-backend".to_string(),
                        host: "backend-api.${DOMAIN}".to_string(),
                        middlewares: "api-rate-limit,security-headers,compression".to_string(),
                        port: 8000,
                        emit_redirect_middleware: false,
                    }),
                    frontend_network: true,
                    memory: Some(MemoryBudget {
                        limit: "${BACKEND_MEMORY_LIMIT:-1G}".to_string(),
                        reservation: "${BACKEND_MEMORY_RESERVATION:-512M}".to_string(),
                    }),
                    replicas: None,
                    environment: backend_production_environment(),
                    command: Some(
                        "gunicorn config.wsgi:application -w ${BACKEND_WORKERS:-2} -b :8000 --log-level info"
                            .to_string(),
                    ),
                },
                ServiceRule {
                    name: "celery-beat".to_string(),
                    traefik: None,
                    frontend_network: false,
                    memory: Some(MemoryBudget {
                        limit: "${CELERY_BEAT_MEMORY_LIMIT:-512M}".to_string(),
                        reservation: "${CELERY_BEAT_MEMORY_RESERVATION:-256M}".to_string(),
                    }),
                    replicas: None,
                    environment: Vec::new(),
                    command: None,
                },
                ServiceRule {
                    name: "celery-worker".to_string(),
                    traefik: None,
                    frontend_network: false,
                    memory: Some(MemoryBudget {
                        limit: "${CELERY_WORKER_MEMORY_LIMIT:-1G}".to_string(),
                        reservation: "${CELERY_WORKER_MEMORY_RESERVATION:-512M}".to_string(),
                    }),
                    replicas: Some("${CELERY_WORKER_REPLICAS:-2}".to_string()),
                    environment: Vec::new(),
                    command: None,
                },
                ServiceRule {
                    name: "querido-diario-data-processing".to_string(),
                    traefik: None,
                    frontend_network: false,
                    memory: Some(MemoryBudget {
                        limit: "${DATA_PROCESSING_MEMORY_LIMIT:-2G}".to_string(),
                        reservation: "${DATA_PROCESSING_MEMORY_RESERVATION:-1G}".to_string(),
                    }),
                    replicas: None,
                    environment: Vec::new(),
                    command: None,
                },
                ServiceRule {
                    name: "apache-tika".to_string(),
                    traefik: None,
                    frontend_network: false,
                    memory: Some(MemoryBudget {
                        limit: "${APACHE_TIKA_MEMORY_LIMIT:-2G}".to_string(),
                        reservation: "${APACHE_TIKA_MEMORY_RESERVATION:-1G}".to_string(),
                    }),
                    replicas: None,
                    environment: Vec::new(),
                    command: None,
                },
                ServiceRule {
                    name: "redis".to_string(),
                    traefik: None,
                    frontend_network: false,
                    memory: Some(MemoryBudget {
                        limit: "${REDIS_MEMORY_LIMIT:-256M}".to_string(),
                        reservation: "${REDIS_MEMORY_RESERVATION:-128M}".to_string(),
                    }),
                    replicas: None,
                    environment: Vec::new(),
                    command: None,
                },
            ],
        }
    }
}

impl Default for ComposeRules {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn env(key: &str, value: &str) -> EnvEntry {
    EnvEntry { key: key.to_string(), value: value.to_string() }
}

/// Externally-hosted dependencies and production flags for the API
fn api_production_environment() -> Vec<EnvEntry> {
    vec![
        // OpenSearch is external in production
        env("QUERIDO_DIARIO_OPENSEARCH_HOST", "${QUERIDO_DIARIO_OPENSEARCH_HOST}"),
        env("QUERIDO_DIARIO_OPENSEARCH_USER", "${QUERIDO_DIARIO_OPENSEARCH_USER}"),
        env("QUERIDO_DIARIO_OPENSEARCH_PASSWORD", "${QUERIDO_DIARIO_OPENSEARCH_PASSWORD}"),
        env("GAZETTE_OPENSEARCH_INDEX", "${OPENSEARCH_INDEX:-querido-diario}"),
        // PostgreSQL is external in production
        env("POSTGRES_COMPANIES_USER", "${POSTGRES_COMPANIES_USER}"),
        env("POSTGRES_COMPANIES_PASSWORD", "${POSTGRES_COMPANIES_PASSWORD}"),
        env("POSTGRES_COMPANIES_DB", "${POSTGRES_COMPANIES_DB}"),
        env("POSTGRES_COMPANIES_HOST", "${POSTGRES_COMPANIES_HOST}"),
        env("POSTGRES_COMPANIES_PORT", "${POSTGRES_COMPANIES_PORT}"),
        env("POSTGRES_AGGREGATES_USER", "${POSTGRES_AGGREGATES_USER}"),
        env("POSTGRES_AGGREGATES_PASSWORD", "${POSTGRES_AGGREGATES_PASSWORD}"),
        env("POSTGRES_AGGREGATES_DB", "${POSTGRES_AGGREGATES_DB}"),
        env("POSTGRES_AGGREGATES_HOST", "${POSTGRES_AGGREGATES_HOST}"),
        env("POSTGRES_AGGREGATES_PORT", "${POSTGRES_AGGREGATES_PORT}"),
        // File storage is external in production
        env("QUERIDO_DIARIO_FILES_ENDPOINT", "${QUERIDO_DIARIO_FILES_ENDPOINT}"),
        // Production flags
        env(
            "QUERIDO_DIARIO_CORS_ALLOW_ORIGINS",
            "${QUERIDO_DIARIO_CORS_ALLOW_ORIGINS:-https://${DOMAIN}}",
        ),
        env(
            "QUERIDO_DIARIO_CORS_ALLOW_CREDENTIALS",
            "${QUERIDO_DIARIO_CORS_ALLOW_CREDENTIALS:-True}",
        ),
        env("QUERIDO_DIARIO_DEBUG", "${QUERIDO_DIARIO_DEBUG:-False}"),
        env("QUERIDO_DIARIO_ENABLE_CORS", "${QUERIDO_DIARIO_ENABLE_CORS:-True}"),
    ]
}

/// Production settings and the external database for the backend
fn backend_production_environment() -> Vec<EnvEntry> {
    vec![
        env("QD_BACKEND_SECRET_KEY", "${QD_BACKEND_SECRET_KEY}"),
        env("QD_BACKEND_DEBUG", "${QD_BACKEND_DEBUG:-False}"),
        env(
            "QD_BACKEND_ALLOWED_HOSTS",
            "${QD_BACKEND_ALLOWED_HOSTS:-backend-api.${DOMAIN},${DOMAIN}}",
        ),
        env(
            "QD_BACKEND_ALLOWED_ORIGINS",
            "${QD_BACKEND_ALLOWED_ORIGINS:-https://${DOMAIN},https://backend-api.${DOMAIN}}",
        ),
        env(
            "QD_BACKEND_CSRF_TRUSTED_ORIGINS",
            "${QD_BACKEND_CSRF_TRUSTED_ORIGINS:-https://backend-api.${DOMAIN}}",
        ),
        env("QD_BACKEND_DB_URL", "${QD_BACKEND_DB_URL}"),
        env("STATIC_URL", "${STATIC_URL:-https://backend-api.${DOMAIN}/api/static/}"),
        env("FRONT_BASE_URL", "${FRONT_BASE_URL:-https://${DOMAIN}}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_validate() {
        ComposeRules::with_defaults().validate().unwrap();
    }

    #[test]
    fn test_default_table_covers_production_services() {
        let rules = ComposeRules::with_defaults();
        for name in [
            "querido-diario-api",
            "querido-diario-backend",
            "celery-beat",
            "celery-worker",
            "querido-diario-data-processing",
            "apache-tika",
            "redis",
        ] {
            assert!(rules.rule(name).is_some(), "missing rule for {name}");
        }
        assert!(rules.rule("postgres").is_none());
    }

    #[test]
    fn test_api_route_emits_redirect_middleware() {
        let rules = ComposeRules::with_defaults();
        let route = rules.rule("querido-diario-api").unwrap().traefik.as_ref().unwrap();
        let labels = route.labels("frontend");

        assert_eq!(labels[0], "traefik.enable=true");
        assert_eq!(labels[1], "traefik.docker.network=frontend");
        assert!(labels.contains(
            &"traefik.http.routers.querido-diario-api-https.rule=Host(`api.${DOMAIN}`)"
                .to_string()
        ));
        assert!(labels.contains(
            &"traefik.http.services.querido-diario-api.loadbalancer.server.port=8080".to_string()
        ));
        assert!(labels
            .iter()
            .any(|l| l.starts_with("traefik.http.middlewares.https-redirect")));
    }

    #[test]
    fn test_backend_route_omits_redirect_middleware() {
        let rules = ComposeRules::with_defaults();
        let route = rules.rule("querido-diario-backend").unwrap().traefik.as_ref().unwrap();
        let labels = route.labels("frontend");

        assert!(labels.contains(
            &"traefik.http.services.querido-diario-backend.loadbalancer.server.port=8000"
                .to_string()
        ));
        assert!(!labels
            .iter()
            .any(|l| l.starts_with("traefik.http.middlewares.https-redirect")));
    }

    #[test]
    fn test_only_worker_carries_replicas() {
        let rules = ComposeRules::with_defaults();
        for rule in &rules.services {
            if rule.name == "celery-worker" {
                assert_eq!(rule.replicas.as_deref(), Some("${CELERY_WORKER_REPLICAS:-2}"));
            } else {
                assert!(rule.replicas.is_none(), "{} must not set replicas", rule.name);
            }
        }
    }

    #[test]
    fn test_only_backend_overrides_command() {
        let rules = ComposeRules::with_defaults();
        for rule in &rules.services {
            if rule.name == "querido-diario-backend" {
                assert!(rule.command.as_deref().unwrap_or("").starts_with("gunicorn"));
            } else {
                assert!(rule.command.is_none(), "{} must not set command", rule.name);
            }
        }
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let rules = ComposeRules::with_defaults();
        let yaml = serde_yaml::to_string(&rules).unwrap();
        let reloaded = ComposeRules::load_from_str(&yaml).unwrap();

        assert_eq!(reloaded.services.len(), rules.services.len());
        assert_eq!(reloaded.internal_network, rules.internal_network);
    }

    #[test]
    fn test_duplicate_service_rule_is_rejected() {
        let mut rules = ComposeRules::with_defaults();
        rules.services.push(ServiceRule {
            name: "redis".to_string(),
            traefik: None,
            frontend_network: false,
            memory: None,
            replicas: None,
            environment: Vec::new(),
            command: None,
        });

        let err = rules.validate().unwrap_err();
        assert!(matches!(err, ForgeError::Manifest { .. }));
    }
}
