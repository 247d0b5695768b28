//! Domain variable composition
//!
//! CDD Principle: Domain Services - Composition derives the full variable set from one input
//! - A single domain plus an environment kind expands into every URL, host list, and address
//! - Composition is total: every valid domain and kind yields the complete fixed key set
//! - The fixed per-environment settings live here as data, next to the derivation they refine

use crate::domain::{Domain, EnvironmentKind, VariableMap};

/// Development frontend port (Angular dev server)
const FRONTEND_DEV_PORT: u16 = 4200;
/// Development backend port (Django runserver)
const BACKEND_DEV_PORT: u16 = 8000;

/// Compose every domain-derived configuration variable
///
/// The returned map always contains the same eleven keys in the same order;
/// only the values differ per environment kind.
pub fn compose_domain_variables(domain: &Domain, kind: EnvironmentKind) -> VariableMap {
    let protocol = kind.protocol();

    let (frontend_url, backend_static_url, allowed_hosts, allowed_origins, csrf_origins) =
        match kind {
            EnvironmentKind::Development => {
                // Localhost with explicit ports, but keep the configured domain reachable too
                let frontend_url = format!("http://localhost:{FRONTEND_DEV_PORT}");
                let backend_static_url = format!("http://localhost:{BACKEND_DEV_PORT}/api/static/");
                let allowed_hosts = format!("localhost,backend-api.{domain},127.0.0.1");
                let allowed_origins = format!(
                    "http://localhost:{FRONTEND_DEV_PORT},http://localhost:{BACKEND_DEV_PORT},http://{domain}"
                );
                let csrf_origins =
                    format!("http://localhost:{BACKEND_DEV_PORT},http://backend-api.{domain}");
                (frontend_url, backend_static_url, allowed_hosts, allowed_origins, csrf_origins)
            }
            EnvironmentKind::Production => {
                // Domain-qualified HTTPS, implicit port 443
                let frontend_url = format!("{protocol}://{domain}");
                let backend_url = format!("{protocol}://backend-api.{domain}");
                let backend_static_url = format!("{backend_url}/api/static/");
                let allowed_hosts = format!("backend-api.{domain},{domain}");
                let allowed_origins = format!("{frontend_url},{backend_url}");
                (frontend_url, backend_static_url, allowed_hosts, allowed_origins, backend_url)
            }
        };

    let cors_allow_origins = frontend_url.clone();

    let mut vars = VariableMap::new();
    vars.set("DOMAIN", domain.as_str());
    vars.set("QD_BACKEND_ALLOWED_HOSTS", allowed_hosts);
    vars.set("QD_BACKEND_ALLOWED_ORIGINS", allowed_origins);
    vars.set("QD_BACKEND_CSRF_TRUSTED_ORIGINS", csrf_origins);
    vars.set("STATIC_URL", backend_static_url);
    vars.set("FRONT_BASE_URL", frontend_url);
    vars.set("QUERIDO_DIARIO_CORS_ALLOW_ORIGINS", cors_allow_origins);
    vars.set("DEFAULT_FROM_EMAIL", format!("noreply@{domain}"));
    vars.set("SERVER_EMAIL", format!("server@{domain}"));
    vars.set("QUOTATION_TO_EMAIL", format!("quotes@{domain}"));
    vars.set("QUERIDO_DIARIO_SUGGESTION_RECIPIENT_EMAIL", format!("team@{domain}"));
    vars
}

/// Fixed debug-flag settings applied after domain substitution
pub fn environment_settings(kind: EnvironmentKind) -> VariableMap {
    let (backend_debug, api_debug, debug, data_processing_debug) = match kind {
        EnvironmentKind::Development => ("True", "True", "1", "1"),
        EnvironmentKind::Production => ("False", "False", "0", "0"),
    };

    let mut vars = VariableMap::new();
    vars.set("QD_BACKEND_DEBUG", backend_debug);
    vars.set("QUERIDO_DIARIO_DEBUG", api_debug);
    vars.set("DEBUG", debug);
    vars.set("DATA_PROCESSING_DEBUG", data_processing_debug);
    vars
}
