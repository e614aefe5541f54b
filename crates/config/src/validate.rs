//! Configuration validation.
//!
//! Reports missing bot credentials and unresolved `${VAR}` placeholders
//! before the gateway starts accepting traffic.

use secrecy::ExposeSecret;

use crate::schema::HeraldConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "teams.app_id"
    pub path: String,
    pub message: String,
}

/// Result of validating a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &HeraldConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let teams = &config.teams;

    let required = [
        ("teams.app_id", teams.app_id.as_str()),
        ("teams.app_password", teams.app_password.expose_secret().as_str()),
        ("teams.tenant_id", teams.tenant_id.as_str()),
        ("teams.service_url", teams.service_url.as_str()),
    ];
    for (path, value) in required {
        if value.trim().is_empty() {
            result.push(Severity::Error, path, "required value is empty");
        } else if value.contains("${") {
            result.push(Severity::Error, path, "unresolved environment placeholder");
        }
    }

    if !teams.service_url.is_empty()
        && !(teams.service_url.starts_with("https://") || teams.service_url.starts_with("http://"))
    {
        result.push(
            Severity::Error,
            "teams.service_url",
            "must be an http(s) URL",
        );
    }

    if teams.bot_id.trim().is_empty() {
        result.push(
            Severity::Warning,
            "teams.bot_id",
            "personal conversations will be created without a bot account",
        );
    }
    if teams.channel_id.trim().is_empty() {
        result.push(
            Severity::Warning,
            "teams.channel_id",
            "channel notifications are disabled until a channel is configured",
        );
    }
    if config.proactive.demo_member_id.trim().is_empty() {
        result.push(
            Severity::Warning,
            "proactive.demo_member_id",
            "GET /api/proactive has no target",
        );
    }
    if config.store.table.trim().is_empty() {
        result.push(Severity::Error, "store.table", "required value is empty");
    }

    result
}
