//! Configuration loading, validation, and env substitution.
//!
//! Config files: `herald.toml`, `herald.yaml`, or `herald.json`
//! Searched in `./` then `~/.config/herald/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, and the
//! Bot Framework environment variables (`MICROSOFT_APP_ID`, `SERVICE_URL`, ...)
//! override whatever the file says.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        load_from,
    },
    schema::{HeraldConfig, ProactiveConfig, ServerConfig, StoreConfig, TeamsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
