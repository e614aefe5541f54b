use std::path::{Path, PathBuf};

use {
    herald_common::{Error, Result},
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HeraldConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["herald.toml", "herald.yaml", "herald.yml", "herald.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<HeraldConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::message(format!("failed to read {}: {e}", path.display())))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./herald.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/herald/herald.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `HeraldConfig::default()` if no config file is found.
pub fn discover_and_load() -> HeraldConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                HeraldConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            HeraldConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Load an explicit config file and apply environment overrides.
pub fn load_from(path: &Path) -> Result<HeraldConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/herald/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "herald").map(|d| d.config_dir().to_path_buf())
}

/// Overlay the Bot Framework environment variables on top of file values.
pub fn apply_env_overrides(config: &mut HeraldConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut HeraldConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("MICROSOFT_APP_ID") {
        config.teams.app_id = v;
    }
    if let Some(v) = get("MICROSOFT_APP_PASSWORD") {
        config.teams.app_password = Secret::new(v);
    }
    if let Some(v) = get("TENANT_ID") {
        config.teams.tenant_id = v;
    }
    if let Some(v) = get("BOT_ID") {
        config.teams.bot_id = v;
    }
    if let Some(v) = get("BOT_NAME") {
        config.teams.bot_name = v;
    }
    if let Some(v) = get("SERVICE_URL") {
        config.teams.service_url = v;
    }
    if let Some(v) = get("TEAMS_CHANNEL_ID") {
        config.teams.channel_id = v;
    }
    if let Some(v) = get("HERALD_DATABASE_URL") {
        config.store.database_url = v;
    }
    if let Some(v) = get("PORT") {
        match v.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %v, "ignoring invalid PORT"),
        }
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<HeraldConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let parsed = match ext {
        "toml" => toml::from_str(raw).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(raw).map_err(|e| e.to_string()),
        _ => return Err(Error::message(format!("unsupported config format: .{ext}"))),
    };
    parsed.map_err(|e| Error::message(format!("failed to parse {}: {e}", path.display())))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    #[test]
    fn loads_toml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 4000

[teams]
app_id = "app"
tenant_id = "tenant"
channel_id = "19:general@thread.tacv2"

[store]
table = "refs"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 4000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.teams.app_id, "app");
        assert_eq!(cfg.teams.oauth_tenant, "botframework.com");
        assert_eq!(cfg.store.table, "refs");
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.json");
        std::fs::write(&path, r#"{"proactive": {"demo_member_id": "29:x"}}"#).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.proactive.demo_member_id, "29:x");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/herald.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MICROSOFT_APP_ID", "env-app"),
            ("MICROSOFT_APP_PASSWORD", "hunter2"),
            ("TEAMS_CHANNEL_ID", "19:env"),
            ("PORT", "8080"),
            ("BOT_NAME", "  "),
        ]);
        let mut cfg = HeraldConfig::default();
        cfg.teams.bot_name = "file-bot".into();
        apply_overrides_with(&mut cfg, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.teams.app_id, "env-app");
        assert_eq!(cfg.teams.app_password.expose_secret(), "hunter2");
        assert_eq!(cfg.teams.channel_id, "19:env");
        assert_eq!(cfg.server.port, 8080);
        // Blank values do not clobber the file.
        assert_eq!(cfg.teams.bot_name, "file-bot");
    }

    #[test]
    fn invalid_port_is_ignored() {
        let mut cfg = HeraldConfig::default();
        apply_overrides_with(&mut cfg, |name| {
            (name == "PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(cfg.server.port, 3007);
    }
}
