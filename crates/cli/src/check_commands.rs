//! `herald check`: config validation and store connectivity report.
//!
//! Prints one `[ok]`, `[warn]` or `[fail]` line per item and fails the
//! process when any item failed.

use std::path::Path;

use {
    anyhow::Result,
    herald_config::{HeraldConfig, Severity},
    herald_store::{SqliteTableStore, TableStore},
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
        }
    }
}

#[derive(Default)]
struct Report {
    items: Vec<(Status, String)>,
}

impl Report {
    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }

    fn failed(&self) -> usize {
        self.items.iter().filter(|(s, _)| *s == Status::Fail).count()
    }

    fn print(&self) {
        println!("{BOLD}herald check{RESET}");
        for (status, message) in &self.items {
            println!("  {}[{}]{RESET} {message}", status.color(), status.label());
        }
    }
}

pub async fn run(config: &HeraldConfig, explicit_path: Option<&Path>) -> Result<()> {
    let mut report = Report::default();

    match explicit_path
        .map(Path::to_path_buf)
        .or_else(herald_config::find_config_file)
    {
        Some(path) => report.push(Status::Ok, format!("config file {}", path.display())),
        None => report.push(Status::Warn, "no config file found, using defaults"),
    }

    let validation = herald_config::validate(config);
    for diagnostic in &validation.diagnostics {
        let status = match diagnostic.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        };
        report.push(status, format!("{}: {}", diagnostic.path, diagnostic.message));
    }
    if validation.diagnostics.is_empty() {
        report.push(Status::Ok, "configuration is valid");
    }

    match check_store(config).await {
        Ok(()) => report.push(
            Status::Ok,
            format!("reference store table '{}' is reachable", config.store.table),
        ),
        Err(e) => report.push(Status::Fail, format!("reference store: {e}")),
    }

    report.print();
    let failed = report.failed();
    if failed > 0 {
        anyhow::bail!("{failed} check(s) failed");
    }
    Ok(())
}

async fn check_store(config: &HeraldConfig) -> Result<()> {
    let store = SqliteTableStore::connect(&config.store.database_url).await?;
    store.create_table_if_absent(&config.store.table).await?;
    store.close().await;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_failures() {
        let mut report = Report::default();
        report.push(Status::Ok, "a");
        report.push(Status::Warn, "b");
        report.push(Status::Fail, "c");
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn in_memory_store_is_reachable() {
        let mut config = HeraldConfig::default();
        config.store.database_url = "sqlite::memory:".into();
        check_store(&config).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_table_fails_store_check() {
        let mut config = HeraldConfig::default();
        config.store.database_url = "sqlite::memory:".into();
        config.store.table = "no".into();
        assert!(check_store(&config).await.is_err());
    }
}
