use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use hopedeeds_storage::DatabaseConfig;
use serde::Deserialize;
use tracing::{info, warn};

use crate::ShiftSettings;

/// Runtime configuration: built-in defaults, then the optional YAML file named
/// by `HOPEDEEDS_CONFIG`, then individual environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub port: u16,
    pub insert_concurrency: usize,
    pub max_scan_days: u64,
    pub default_organization_id: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            port: 8080,
            insert_concurrency: 1,
            max_scan_days: 730,
            default_organization_id: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_url: Option<String>,
    max_pg_connections: Option<u32>,
    pg_acquire_timeout_secs: Option<u64>,
    port: Option<u16>,
    insert_concurrency: Option<usize>,
    max_scan_days: Option<u64>,
    default_organization_id: Option<i64>,
}

impl ServiceConfig {
    pub async fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("HOPEDEEDS_CONFIG") {
            config.apply_yaml_file(Path::new(&path)).await?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub async fn apply_yaml_file(&mut self, path: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        self.apply_yaml_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "loaded config file");
        Ok(())
    }

    pub fn apply_yaml_str(&mut self, text: &str) -> Result<()> {
        let file: ConfigFile = serde_yaml::from_str(text)?;
        if let Some(url) = file.database_url {
            self.database.url = url;
        }
        if let Some(max) = file.max_pg_connections {
            self.database.max_connections = max;
        }
        if let Some(secs) = file.pg_acquire_timeout_secs {
            self.database.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(n) = file.insert_concurrency {
            self.insert_concurrency = n;
        }
        if let Some(days) = file.max_scan_days {
            self.max_scan_days = days;
        }
        if let Some(org) = file.default_organization_id {
            self.default_organization_id = org;
        }
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        override_parsed(&lookup, "HOPEDEEDS_MAX_PG_CONNECTIONS", &mut self.database.max_connections);
        let mut acquire_secs = self.database.acquire_timeout.as_secs();
        override_parsed(&lookup, "HOPEDEEDS_PG_ACQUIRE_TIMEOUT_SECS", &mut acquire_secs);
        self.database.acquire_timeout = Duration::from_secs(acquire_secs);
        override_parsed(&lookup, "HOPEDEEDS_PORT", &mut self.port);
        override_parsed(&lookup, "HOPEDEEDS_INSERT_CONCURRENCY", &mut self.insert_concurrency);
        override_parsed(&lookup, "HOPEDEEDS_MAX_SCAN_DAYS", &mut self.max_scan_days);
        override_parsed(&lookup, "HOPEDEEDS_DEFAULT_ORG_ID", &mut self.default_organization_id);
    }

    pub fn settings(&self) -> ShiftSettings {
        ShiftSettings {
            insert_concurrency: self.insert_concurrency.max(1),
            max_scan_days: self.max_scan_days,
            default_organization_id: self.default_organization_id,
        }
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparsable environment value"),
    }
}
