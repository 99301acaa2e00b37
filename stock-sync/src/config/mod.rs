//! Worker configuration
//!
//! Loaded from `config.toml` (explicit path or the user config directory),
//! optionally overlaid with `config.<env>.toml` when `STOCK_SYNC_ENV` is
//! set, then patched from environment variables so secrets can stay out of
//! files.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

pub const ENV_NAME_VAR: &str = "STOCK_SYNC_ENV";
pub const CLIENT_SECRET_VAR: &str = "STOCK_SYNC_CLIENT_SECRET";
pub const CONNECTION_STRING_VAR: &str = "STOCK_SYNC_CONNECTION_STRING";

const APP_DIR: &str = "stock-sync";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Stock database URL (e.g. `sqlite://stock.db`)
    pub connection_string: String,
    /// Seconds-resolution cron expression for daemon mode
    pub cron_expression: String,
    pub sales: SalesOptions,
    pub crm: CrmOptions,
}

/// Defaults stamped onto products and price list items created by the sync
#[derive(Debug, Clone, Deserialize)]
pub struct SalesOptions {
    pub uom_schedule_id: Uuid,
    pub uom_id: Uuid,
    pub default_price_list: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmOptions {
    /// Authority base URL (e.g. `https://login.microsoftonline.com/`)
    #[serde(default = "default_instance")]
    pub instance: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Organization root (e.g. `https://contoso.crm.dynamics.com`)
    pub organization_url: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_instance() -> String {
    "https://login.microsoftonline.com/".to_string()
}

fn default_api_path() -> String {
    "api/data/v9.2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl CrmOptions {
    /// Web API root, e.g. `https://contoso.crm.dynamics.com/api/data/v9.2`
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.organization_url.trim_end_matches('/'),
            self.api_path.trim_matches('/')
        )
    }
}

impl Config {
    /// Default location of the base config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from `path` (or the default location)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()
                .context("Could not determine the user config directory; pass --config")?,
        };

        let env_name = std::env::var(ENV_NAME_VAR).ok();
        let mut table = read_table(&path)?;

        if let Some(env_name) = env_name.as_deref().filter(|e| !e.is_empty()) {
            let overlay_path = overlay_path(&path, env_name);
            if overlay_path.exists() {
                log::debug!("Applying config overlay {}", overlay_path.display());
                merge_tables(&mut table, read_table(&overlay_path)?);
            }
        }

        let mut config: Config = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a complete configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(CLIENT_SECRET_VAR).filter(|v| !v.is_empty()) {
            self.crm.client_secret = secret;
        }
        if let Some(connection) = lookup(CONNECTION_STRING_VAR).filter(|v| !v.is_empty()) {
            self.connection_string = connection;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            anyhow::bail!("connection_string must not be empty");
        }
        cron::Schedule::from_str(&self.cron_expression).map_err(|e| {
            anyhow::anyhow!("Invalid cron_expression '{}': {}", self.cron_expression, e)
        })?;
        reqwest::Url::parse(&self.crm.organization_url).with_context(|| {
            format!("Invalid crm.organization_url '{}'", self.crm.organization_url)
        })?;
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// `config.toml` + `production` -> `config.production.toml`
fn overlay_path(base: &Path, env_name: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("config");
    let file_name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}.{}", stem, env_name.to_lowercase(), ext),
        None => format!("{}.{}", stem, env_name.to_lowercase()),
    };
    base.with_file_name(file_name)
}

/// Deep-merge `overlay` into `base`; nested tables merge, everything else replaces
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
connection_string = "sqlite://stock.db"
cron_expression = "0 */15 * * * *"

[sales]
uom_schedule_id = "3fa85f64-5717-4562-b3fc-2c963f66afa6"
uom_id = "0b9a3c61-69f0-4a5b-8b5e-1f1f6f0c2d11"
default_price_list = "7c9e6679-7425-40de-944b-e07fc1f90ae7"

[crm]
tenant_id = "contoso"
client_id = "app"
organization_url = "https://contoso.crm.dynamics.com/"
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.crm.api_path, "api/data/v9.2");
        assert_eq!(config.crm.timeout_secs, 30);
        assert_eq!(config.crm.instance, "https://login.microsoftonline.com/");
        assert_eq!(
            config.crm.base_url(),
            "https://contoso.crm.dynamics.com/api/data/v9.2"
        );
        assert_eq!(
            config.sales.uom_id,
            Uuid::parse_str("0b9a3c61-69f0-4a5b-8b5e-1f1f6f0c2d11").unwrap()
        );
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        let text = SAMPLE.replace("0 */15 * * * *", "every quarter hour");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("cron_expression"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();

        config.apply_env_overrides(|name| match name {
            CLIENT_SECRET_VAR => Some("s3cret".to_string()),
            CONNECTION_STRING_VAR => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.crm.client_secret, "s3cret");
        assert_eq!(config.connection_string, "sqlite://stock.db");
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = toml::from_str(SAMPLE).unwrap();
        let overlay: toml::Table = toml::from_str(
            r#"
            cron_expression = "0 0 * * * *"
            [crm]
            organization_url = "https://contoso-test.crm.dynamics.com"
            "#,
        )
        .unwrap();

        merge_tables(&mut base, overlay);
        let config: Config = toml::Value::Table(base).try_into().unwrap();

        assert_eq!(config.cron_expression, "0 0 * * * *");
        assert_eq!(config.crm.organization_url, "https://contoso-test.crm.dynamics.com");
        assert_eq!(config.crm.tenant_id, "contoso");
    }

    #[test]
    fn test_overlay_path() {
        assert_eq!(
            overlay_path(Path::new("/etc/stock-sync/config.toml"), "Production"),
            PathBuf::from("/etc/stock-sync/config.production.toml")
        );
    }
}
