//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/rschapter/rschapter.toml`
//! 3. Local config: `<dir>/.rschapter.toml` (directory given with `-C`, default cwd)
//! 4. Environment variables: `RSCHAPTER_*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{Currency, DomainError, DomainResult};

/// Rounding policy of one currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrencyConfig {
    /// Amounts are rounded to a multiple of this factor (e.g. 0.01, 0.05)
    pub rounding: Decimal,
    /// Decimal places kept after rounding
    pub digits: u32,
}

impl CurrencyConfig {
    pub fn new(rounding: Decimal, digits: u32) -> Self {
        Self { rounding, digits }
    }
}

/// Tree view options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Show line amounts next to each node
    pub show_amounts: bool,
    /// Show the work-breakdown reference of each node
    pub show_wbs: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            show_amounts: true,
            show_wbs: false,
        }
    }
}

/// Raw tree options for intermediate parsing (`None` → inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTreeConfig {
    pub show_amounts: Option<bool>,
    pub show_wbs: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub default_currency: Option<String>,
    pub currencies: BTreeMap<String, CurrencyConfig>,
    pub tree: RawTreeConfig,
}

/// Unified configuration for rschapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Currency for invoices that name none (default: EUR)
    pub default_currency: String,
    /// Known currencies by code
    pub currencies: BTreeMap<String, CurrencyConfig>,
    /// Tree view options
    pub tree: TreeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let currencies = [
            ("EUR", CurrencyConfig::new(Decimal::new(1, 2), 2)),
            ("USD", CurrencyConfig::new(Decimal::new(1, 2), 2)),
            ("CHF", CurrencyConfig::new(Decimal::new(5, 2), 2)),
            ("JPY", CurrencyConfig::new(Decimal::ONE, 0)),
        ]
        .into_iter()
        .map(|(code, cfg)| (code.to_string(), cfg))
        .collect();

        Self {
            default_currency: "EUR".to_string(),
            currencies,
            tree: TreeConfig::default(),
        }
    }
}

/// Get the XDG config directory for rschapter.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rschapter").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rschapter.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".rschapter.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Resolve a currency code (or the default currency) to its rounding policy.
    pub fn currency(&self, code: Option<&str>) -> DomainResult<Currency> {
        let code = code.unwrap_or(&self.default_currency).to_uppercase();
        self.currencies
            .get(&code)
            .map(|cfg| Currency::new(code.clone(), cfg.rounding, cfg.digits))
            .ok_or(DomainError::UnknownCurrency(code))
    }

    /// Merge overlay config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Currencies: overlay entries replace base entries with the same code
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut currencies = self.currencies.clone();
        for (code, cfg) in &overlay.currencies {
            currencies.insert(code.to_uppercase(), cfg.clone());
        }
        Self {
            default_currency: overlay
                .default_currency
                .clone()
                .unwrap_or_else(|| self.default_currency.clone()),
            currencies,
            tree: TreeConfig {
                show_amounts: overlay.tree.show_amounts.unwrap_or(self.tree.show_amounts),
                show_wbs: overlay.tree.show_wbs.unwrap_or(self.tree.show_wbs),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.rschapter.toml`
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/rschapter/rschapter.toml`
    /// 3. Local config: `<local_dir>/.rschapter.toml`
    /// 4. Environment variables: `RSCHAPTER_*` prefix
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config
        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("loading local config {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;
        current.default_currency = current.default_currency.to_uppercase();

        Ok(current)
    }

    /// Apply RSCHAPTER_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let builder = Config::builder().add_source(
            Environment::with_prefix("RSCHAPTER")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("default_currency") {
            settings.default_currency = val;
        }
        if let Ok(val) = config.get_bool("tree.show_amounts") {
            settings.tree.show_amounts = val;
        }
        if let Ok(val) = config.get_bool("tree.show_wbs") {
            settings.tree.show_wbs = val;
        }

        Ok(settings)
    }

    /// Serialize current settings to TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# rschapter configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/rschapter/rschapter.toml
#   Local:  <dir>/.rschapter.toml   (dir given with -C, default: cwd)
#   Env:    RSCHAPTER_* environment variables, e.g.
#           RSCHAPTER_DEFAULT_CURRENCY=CHF
#           RSCHAPTER_TREE__SHOW_WBS=true

# Currency for invoices without an explicit currency
# default_currency = "EUR"

# Currency rounding: amounts are rounded half-even to a multiple of
# `rounding`, then to `digits` decimal places. Entries replace inherited
# entries with the same code.
# [currencies.EUR]
# rounding = "0.01"
# digits = 2
#
# [currencies.CHF]
# rounding = "0.05"
# digits = 2

[tree]
# Show line amounts in the tree view
# show_amounts = true

# Show work-breakdown references in the tree view
# show_wbs = false
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
