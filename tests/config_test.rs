//! Integration tests for Settings config loading with layered merge semantics.
//!
//! Merge Semantics:
//! - Defaults → Global → Local: scalars REPLACE, currency entries REPLACE per code
//! - Any → Env vars: REPLACE (explicit user override)
//!
//! Note: These tests run without a global config (temp directories only),
//! so they effectively test local config merging with defaults.

use std::fs;

use rust_decimal_macros::dec;
use tempfile::TempDir;

use rschapter::application::ApplicationError;
use rschapter::config::{local_config_path, Settings};

// ============================================================
// Settings::load() local config tests
// ============================================================

#[test]
fn given_no_local_config_when_load_then_returns_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.default_currency, "EUR");
    assert!(settings.tree.show_amounts);
    assert!(!settings.tree.show_wbs);
}

#[test]
fn given_local_config_when_load_then_overrides_scalars_and_adds_currencies() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let local = r#"
default_currency = "sek"

[currencies.SEK]
rounding = "1"
digits = 2

[tree]
show_wbs = true
"#;
    fs::write(local_config_path(dir.path()), local).unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.default_currency, "SEK");
    assert!(settings.tree.show_wbs);
    assert!(settings.tree.show_amounts, "unset keys keep defaults");
    let sek = settings.currency(None).unwrap();
    assert_eq!(sek.round(dec!(10.49)), Some(dec!(10.00)));
    assert!(settings.currencies.contains_key("EUR"));
}

#[test]
fn given_local_currency_entry_when_load_then_replaces_default_entry() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "[currencies.EUR]\nrounding = \"0.05\"\ndigits = 2\n",
    )
    .unwrap();

    let settings = Settings::load(Some(dir.path())).unwrap();

    let eur = settings.currency(Some("EUR")).unwrap();
    assert_eq!(eur.rounding, dec!(0.05));
    assert_eq!(eur.round(dec!(1.03)), Some(dec!(1.05)));
}

#[test]
fn given_invalid_local_config_when_load_then_reports_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "default_currency = [").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_template_when_written_as_local_config_then_loads_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), Settings::template()).unwrap();

    let settings = Settings::load(Some(dir.path())).unwrap();

    assert_eq!(settings, Settings::default());
}
