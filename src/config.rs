// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : gam_cli — Google Ad Manager command line client in Rust
Module  : <module_name>.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Lists orders, line items, creatives and networks with delivery
          metrics, resolves inventory forecasts through report and legacy
          SOAP fallbacks, and prints tables or JSON.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::time::Duration;

use crate::forecast::ErrorPrecedence;
use crate::normalize::parse_date_arg;

pub const CONFIG_DIR_NAME: &str = ".gam-cli";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const ERROR_LOG_NAME: &str = "errors.log";

const DEFAULT_API_BASE: &str = "https://admanager.googleapis.com/v1";
const DEFAULT_SOAP_BASE: &str = "https://ads.google.com/apis/ads/publisher";
const DEFAULT_API_VERSION: &str = "v202511";
const DEFAULT_APPLICATION_NAME: &str = "gam-cli";
const DEFAULT_REPORT_POLL_MS: u64 = 2_000;

#[derive(Debug, Parser)]
#[command(name = "gam", version, about = "Google Ad Manager from the terminal")]
pub struct Cli {
    /// Config file (default ~/.gam-cli/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
    /// Verbose logs and a metrics dump on exit
    #[arg(long, global = true)]
    pub debug: bool,
    /// Hide forecast errors and hints
    #[arg(short, long, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a config file and install it as the default
    Init { path: PathBuf },
    /// Current user and role
    User,
    Orders {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// delivering|approved|active|draft|pending_approval|disapproved|paused|canceled|deleted
        #[arg(long)]
        status: Option<String>,
    },
    LineItems {
        #[arg(long)]
        order_id: Option<u64>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Available / forecasted / reserved impressions per preset
    Inventory {
        /// run-of-site | desktop | mobile (default: all)
        #[arg(long)]
        preset: Option<String>,
        /// DDMMYYYY or YYYY-MM-DD
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<NaiveDate>,
    },
    Networks,
    Creatives {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

impl Command {
    /// Label used in the error log.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::User => "user",
            Command::Orders { .. } => "orders",
            Command::LineItems { .. } => "line-items",
            Command::Inventory { .. } => "inventory",
            Command::Networks => "networks",
            Command::Creatives { .. } => "creatives",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid YAML in {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("invalid config: missing \"ad_manager\" section")]
    MissingSection,
    #[error("invalid config: missing \"ad_manager.network_code\"")]
    MissingNetworkCode,
    #[error("no credentials: set GAM_ACCESS_TOKEN or ad_manager.path_to_private_key_file")]
    MissingCredentials,
    #[error("private key file not found: {0}")]
    KeyNotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("cannot locate the home directory")]
    NoHome,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdManagerSection {
    /// Number or string in YAML.
    pub network_code: Option<serde_yaml::Value>,
    pub application_name: Option<String>,
    pub path_to_private_key_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    ad_manager: Option<AdManagerSection>,
}

impl AdManagerSection {
    pub fn network_code(&self) -> Option<String> {
        match self.network_code.as_ref()? {
            serde_yaml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    KeyFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub network_code: String,
    pub application_name: String,
    pub credentials: Credentials,
    pub api_base: String,
    pub soap_base: String,
    pub api_version: String,
    pub report_poll: Duration,
    pub precedence: ErrorPrecedence,
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME)).ok_or(ConfigError::NoHome)
}

pub fn error_log_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join(ERROR_LOG_NAME))
}

/// `--debug` or a truthy `GAM_DEBUG`.
pub fn debug_enabled(cli: &Cli) -> bool {
    cli.debug || env::var("GAM_DEBUG").map(|v| matches!(v.trim(), "1" | "true" | "yes")).unwrap_or(false)
}

fn env_text(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Read and validate the `ad_manager` section of a YAML file.
pub fn read_section(path: &Path) -> Result<AdManagerSection, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let file: FileConfig =
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    file.ad_manager.ok_or(ConfigError::MissingSection)
}

/// Absolute path if it exists, else relative to `cwd`, else the basename
/// inside the config directory.
pub fn resolve_key_path(raw: &str, cwd: &Path, config_dir: &Path) -> Option<PathBuf> {
    let p = Path::new(raw);
    if p.is_absolute() {
        return p.exists().then(|| p.to_path_buf());
    }
    let in_cwd = cwd.join(p);
    if in_cwd.exists() {
        return Some(in_cwd);
    }
    let in_dir = config_dir.join(p.file_name()?);
    in_dir.exists().then_some(in_dir)
}

/// Flags, then `.env` + environment, then the YAML file.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    // .env opsional
    let _ = dotenv();

    let config_dir = default_config_dir()?;
    let path = cli
        .config
        .clone()
        .or_else(|| env_text("GAM_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| config_dir.join(CONFIG_FILE_NAME));

    let env_network = env_text("GAM_NETWORK_CODE");
    let section = match read_section(&path) {
        Ok(s) => s,
        // boleh tanpa file kalau network code datang dari env
        Err(ConfigError::NotFound(_)) if env_network.is_some() => AdManagerSection::default(),
        Err(e) => return Err(e),
    };

    let network_code = env_network.or_else(|| section.network_code()).ok_or(ConfigError::MissingNetworkCode)?;

    let credentials = match env_text("GAM_ACCESS_TOKEN") {
        Some(token) => Credentials::AccessToken(token),
        None => {
            let raw = env_text("GAM_KEY_FILE")
                .or_else(|| section.path_to_private_key_file.clone())
                .ok_or(ConfigError::MissingCredentials)?;
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let key = resolve_key_path(&raw, &cwd, &config_dir).ok_or(ConfigError::KeyNotFound(raw))?;
            Credentials::KeyFile(key)
        }
    };

    let report_poll_ms = env_text("GAM_REPORT_POLL_MS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_REPORT_POLL_MS);
    let precedence = match env_text("GAM_ERROR_PRECEDENCE") {
        Some(s) => ErrorPrecedence::from_str(&s).map_err(ConfigError::Invalid)?,
        None => ErrorPrecedence::default(),
    };

    Ok(Settings {
        network_code,
        application_name: section
            .application_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
        credentials,
        api_base: env_text("GAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        soap_base: env_text("GAM_SOAP_BASE").unwrap_or_else(|| DEFAULT_SOAP_BASE.to_string()),
        api_version: env_text("GAM_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        report_poll: Duration::from_millis(report_poll_ms),
        precedence,
    })
}

/// Validate `src` and copy it to `<dir>/config.yaml`; returns the network code.
pub fn init_config(src: &Path, dir: &Path) -> Result<String, ConfigError> {
    let section = read_section(src)?;
    let code = section.network_code().ok_or(ConfigError::MissingNetworkCode)?;
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Read { path: dir.to_path_buf(), source })?;
    let dest = dir.join(CONFIG_FILE_NAME);
    std::fs::copy(src, &dest).map_err(|source| ConfigError::Read { path: dest.clone(), source })?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn network_code_accepts_number_or_string() {
        let tmp = tempfile::tempdir().unwrap();
        let num = write(tmp.path(), "a.yaml", "ad_manager:\n  network_code: 21700000\n");
        let txt = write(tmp.path(), "b.yaml", "ad_manager:\n  network_code: \"1234\"\n  application_name: demo\n");
        assert_eq!(read_section(&num).unwrap().network_code().as_deref(), Some("21700000"));
        let s = read_section(&txt).unwrap();
        assert_eq!(s.network_code().as_deref(), Some("1234"));
        assert_eq!(s.application_name.as_deref(), Some("demo"));
    }

    #[test]
    fn missing_section_and_file_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let other = write(tmp.path(), "c.yaml", "ga4:\n  property_id: 1\n");
        assert!(matches!(read_section(&other), Err(ConfigError::MissingSection)));
        assert!(matches!(read_section(&tmp.path().join("nope.yaml")), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn init_copies_validated_config() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write(tmp.path(), "gam.yaml", "ad_manager:\n  network_code: 42\n");
        let dest_dir = tmp.path().join("home").join(CONFIG_DIR_NAME);
        assert_eq!(init_config(&src, &dest_dir).unwrap(), "42");
        assert!(dest_dir.join(CONFIG_FILE_NAME).exists());

        let bad = write(tmp.path(), "bad.yaml", "ad_manager:\n  application_name: x\n");
        assert!(matches!(init_config(&bad, &dest_dir), Err(ConfigError::MissingNetworkCode)));
    }

    #[test]
    fn key_path_resolution_order() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("work");
        let cfg = tmp.path().join("cfg");
        fs::create_dir_all(&cwd).unwrap();
        fs::create_dir_all(&cfg).unwrap();
        let in_cfg = write(&cfg, "key.json", "{}");
        assert_eq!(resolve_key_path("secrets/key.json", &cwd, &cfg), Some(in_cfg.clone()));

        fs::create_dir_all(cwd.join("secrets")).unwrap();
        let in_cwd = write(&cwd.join("secrets"), "key.json", "{}");
        assert_eq!(resolve_key_path("secrets/key.json", &cwd, &cfg), Some(in_cwd));

        let abs = in_cfg.to_string_lossy().to_string();
        assert_eq!(resolve_key_path(&abs, &cwd, &cfg), Some(in_cfg));
        assert_eq!(resolve_key_path("missing.json", &cwd, &cfg), None);
    }

    #[test]
    fn cli_parses_dates_and_globals() {
        let cli = Cli::parse_from(["gam", "inventory", "--start", "24022026", "--end", "2026-03-10", "--json"]);
        assert!(cli.json);
        match cli.command {
            Command::Inventory { start, end, preset } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 24));
                assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 10));
                assert!(preset.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["gam", "inventory", "--start", "not-a-date"]).is_err());
        let cli = Cli::parse_from(["gam", "orders", "-l", "3", "--status", "delivering"]);
        assert_eq!(cli.command.name(), "orders");
    }
}
