// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/gam_cli

 gam init ./gam.yaml
 gam orders --status delivering -l 5
 gam inventory --preset desktop --start 01032026 --end 2026-03-31 --json
 RUST_LOG=gam=debug gam line-items --order-id 123456

*/
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
mod domain;
mod config;
mod metrics;
mod recorder;
mod normalize;
mod inventory;
mod gam;          // wire models (REST v1)
mod soap;         // legacy SOAP envelopes + scanner
mod auth;
mod client;
mod pager;
mod forecast;
mod delivery;
mod joiner;
mod service;
mod render;
#[cfg(test)]
mod testing;

use chrono::{Local, Utc};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthError, ServiceAccountToken, StaticToken, TokenProvider};
use crate::client::{ApiError, ClientCfg, HttpAdManager};
use crate::config::{Cli, Command, ConfigError, Credentials, Settings};
use crate::recorder::ErrorLog;
use crate::service::GamService;

const REPORT_PAGE_SIZE: u32 = 1_000;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid API base URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn init_logging(debug: bool) {
    // RUST_LOG menang; default "warn" supaya output tabel tetap bersih
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn build_service(settings: &Settings) -> Result<GamService, CliError> {
    let http = reqwest::Client::builder().user_agent(settings.application_name.as_str()).build()?;
    let tokens: Arc<dyn TokenProvider> = match &settings.credentials {
        Credentials::AccessToken(t) => Arc::new(StaticToken(t.clone())),
        Credentials::KeyFile(path) => Arc::new(ServiceAccountToken::from_file(http.clone(), path.clone()).await?),
    };
    let cfg = ClientCfg {
        network_code: settings.network_code.clone(),
        application_name: settings.application_name.clone(),
        api_base: settings.api_base.clone(),
        soap_base: settings.soap_base.clone(),
        api_version: settings.api_version.clone(),
        report_poll: settings.report_poll,
        report_page_size: REPORT_PAGE_SIZE,
    };
    let api = HttpAdManager::new(http, tokens, cfg)?;
    Ok(GamService::new(Arc::new(api), settings.network_code.clone(), settings.precedence))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", render::to_json(value)?);
    Ok(())
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    if let Command::Init { path } = &cli.command {
        let dir = config::default_config_dir()?;
        let code = config::init_config(path, &dir)?;
        println!("Configuration saved!");
        println!("Network Code: {code}");
        return Ok(());
    }

    let settings = config::load(cli)?;
    info!(
        network = %settings.network_code,
        api_base = %settings.api_base,
        api_version = %settings.api_version,
        precedence = ?settings.precedence,
        "startup config"
    );
    let svc = build_service(&settings).await?;

    match &cli.command {
        Command::Init { .. } => {}
        Command::User => {
            let u = svc.user().await?;
            if cli.json { print_json(&u)? } else { print!("{}", render::user(&u)) }
        }
        Command::Orders { limit, status } => {
            let orders = svc.orders(*limit, status.as_deref(), Utc::now().timestamp_millis()).await?;
            if cli.json { print_json(&orders)? } else { print!("{}", render::orders(&orders)) }
        }
        Command::LineItems { order_id, limit } => {
            let items = svc.line_items(*order_id, *limit).await?;
            if cli.json { print_json(&items)? } else { print!("{}", render::line_items(&items)) }
        }
        Command::Inventory { preset, start, end } => {
            let today = Local::now().date_naive();
            let inv = svc.inventory(preset.as_deref(), *start, *end, today).await;
            if cli.json { print_json(&inv)? } else { print!("{}", render::inventory(&inv, cli.quiet)) }
        }
        Command::Networks => {
            let nets = svc.networks().await?;
            if cli.json { print_json(&nets)? } else { print!("{}", render::networks(&nets)) }
        }
        Command::Creatives { limit } => {
            let creatives = svc.creatives(*limit).await?;
            if cli.json { print_json(&creatives)? } else { print!("{}", render::creatives(&creatives)) }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = config::debug_enabled(&cli);

    // ---- Logging ----
    init_logging(debug);

    // ---- Metrics ----
    metrics::init();

    let outcome = run(&cli).await;

    if debug {
        eprint!("{}", metrics::encode_metrics());
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let context = format!("gam {}", cli.command.name());
            error!(%context, error = %e, "command failed");
            println!("Error: {e}");
            match config::error_log_path() {
                Ok(path) => {
                    let log = ErrorLog::new(path);
                    match log.record(&context, &e.to_string()).await {
                        Ok(()) => println!("Details logged to: {}", log.path().display()),
                        Err(io) => error!(?io, "cannot write error log"),
                    }
                }
                Err(err) => error!(%err, "no error log location"),
            }
            ExitCode::FAILURE
        }
    }
}
