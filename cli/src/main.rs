//! pushcheck CLI - send test pushes and inspect configuration.
//!
//! ```text
//! pushcheck [--config PATH] send <TOKEN> [--title T] [--body B] [--data JSON]
//! pushcheck [--config PATH] check [--platform P] [--device-token ID]
//! pushcheck [--config PATH] config
//! ```
//!
//! Logs go to stderr (filtered by `RUST_LOG`, default `info`); command output
//! goes to stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pushcheck_config::PushcheckConfig;
use pushcheck_core::{CancellationToken, LoopbackDevice};
use pushcheck_engine::{CheckReport, CheckSettings, gateway_config, run_all};
use pushcheck_gateway::PushGateway;
use pushcheck_types::{Platform, PushMessage, looks_like_expo_push_token};

/// Send and verify push notifications through the Expo push service.
#[derive(Parser, Debug)]
#[command(name = "pushcheck", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.pushcheck/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a test notification and print the receipts.
    Send {
        /// Expo push token, e.g. ExponentPushToken[xxxxxxxx].
        token: String,

        /// Notification title.
        #[arg(long)]
        title: Option<String>,

        /// Notification body.
        #[arg(long)]
        body: Option<String>,

        /// JSON object delivered as the notification's data.
        #[arg(long, value_parser = parse_data)]
        data: Option<Map<String, Value>>,
    },

    /// Dry-run the device checks against a simulated device.
    Check {
        /// Platform to simulate instead of the configured one.
        #[arg(long, value_parser = parse_platform)]
        platform: Option<Platform>,

        /// Native token id the simulated device reports.
        #[arg(long, default_value = "pushcheck-dry-run")]
        device_token: String,
    },

    /// Print the effective configuration.
    Config,
}

fn parse_platform(raw: &str) -> Result<Platform, String> {
    Platform::parse(raw).map_err(|e| e.to_string())
}

fn parse_data(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("--data must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<(PushcheckConfig, Option<PathBuf>)> {
    match path {
        Some(path) => {
            let config = PushcheckConfig::load_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            Ok((config, Some(path.to_path_buf())))
        }
        None => {
            let config = PushcheckConfig::load().context("loading default config")?;
            Ok((config, PushcheckConfig::path()))
        }
    }
}

fn build_message(
    token: String,
    title: Option<String>,
    body: Option<String>,
    data: Option<Map<String, Value>>,
) -> PushMessage {
    let mut message = PushMessage::test(token);
    if let Some(title) = title {
        message = message.with_title(title);
    }
    if let Some(body) = body {
        message = message.with_body(body);
    }
    if let Some(data) = data {
        message = message.with_data(Value::Object(data));
    }
    message
}

async fn send(config: &PushcheckConfig, message: PushMessage) -> Result<()> {
    if !looks_like_expo_push_token(&message.to) {
        tracing::warn!(token = %message.to, "Token does not look like an Expo push token");
    }

    let gateway = PushGateway::new(&gateway_config(config)).context("configuring push gateway")?;
    let receipts = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
        receipts = gateway.send(std::slice::from_ref(&message)) => {
            receipts.with_context(|| format!("sending to {}", gateway.endpoint()))?
        }
    };

    for receipt in &receipts {
        println!("{}", serde_json::to_string(receipt)?);
    }
    tracing::info!(receipts = receipts.len(), "Push accepted");
    Ok(())
}

/// Run the checks against a loopback device. The roundtrip needs a device the
/// push service can reach, so it is always skipped here.
async fn dry_run(settings: &CheckSettings, device_token: &str) -> CheckReport {
    let device = LoopbackDevice::simulated(settings.platform, device_token);
    let cancel = CancellationToken::new();
    let run = run_all(&device, None, settings, &cancel);
    tokio::pin!(run);
    tokio::select! {
        biased;
        report = &mut run => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, skipping remaining checks");
            cancel.cancel();
            run.await
        }
    }
}

async fn check(
    config: &PushcheckConfig,
    platform: Option<Platform>,
    device_token: &str,
) -> Result<()> {
    let mut settings = CheckSettings::from_config(config).context("reading [checks] config")?;
    if let Some(platform) = platform {
        settings.platform = platform;
    }

    let report = dry_run(&settings, device_token).await;
    for result in report.results() {
        println!("{result}");
    }
    println!(
        "{} passed, {} failed, {} skipped",
        report.passed(),
        report.failed(),
        report.skipped()
    );
    if !report.is_success() {
        bail!("{} check(s) failed", report.failed());
    }
    Ok(())
}

fn print_config(config: &PushcheckConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) if path.exists() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not found, using defaults)", path.display()),
        None => println!("# no config path, using defaults"),
    }
    let gateway = gateway_config(config);
    let settings = CheckSettings::from_config(config)?;

    println!("gateway.endpoint = {}", gateway.endpoint);
    println!(
        "gateway.access_token = {}",
        if gateway.access_token.is_some() { "[REDACTED]" } else { "(none)" }
    );
    println!("gateway.timeout_secs = {}", gateway.timeout.as_secs());
    println!("checks.platform = {}", settings.platform);
    println!(
        "checks.experience_id = {}",
        settings.experience_id.as_deref().unwrap_or("(none)")
    );
    println!("checks.manifest_present = {}", settings.manifest_present);
    println!("checks.settle_ms = {}", settings.settle_delay.as_millis());
    println!("checks.poll_interval_ms = {}", settings.poll.interval.as_millis());
    println!("checks.poll_attempts = {}", settings.poll.max_attempts);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let (config, path) = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Send {
            token,
            title,
            body,
            data,
        } => send(&config, build_message(token, title, body, data)).await,
        Command::Check {
            platform,
            device_token,
        } => check(&config, platform, &device_token).await,
        Command::Config => print_config(&config, path.as_deref()),
    }
}
