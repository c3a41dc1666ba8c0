//! `refetch` command-line client.
//!
//! Fetches one URL through a [`Refetch`] orchestrator configured from an
//! optional TOML file and command-line flags. Flags override the file.
//! Ctrl+C aborts the call through the live abort handle.

use clap::Parser;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use refetch::config::schema::{DelaySetting, ModeSetting};
use refetch::config::{load_config, RefetchConfig};
use refetch::observability::logging::init_logging;
use refetch::{Fetched, HttpResponse, Refetch, ReqwestTransport};

/// Exit code after an abort, as for SIGINT.
const EXIT_ABORTED: u8 = 130;

#[derive(Parser)]
#[command(name = "refetch")]
#[command(about = "Fetch a URL with timeouts, retries and backoff", long_about = None)]
struct Cli {
    /// URL to fetch
    url: String,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Attempt timeout in milliseconds (0 disables)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Attempts per call (0 = as many as the delay sequence allows)
    #[arg(short, long)]
    limit: Option<u32>,

    /// Backoff: milliseconds or immediate|default|fibonacci|progressive|exponential
    #[arg(short, long)]
    delay: Option<DelaySetting>,

    /// Delay amplifier (1-10), for fibonacci, progressive and exponential delays
    #[arg(short, long)]
    amplify: Option<u32>,

    /// Retry trigger: error|network|timeout|server-error|always (repeatable)
    #[arg(long = "retry-on")]
    retry_on: Vec<String>,

    /// Retry responses with this status code (repeatable)
    #[arg(long = "retry-status")]
    retry_status: Vec<u16>,

    /// Cancel a running call when a new one starts
    #[arg(long)]
    one: bool,

    /// Request method
    #[arg(short = 'X', long)]
    method: Option<String>,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Print status, headers and body as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut RefetchConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(timeout) = self.timeout {
            config.request.timeout_ms = timeout;
        }
        if self.one {
            config.request.mode = ModeSetting::One;
        }
        if let Some(limit) = self.limit {
            config.retry.limit = limit;
        }
        if let Some(delay) = &self.delay {
            config.retry.delay = delay.clone();
        }
        if let Some(amplify) = self.amplify {
            config.retry.amplify = amplify;
        }
        config.retry.on.extend(self.retry_on.iter().cloned());
        config.retry.statuses.extend(self.retry_status.iter().copied());

        if let Some(method) = &self.method {
            config.init.method = Some(method.clone());
        }
        for raw in &self.headers {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", raw))?;
            config
                .init
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RefetchConfig::default(),
    };
    cli.apply(&mut config)?;

    init_logging(&config.observability)?;

    let refetch = Refetch::from_config(ReqwestTransport::new(), &config)?;

    tracing::debug!(
        url = %cli.url,
        attempts = refetch.context().attempt_limit(),
        timeout = ?refetch.context().timeout(),
        delay = refetch.context().delay().name(),
        "Configuration loaded"
    );

    let handle = refetch.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, aborting");
            handle.abort();
        }
    });

    let start = Instant::now();
    match refetch.fetch(&cli.url).await {
        Ok(Fetched::Response(response)) => {
            print_response(&response, cli.json, start)?;
            Ok(ExitCode::SUCCESS)
        }
        Ok(Fetched::Aborted) => {
            eprintln!("aborted");
            Ok(ExitCode::from(EXIT_ABORTED))
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(response) = e.response() {
                print_response(response, cli.json, start)?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_response(
    response: &HttpResponse,
    as_json: bool,
    start: Instant,
) -> Result<(), serde_json::Error> {
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if as_json {
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.to_string(), Value::String(value))
            })
            .collect();

        let out = json!({
            "status": response.status_code().as_u16(),
            "elapsed_ms": elapsed_ms,
            "headers": headers,
            "body": response.text(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        eprintln!("{} ({} ms)", response.status_code(), elapsed_ms);
        println!("{}", response.text());
    }

    Ok(())
}
