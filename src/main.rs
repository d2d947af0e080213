//! doser-rpc - command-line access to a Borneo doser.
//!
//! Connection settings come from `DOSER_*` environment variables and can be
//! overridden per invocation with flags. Results are printed to stdout as
//! JSON; logs go to stderr (`RUST_LOG=doser_rpc=debug` for wire details).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doser_rpc::{ClientConfig, Doser, DoserClient};

#[derive(Debug, Parser)]
#[command(name = "doser-rpc", version, about = "JSON-RPC client for Borneo dosers")]
struct Cli {
    /// Device host name or IP address
    #[arg(long)]
    host: Option<String>,

    /// Device RPC port
    #[arg(long)]
    port: Option<u16>,

    /// Connection timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Idle-read timeout in milliseconds (0 waits forever)
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Call one method; PARAMS is a JSON array (default `[]`)
    Call { method: String, params: Option<String> },
    /// Call several methods in one round trip; each CALL is METHOD or METHOD=PARAMS
    Batch {
        #[arg(required = true)]
        calls: Vec<String>,
    },
    /// Print the device identity
    Hello,
    /// Print pump status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "doser_rpc=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!("Using device at {}", config.address());

    let client = DoserClient::new(config);

    match cli.command {
        Command::Call { method, params } => {
            let params = parse_params(params.as_deref())?;
            let result = client
                .call(method.as_str(), params)
                .await
                .with_context(|| format!("{} failed", method))?;
            print_json(&result)?;
        }
        Command::Batch { calls } => {
            let calls = calls
                .iter()
                .map(|spec| parse_call(spec))
                .collect::<Result<Vec<_>>>()?;
            let methods: Vec<String> = calls.iter().map(|(m, _)| m.clone()).collect();
            let results = client.call_batch(calls).await.context("batch failed")?;

            for (method, result) in methods.iter().zip(results) {
                match result {
                    Ok(value) => println!("{}: {}", method, serde_json::to_string(&value)?),
                    Err(remote) => println!("{}: error {}", method, remote.into_payload()),
                }
            }
        }
        Command::Hello => {
            let info = Doser::new(client).hello().await.context("sys.hello failed")?;
            print_json(&info)?;
        }
        Command::Status => {
            let status = Doser::new(client)
                .status()
                .await
                .context("doser.status failed")?;
            print_json(&status)?;
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("Invalid DOSER_* environment")?;
    if let Some(host) = &cli.host {
        config = config.with_host(host.clone());
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(ms) = cli.connect_timeout_ms {
        if ms == 0 {
            bail!("--connect-timeout-ms must be positive");
        }
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.read_timeout_ms {
        config = config.with_read_timeout((ms > 0).then(|| Duration::from_millis(ms)));
    }
    Ok(config)
}

fn parse_params(raw: Option<&str>) -> Result<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let parsed = serde_json::from_str::<Value>(raw)
        .with_context(|| format!("Invalid params JSON: {}", raw))?;
    match parsed {
        Value::Array(params) => Ok(params),
        other => Err(anyhow!("params must be a JSON array, got {}", other)),
    }
}

fn parse_call(spec: &str) -> Result<(String, Vec<Value>)> {
    let (method, params) = match spec.split_once('=') {
        Some((method, params)) => (method, Some(params)),
        None => (spec, None),
    };
    if method.is_empty() {
        bail!("Missing method name in {:?}", spec);
    }
    Ok((method.to_string(), parse_params(params)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
