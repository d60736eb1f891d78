//! forecast-demo - 通过弹性客户端获取天气预报
//!
//! Usage:
//!   forecast-demo                  Use $RESILIENT_HTTP_CONFIG, or a built-in `primary` client
//!   forecast-demo --config <path>  Load clients from a YAML file
//!   forecast-demo --timeout <secs> Give up after <secs> (default: wait forever)
//!
//! Logging follows RUST_LOG (default `info`).

use anyhow::{bail, Context};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use resilient_http::config::Config;
use resilient_http::forecast::{ForecastService, PRIMARY_CLIENT};

const DEFAULT_UPSTREAM: &str = "https://google.com";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path: Option<String> = None;
    let mut timeout: Option<Duration> = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(it.next().context("--config needs a path")?.clone());
            }
            "--timeout" | "-t" => {
                let secs: u64 = it
                    .next()
                    .context("--timeout needs a value")?
                    .parse()
                    .context("--timeout must be a whole number of seconds")?;
                timeout = Some(Duration::from_secs(secs));
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    let config = match config_path {
        Some(path) => Config::from_path(&path).with_context(|| format!("loading {path}"))?,
        None => match Config::from_env()? {
            Some(config) => config,
            None => Config::from_yaml_str(&default_config())?,
        },
    };
    let registry = config.build_registry()?;
    if !registry.contains(PRIMARY_CLIENT) {
        bail!("config has no '{PRIMARY_CLIENT}' client");
    }

    let service = ForecastService::new(registry);
    let forecasts = match timeout {
        None => service.get().await?,
        Some(limit) => service
            .get_with_deadline(limit)
            .await
            .context("upstream did not become reachable in time")?,
    };

    println!("{}", serde_json::to_string_pretty(&forecasts)?);
    Ok(())
}

fn default_config() -> String {
    format!(
        "clients:\n  - name: {PRIMARY_CLIENT}\n    base_url: {DEFAULT_UPSTREAM}\n    headers:\n      accept: application/json\n"
    )
}

fn print_usage() {
    println!(
        r#"forecast-demo - resilient-http demo

USAGE:
    forecast-demo [--config <path>] [--timeout <secs>]

ENVIRONMENT:
    RESILIENT_HTTP_CONFIG          Client config path
    RESILIENT_HTTP_RETRY_DELAY_MS  Retry delay override
    RESILIENT_HTTP_TIMEOUT_SECS    Per-request timeout override
    RUST_LOG                       Log filter"#
    );
}
