// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! appgw-ingress-controller - Application Gateway configuration sync
//!
//! Runs one reconciliation pass: load the desired gateway configuration,
//! compare it with the last known one and deploy it to ARM when it changed.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use appgw_ingress_controller::config::AppGwConfig;
use appgw_ingress_controller::gateway::{add_tags, ApplicationGateway};
use appgw_ingress_controller::{AppGwIngressController, ArmClient, ConfigCache};

/// Application Gateway Ingress Controller
///
/// Pushes a desired Application Gateway configuration to Azure Resource
/// Manager, skipping the deployment when nothing but server-assigned
/// fields differ from the last known configuration.
#[derive(Parser, Debug)]
#[command(name = "appgw-ingress-controller")]
#[command(version)]
#[command(about = "Application Gateway Ingress Controller", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the desired gateway document (JSON or YAML)
    #[arg(long)]
    gateway_config: PathBuf,

    /// Path to the last deployed gateway document, used to prime the cache
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Azure subscription ID
    #[arg(long)]
    subscription_id: Option<String>,

    /// Resource group of the gateway
    #[arg(long)]
    resource_group: Option<String>,

    /// Name of the gateway
    #[arg(long)]
    gateway_name: Option<String>,

    /// Azure Resource Manager endpoint
    #[arg(long)]
    arm_endpoint: Option<String>,

    /// Maximum time to wait for the deployment to complete
    #[arg(long, value_parser = parse_duration)]
    deployment_timeout: Option<Duration>,

    /// Only report whether a deployment is needed
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    log_json: bool,
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(s)
        .map_err(|e| anyhow::anyhow!("invalid duration: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.log_json)?;

    info!("starting appgw-ingress-controller");

    let dry_run = args.dry_run;
    let gateway_config = args.gateway_config.clone();
    let baseline = args.baseline.clone();
    let config = load_config(args).await?;
    config.validate().context("invalid configuration")?;

    info!(
        "configuration: gateway={}, endpoint={}, timeout={}",
        config.gateway,
        config.arm.endpoint,
        humantime::format_duration(config.deployment.timeout)
    );

    let mut gateway = load_gateway(&gateway_config).await?;
    add_tags(&mut gateway);

    let config_cache = ConfigCache::new();
    if let Some(path) = baseline {
        let mut previous = load_gateway(&path).await?;
        add_tags(&mut previous);
        config_cache
            .store(&previous)
            .context("failed to cache baseline configuration")?;
    }

    if !config_cache.has_changed(&gateway) {
        info!("configuration unchanged; skipping deployment");
        return Ok(());
    }

    if dry_run {
        info!("configuration changed; dry run, not deploying");
        return Ok(());
    }

    let token = std::env::var(&config.arm.token_env)
        .with_context(|| format!("missing ARM bearer token in ${}", config.arm.token_env))?;
    let client = ArmClient::new(&config.arm, config.gateway.subscription_id.clone(), token)
        .context("failed to create ARM client")?;

    let mut controller = AppGwIngressController::new(Arc::new(client), config.gateway.clone())
        .with_config_cache(config_cache)
        .with_deployment_timeout(config.deployment.timeout);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        shutdown.cancel();
    });

    match controller.deploy_config(&gateway, &cancel).await {
        Ok(deployment) => {
            info!(
                "deployment {} in {}",
                deployment.outcome(),
                humantime::format_duration(deployment.elapsed)
            );
            Ok(())
        }
        Err(e) => {
            error!(outcome = %e.outcome(), "deployment failed: {:#}", e);
            Err(e.into())
        }
    }
}

/// Initializes logging based on the provided level and format.
fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.parse::<Directive>().context("invalid log level")?)
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init();
    }
    Ok(())
}

/// Loads the configuration from file or command-line arguments.
async fn load_config(mut args: Args) -> anyhow::Result<AppGwConfig> {
    let mut config = if let Some(config_path) = args.config.take() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("failed to read config file: {:?}", config_path))?;

        serde_yaml::from_str::<AppGwConfig>(&content)
            .with_context(|| format!("failed to parse config file: {:?}", config_path))?
    } else {
        AppGwConfig::default()
    };

    // Override with command-line arguments
    if let Some(subscription_id) = args.subscription_id {
        config.gateway.subscription_id = subscription_id;
    }
    if let Some(resource_group) = args.resource_group {
        config.gateway.resource_group = resource_group;
    }
    if let Some(name) = args.gateway_name {
        config.gateway.name = name;
    }
    if let Some(endpoint) = args.arm_endpoint {
        config.arm.endpoint = endpoint;
    }
    if let Some(timeout) = args.deployment_timeout {
        config.deployment.timeout = timeout;
    }

    Ok(config)
}

/// Reads a gateway document, as JSON when the extension says so and YAML otherwise.
async fn load_gateway(path: &Path) -> anyhow::Result<ApplicationGateway> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read gateway document: {:?}", path))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let gateway = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse gateway document: {:?}", path))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse gateway document: {:?}", path))?
    };
    Ok(gateway)
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) = match (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!("failed to install signal handlers: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, cancelling deployment");
            }
            _ = sigint.recv() => {
                info!("received SIGINT, cancelling deployment");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling deployment");
        }
    }
}
