//! Campaign Checkpoint — command-line host for the client SDK runtime.
//!
//! Initializes a session against the live campaign API, identifies a
//! customer and triggers a single checkpoint, printing the surface the SDK
//! would open (or the navigate event it would publish).

use campaign_core::types::{CustomProperties, Environment, PropertyValue};
use campaign_core::{NavigateEvent, SdkError};
use campaign_mobile_sdk::surface::{SurfaceHost, SurfaceRequest};
use campaign_mobile_sdk::{CampaignSession, LogLevel, SdkConfig, SubmitOutcome};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-checkpoint")]
#[command(about = "Trigger a campaign checkpoint for a customer")]
#[command(version)]
struct Cli {
    /// Public access key
    #[arg(long, env = "CAMPAIGN_SDK__ACCESS_KEY")]
    access_key: String,

    /// Campaign environment (test or production)
    #[arg(long, env = "CAMPAIGN_SDK__ENVIRONMENT", default_value = "test")]
    environment: Environment,

    /// External user identifier
    #[arg(long)]
    user_id: String,

    #[arg(long)]
    email: String,

    #[arg(long, default_value = "")]
    name: String,

    /// Custom property as key=value; repeatable
    #[arg(long = "property", value_parser = parse_property)]
    properties: Vec<(String, PropertyValue)>,

    /// Checkpoint name to trigger
    #[arg(long)]
    checkpoint: String,

    /// Publish a navigate event instead of opening a new surface
    #[arg(long, default_value_t = false)]
    navigate: bool,

    /// Send a liveness ping for the campaign after identifying
    #[arg(long, default_value_t = false)]
    ping: bool,

    /// UI base URL (overrides config)
    #[arg(long)]
    ui_base_url: Option<String>,

    /// API base URL (overrides config)
    #[arg(long)]
    api_base_url: Option<String>,

    /// Enable SDK logging at debug level (overrides config)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

/// Values that parse as JSON scalars keep their type; anything else is a string.
fn parse_property(raw: &str) -> Result<(String, PropertyValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty property key in '{raw}'"));
    }
    let value = serde_json::from_str::<PropertyValue>(value)
        .unwrap_or_else(|_| PropertyValue::from(value));
    Ok((key.to_string(), value))
}

/// CLI flags win over the loaded configuration; unset flags leave it alone.
fn apply_overrides(cli: &Cli, mut config: SdkConfig) -> SdkConfig {
    if let Some(url) = &cli.ui_base_url {
        config.ui_base_url = url.clone();
    }
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = url.clone();
    }
    if cli.verbose {
        config.enable_sdk_logging = true;
        config.log_level = LogLevel::Debug;
    }
    config
}

/// Prints each opened surface as one JSON line on stdout.
struct ConsoleSurfaceHost;

impl SurfaceHost for ConsoleSurfaceHost {
    fn open(&self, request: SurfaceRequest) -> anyhow::Result<()> {
        let line = serde_json::json!({
            "event": "open",
            "url": request.url,
            "backgroundColor": request.background_color,
        });
        println!("{line}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_checkpoint=info,campaign_mobile_sdk=info,campaign_sdk=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = apply_overrides(
        &cli,
        SdkConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            SdkConfig::default()
        }),
    );

    info!(
        ui_base_url = %config.ui_base_url,
        api_base_url = %config.api_base_url,
        sdk_logging = config.enable_sdk_logging,
        environment = %cli.environment,
        "Configuration loaded"
    );

    let session = CampaignSession::with_http(&config)?;
    session.initialize(&cli.access_key, cli.environment)?;

    let properties: Option<CustomProperties> =
        (!cli.properties.is_empty()).then(|| cli.properties.into_iter().collect());
    let customer = session
        .identify(&cli.user_id, &cli.email, &cli.name, properties)
        .await?;
    info!(customer_id = %customer.id, "Customer identified");

    if cli.ping {
        session.ping_campaign().await?;
        info!("Campaign ping sent");
    }

    let _navigation = session
        .navigation_bus()
        .subscribe(Arc::new(|event: &NavigateEvent| {
            let line = serde_json::json!({
                "event": "navigate",
                "url": event.destination_url,
                "backgroundColor": event.background_color,
            });
            println!("{line}");
        }));

    let outcome = session
        .checkpoint(&cli.checkpoint)
        .navigate(cli.navigate)
        .on_invalid(|| warn!("surface reported invalid"))
        .submit(Arc::new(ConsoleSurfaceHost))?;

    match outcome {
        SubmitOutcome::Opened | SubmitOutcome::Navigated => {
            info!(checkpoint = %cli.checkpoint, ?outcome, "Checkpoint triggered");
        }
        SubmitOutcome::Skipped(reason) => {
            warn!(checkpoint = %cli.checkpoint, %reason, "Checkpoint skipped");
            return Err(SdkError::from(reason).into());
        }
        SubmitOutcome::Invalid | SubmitOutcome::Queued => {
            anyhow::bail!("checkpoint '{}' did not run: {outcome:?}", cli.checkpoint);
        }
    }

    Ok(())
}
