use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::payments::signature;

#[derive(Subcommand)]
pub enum WebhookCommands {
    #[command(about = "Produce a stripe-signature header for a payload file")]
    Sign {
        #[arg(help = "File containing the raw event body")]
        file: PathBuf,
        #[arg(long, help = "Unix timestamp to sign with (defaults to now)")]
        timestamp: Option<i64>,
    },
}

pub async fn handle(cmd: WebhookCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        WebhookCommands::Sign { file, timestamp } => sign(file, timestamp, output_format).await,
    }
}

async fn sign(file: PathBuf, timestamp: Option<i64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let payload = tokio::fs::read(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let secret = &config::config().stripe.webhook_secret;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let header = signature::sign(&payload, secret, timestamp)?;

    match output_format {
        OutputFormat::Text => {
            println!("stripe-signature: {}", header);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            "Payload signed",
            Some(json!({ "header": "stripe-signature", "value": header, "timestamp": timestamp })),
        ),
    }
}
