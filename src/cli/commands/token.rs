use clap::Subcommand;
use serde_json::json;

use crate::auth::TokenVerifier;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::server::Backends;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Resolve a bearer token to its user and role")]
    Verify {
        #[arg(help = "Access token (without the 'Bearer ' prefix)")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Verify { token } => verify(&token, output_format).await,
    }
}

async fn verify(token: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    config.validate()?;

    let backends = Backends::from_config(config)?;
    let verifier = TokenVerifier::new(backends.identity);
    let header = format!("Bearer {}", token);

    match verifier.verify(Some(&header)).await {
        Ok(identity) => {
            if output_format == OutputFormat::Text {
                println!("User:  {}", identity.id);
                println!("Email: {}", identity.email.as_deref().unwrap_or("-"));
                println!("Role:  {}", identity.role().unwrap_or("-"));
            }
            output_success(
                &output_format,
                "Token is valid",
                Some(json!({
                    "user_id": identity.id,
                    "email": identity.email,
                    "role": identity.role(),
                })),
            )
        }
        Err(e) => {
            output_error(&output_format, &e.to_string(), Some("INVALID_TOKEN"))?;
            anyhow::bail!("token rejected")
        }
    }
}
