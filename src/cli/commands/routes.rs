use std::sync::Arc;

use serde_json::json;

use crate::cli::OutputFormat;
use crate::config;
use crate::handlers;
use crate::payments::{PaymentProcessor, StripeWebhookProcessor};
use crate::store::{MemoryStore, NotificationStore};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();

    // The table shape does not depend on the backend, so no Supabase connection is needed
    let store: Arc<dyn NotificationStore> = Arc::new(MemoryStore::new());
    let payments: Arc<dyn PaymentProcessor> = Arc::new(StripeWebhookProcessor::new(&config.stripe));
    let table = handlers::route_table(store, payments, &config.reminders)?;

    let prefix = config.server.route_prefix.trim_end_matches('/');
    let fallback = table.fallback();

    match output_format {
        OutputFormat::Json => {
            let routes: Vec<_> = table
                .entries()
                .into_iter()
                .map(|(name, route)| {
                    json!({
                        "endpoint": name,
                        "path": format!("{}/{}", prefix, name),
                        "access": route.access.to_string(),
                        "methods": route.methods(),
                    })
                })
                .collect();
            let body = json!({
                "routes": routes,
                "fallback": {
                    "access": fallback.access.to_string(),
                    "methods": fallback.methods(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            println!("{:<20} {:<16} {}", "ENDPOINT", "ACCESS", "METHODS");
            for (name, route) in table.entries() {
                println!("{:<20} {:<16} {}", name, route.access.to_string(), route.methods().join(", "));
            }
            println!("{:<20} {:<16} {}", "(other)", fallback.access.to_string(), "any");
            println!();
            println!("Endpoints are served under {}/<endpoint>", prefix);
        }
    }

    Ok(())
}
