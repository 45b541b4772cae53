mod redact;

use dotenvy::dotenv;
use redact::{RedactingMakeWriter, RedactionPatterns};
use reel_relay_core::config::StorageSettings;
use reel_relay_transport_telegram::config::{BotSettings, TelegramSettings};
use reel_relay_transport_telegram::runner::run;
use std::io;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::from_env().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Reel Relay TG Bot...");

    let settings = init_settings();

    if let Err(e) = run(settings).await {
        error!("Bot stopped with error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "reel_relay_core=info,reel_relay_transport_telegram=info,reel_relay_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,aws_config=warn,aws_smithy_runtime=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let storage_settings = match StorageSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load storage configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    match BotSettings::new(storage_settings, telegram_settings) {
        Ok(settings) => {
            info!(
                "Configuration loaded successfully (mode: {:?}).",
                settings.telegram.bot_mode
            );
            Arc::new(settings)
        }
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}
