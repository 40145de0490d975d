//! AkashRelay daemon entry point

use akash_relay::app::RelayApp;
use akash_relay::config::AppConfig;
use akash_relay::error::Result;
use std::env;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `akash-relay <path>` (positional)
/// - `akash-relay --config <path>` (flag-based)
/// - `akash-relay -c <path>` (short flag)
///
/// Defaults to `/etc/akashrelay.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/akashrelay.toml".to_string()
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("AkashRelay v0.2.0 starting...");

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = AppConfig::from_file(&config_path)?;

    log::info!(
        "Station: {} ({}), device {} @ {} baud",
        config.station.id,
        config.station.name,
        config.gnss.device,
        config.gnss.baud_rate
    );

    let mut app = RelayApp::new(config)?;
    app.run()?;

    log::info!("AkashRelay stopped");
    Ok(())
}
