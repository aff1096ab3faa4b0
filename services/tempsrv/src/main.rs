//! Temperature UDP Service (tempsrv)
//!
//! Listens for DS18B20 ModBus-RTU frames over UDP and logs readings and device
//! status changes as JSON lines.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info, warn};

use errors::TempUdpResult;
use tempsrv::{AppConfig, LogSink, TemperatureService};

/// Command-line arguments for tempsrv
#[derive(Parser, Clone, Debug)]
#[command(
    name = "tempsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "DS18B20 temperature receiver for ModBus-RTU over UDP",
    long_about = None
)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long, env = "TEMPSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// UDP bind address
    #[arg(short = 'b', long)]
    bind_address: Option<String>,

    /// UDP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(bind_address) = &self.bind_address {
            config.udp.bind_address = bind_address.clone();
        }
        if let Some(port) = self.port {
            config.udp.port = port;
        }
    }
}

/// Filter directive to apply on SIGHUP; a CLI `--log-level` stays pinned
fn reload_directive(config_path: Option<&Path>, cli_level: Option<&str>) -> TempUdpResult<String> {
    match cli_level {
        Some(level) => Ok(level.to_string()),
        None => Ok(AppConfig::load(config_path)?.logging.level),
    }
}

#[tokio::main]
async fn main() -> TempUdpResult<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let mut log_config = config.log_config();
    log_config.ansi = !args.no_color;
    common::init_with_config(log_config)?;
    info!(
        "{} v{} (log filter: {})",
        config.service.name,
        env!("CARGO_PKG_VERSION"),
        common::get_log_level()
    );

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let service = match TemperatureService::start(&config, LogSink).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start {}: {} [{}]", config.service.name, e, e.error_code());
            return Err(e);
        },
    };

    let token = service.cancellation_token();
    let signal_watcher = common::cancel_on_shutdown(token.clone());
    let config_path = args.config.clone();
    let cli_level = args.log_level.clone();
    let reload_listener = common::reload_on_hangup(token.clone(), move || {
        let applied = reload_directive(config_path.as_deref(), cli_level.as_deref())
            .and_then(|directive| common::set_log_level(&directive));
        if let Err(e) = applied {
            warn!("Log filter unchanged: {} [{}]", e, e.error_code());
        }
    });
    token.cancelled().await;

    info!("{}", service.status_report());
    service.shutdown().await?;
    let _ = signal_watcher.await;
    let _ = reload_listener.await;

    info!("Service shutdown complete");
    Ok(())
}
