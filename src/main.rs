use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing::info;

use m2http::admin::DEBUG_ADDRESS;
use m2http::bootstrap::{Service, ServiceOptions};
use m2http::config::Config;
use m2http::forwarder;
use m2http::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "m2http")]
#[command(about = "Forward MQTT messages to an HTTP endpoint", disable_version_flag = true)]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show debug info and serve diagnostics on localhost:6060
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print version info
    #[arg(short = 'V', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        display_version();
        return Ok(());
    }

    let Some(config_path) = args.config else {
        println!("No config file provided");
        Args::command().print_help()?;
        return Ok(());
    };

    init_tracing(&TracingConfig {
        json_logs: args.json_logs,
        ..TracingConfig::for_debug(args.debug)
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        debug = args.debug,
        "starting m2http"
    );

    // Configuration errors are fatal and happen before any connection attempt.
    let config = Config::load(&config_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?
        .with_debug(args.debug);

    let options = ServiceOptions {
        debug_address: args.debug.then_some(DEBUG_ADDRESS),
        ..Default::default()
    };

    Service::new(config, options)?.run().await
}

fn display_version() {
    println!("M2HTTP VERSION:\t\t{}", env!("CARGO_PKG_VERSION"));
    println!("FORWARDER VERSION:\t{}", forwarder::VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::parse_from(["m2http", "--config", "m2http.yml", "--debug"]);
        assert_eq!(args.config, Some(PathBuf::from("m2http.yml")));
        assert!(args.debug);
        assert!(!args.version);
        assert!(!args.json_logs);

        let args = Args::parse_from(["m2http", "-c", "m2http.yml", "--json-logs"]);
        assert!(args.json_logs);

        let args = Args::parse_from(["m2http"]);
        assert!(args.config.is_none());

        let args = Args::parse_from(["m2http", "--version"]);
        assert!(args.version);
    }
}
