use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{load_config, resolve, send, serve, template, ServeParams};
use xhub::config::LoggingConfig;

#[derive(Parser)]
#[command(
    name = "xhub",
    version,
    about = "Fleet coordination hub: node liveness, domain assignment and resolution",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Operator HTTP API bind address
        #[arg(long)]
        http: Option<SocketAddr>,

        /// UDP control-plane bind address
        #[arg(long)]
        udp: Option<SocketAddr>,
    },

    /// Restore a template file and print its normalised form
    Template {
        /// Template file
        file: PathBuf,

        /// Directory of uploaded module assets
        #[arg(long, default_value = "files")]
        files_dir: PathBuf,
    },

    /// Ask a running hub to resolve a domain
    Resolve {
        /// Domain to resolve
        domain: String,

        /// Hub control-plane address
        #[arg(long, default_value = "127.0.0.1:51701")]
        hub: SocketAddr,

        /// Seconds to wait for the reply
        #[arg(long, default_value = "3")]
        timeout: u64,
    },

    /// Send one raw control datagram to a hub
    Send {
        /// Datagram payload, e.g. "N>:9000>app.jar"
        message: String,

        /// Hub control-plane address
        #[arg(long, default_value = "127.0.0.1:51701")]
        hub: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let hub_config = match &cli.command {
        Commands::Serve { config, http, udp } => Some(load_config(&ServeParams {
            config: config.clone(),
            http: *http,
            udp: *udp,
        })?),
        _ => None,
    };

    let mut logging = hub_config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    setup_tracing(&logging, cli.verbose)?;

    match cli.command {
        Commands::Serve { .. } => {
            if let Some(config) = hub_config {
                serve(config).await?;
            }
        }

        Commands::Template { file, files_dir } => {
            tracing::debug!(file = %file.display(), "Starting template command");
            template(file, files_dir)?;
        }

        Commands::Resolve {
            domain,
            hub,
            timeout,
        } => {
            tracing::debug!(domain = %domain, hub = %hub, "Starting resolve command");
            resolve(domain, hub, timeout).await?;
        }

        Commands::Send { message, hub } => {
            tracing::debug!(hub = %hub, "Starting send command");
            send(message, hub).await?;
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("xhub=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("xhub={},warn", logging.level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xhub=info,warn"))
    };

    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}
