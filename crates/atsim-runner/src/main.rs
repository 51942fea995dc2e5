//! `atsim` - serve emulated AT modems over TCP, or talk to one.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use atsim_runner::{send_commands, RunnerConfig, RunnerError, SerialServer};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atsim", version, about = "AT command modem emulator")]
struct Cli {
    /// Log filter (e.g. `info`, `atsim_modem=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve emulated modems, one TCP port each.
    Serve {
        /// YAML runner configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First port for sequential allocation.
        #[arg(short = 'p', long)]
        base_port: Option<u16>,

        /// Number of default modems (ignored with --config).
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Address to bind.
        #[arg(short, long)]
        bind: Option<String>,

        /// Serve Prometheus metrics on this address.
        #[cfg(feature = "prometheus")]
        #[arg(long)]
        metrics_addr: Option<std::net::SocketAddr>,
    },

    /// Send AT commands in order over one connection and print each response.
    Send {
        /// Modem port.
        #[arg(short, long)]
        port: u16,

        /// Modem host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Message body for AT+CMGS.
        #[arg(short, long)]
        message: Option<String>,

        /// Seconds to wait for a reply.
        #[arg(long, default_value_t = 5)]
        timeout: u64,

        /// The commands, e.g. `AT+COPS=2 AT+COPS=?`.
        #[arg(required = true)]
        commands: Vec<String>,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = match cli.command {
        Command::Serve {
            config,
            base_port,
            count,
            bind,
            #[cfg(feature = "prometheus")]
            metrics_addr,
        } => {
            #[cfg(feature = "prometheus")]
            if let Some(addr) = metrics_addr {
                if let Err(e) = atsim_metrics::install_prometheus(addr) {
                    error!("failed to start metrics exporter: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            serve(config, base_port, count, bind).await
        }
        Command::Send {
            port,
            host,
            message,
            timeout,
            commands,
        } => send(&host, port, &commands, message.as_deref(), timeout).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    base_port: Option<u16>,
    count: usize,
    bind: Option<String>,
) -> Result<(), RunnerError> {
    let mut config = match config_path {
        Some(path) => RunnerConfig::load(&path)?,
        None => RunnerConfig::with_count(count),
    };
    if let Some(port) = base_port {
        config.base_port = port;
    }
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    config.validate()?;

    atsim_metrics::describe_metrics();

    let mut server = SerialServer::from_config(&config)?;
    server.start().await?;
    server.print_modem_table();

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .map_err(|e| RunnerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    info!("serving {} modem(s), Ctrl-C to stop", config.modems.len());
    let _ = stop_rx.changed().await;

    info!("shutting down");
    server.shutdown().await;
    Ok(())
}

async fn send(
    host: &str,
    port: u16,
    commands: &[String],
    message: Option<&str>,
    timeout: u64,
) -> Result<(), RunnerError> {
    let exchanges =
        send_commands(host, port, commands, message, Duration::from_secs(timeout)).await?;
    let labelled = commands.len() > 1;
    for (command, exchange) in commands.iter().zip(&exchanges) {
        if labelled {
            println!("{}:", command);
        }
        for line in &exchange.lines {
            println!("{}", line);
        }
    }
    Ok(())
}
