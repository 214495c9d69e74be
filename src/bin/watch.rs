use std::path::Path;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hypixel_watch::monitor_modules::config::{CliArgs, MonitorConfig};
use hypixel_watch::monitor_modules::poll_loop::PollLoop;
use hypixel_watch::version::VERSION;

fn init_logging(log_dir: Option<&Path>) {
    // Optional file log: JSON format, daily rotation
    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(rolling::daily(dir, "hypixel-watch.log"))
            .with_ansi(false)
            .json()
    });

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` must be in the environment before clap reads HYPIXEL_API_KEY.
    let args = match CliArgs::parse_with_env_file(None, std::env::args_os()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    init_logging(args.log_dir.as_deref());
    info!(version = VERSION, "Starting hypixel-watch...");

    let config = match MonitorConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Critical error loading configuration. Exiting.");
            return ExitCode::FAILURE;
        }
    };

    let mut poll_loop = match PollLoop::from_config(&config).await {
        Ok(poll_loop) => poll_loop,
        Err(e) => {
            error!(error = %e, "Critical error during startup. Exiting.");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Interrupt received, shutting down...");
        // The receiver lives as long as the loop; a send error only means it already ended.
        let _ = shutdown_tx.send(());
    });

    poll_loop.run(shutdown_rx).await;
    ExitCode::SUCCESS
}
