//! TermChat server entry point.
//!
//! Binary name: `termchat`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then runs the
//! telnet chat listener and the HTTP health endpoint until Ctrl+C or SIGTERM.

mod cli;
mod http;
mod state;
mod telnet;

use anyhow::Context;
use clap::Parser;
use termchat_infra::config::{config_path, load_server_config, resolve_data_dir};
use termchat_infra::crypto::cipher::MessageCipher;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    termchat_observe::tracing_setup::init_tracing(cli.log_filter(), cli.otel)
        .map_err(|err| anyhow::anyhow!(err))?;

    let result = run(cli).await;
    if let Err(err) = &result {
        error!("termchat exited with error: {err:#}");
    }
    termchat_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::GenKey => {
            println!("{}", MessageCipher::generate_key());
            Ok(())
        }
        Commands::Serve => serve(cli).await,
    }
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| config_path(&data_dir, cli.env.as_str()));

    let mut config = load_server_config(&config_file).await;
    if let Some(addr) = cli.tcp_addr {
        config.tcp_addr = addr;
    }
    if let Some(addr) = cli.http_addr {
        config.http_addr = addr;
    }

    let state = AppState::init(config, &data_dir).await?;
    let tcp_addr = state.config.tcp_addr.clone();
    let http_addr = state.config.http_addr.clone();

    let telnet_listener = tokio::net::TcpListener::bind(&tcp_addr)
        .await
        .with_context(|| format!("binding telnet listener on {tcp_addr}"))?;
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("binding http listener on {http_addr}"))?;

    info!(
        env = cli.env.as_str(),
        telnet = %tcp_addr,
        http = %http_addr,
        data_dir = %data_dir.display(),
        "termchat listening"
    );

    let shutdown = CancellationToken::new();
    let telnet_task = tokio::spawn(telnet::serve(
        telnet_listener,
        state.clone(),
        shutdown.clone(),
    ));

    let router = http::router::build_router(state);
    let http_shutdown = shutdown.clone();
    axum::serve(http_listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            http_shutdown.cancel();
        })
        .await
        .context("http server failed")?;

    shutdown.cancel();
    if let Err(err) = telnet_task.await {
        error!(error = %err, "telnet listener task failed");
    }
    info!("server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A handler that cannot be installed is logged and treated as never firing.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}
