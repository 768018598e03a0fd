//! bastion-server: a login endpoint guarded by the bastion pipeline.

mod config;

use std::{net::SocketAddr, sync::Arc};

use bastion::{
    Bastion, BastionBuilder, EventBus, LoggingEventHandler, SqliteRepositoryProvider,
    UnlockReason,
};
use clap::Parser;
use tokio::{signal, sync::watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command, ServeArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match &cli.command {
        Command::Serve(args) => {
            let bastion = connect(&cli, true).await?;
            serve(bastion, args).await
        }
        Command::Migrate => {
            connect(&cli, true).await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::Sweep => {
            let bastion = connect(&cli, false).await?;
            let report = bastion.sweep().await?;
            info!(
                released_locks = report.released_locks,
                deleted_locks = report.deleted_locks,
                deleted_attempts = report.deleted_attempts,
                "Sweep complete"
            );
            Ok(())
        }
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            let bastion = connect(&cli, false).await?;
            let user = bastion.create_user(username, email, password).await?;
            info!(user_id = %user.id, username = %user.username, "User created");
            Ok(())
        }
        Command::Unlock { identifier } => {
            let bastion = connect(&cli, false).await?;
            let released = bastion
                .unlock_identifier(identifier, UnlockReason::AdminAction)
                .await?;
            info!(released, "Unlock complete");
            Ok(())
        }
    }
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn connect(
    cli: &Cli,
    apply_migrations: bool,
) -> anyhow::Result<Bastion<SqliteRepositoryProvider>> {
    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingEventHandler)).await;

    let bastion = BastionBuilder::new()
        .with_sqlite(&cli.database_url)
        .await?
        .with_config(cli.policy.to_config())
        .with_event_bus(event_bus)
        .apply_migrations(apply_migrations)
        .build()
        .await?;

    Ok(bastion)
}

async fn serve(bastion: Bastion<SqliteRepositoryProvider>, args: &ServeArgs) -> anyhow::Result<()> {
    let bastion = Arc::new(bastion);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = bastion.start_cleanup_task(shutdown_rx);

    let app = bastion_axum::routes(bastion.clone())
        .trust_forwarded_headers(args.trust_forwarded_headers)
        .build();

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %args.listen,
        "Starting HTTP server"
    );

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = cleanup.await {
        error!(error = %e, "Cleanup task ended abnormally");
    }

    info!("bastion-server shutdown complete");
    result.map_err(Into::into)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
