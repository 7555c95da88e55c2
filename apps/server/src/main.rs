use tokio_util::sync::CancellationToken;
use userfeed_server::{
    api::app_router, build_state, config::Config, init_tracing, start_feed_pruner,
    start_user_relay,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    let shutdown = CancellationToken::new();
    let relay = start_user_relay(&state, shutdown.child_token()).await?;
    let pruner = start_feed_pruner(&state, &config, shutdown.child_token());

    let router = app_router(state, &config);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(relay) = relay {
        if let Err(e) = relay.await {
            tracing::error!("User change relay task failed: {}", e);
        }
        tracing::info!("User change relay stopped");
    }
    if let Some(pruner) = pruner {
        if let Err(e) = pruner.await {
            tracing::error!("Change feed pruner task failed: {}", e);
        }
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
