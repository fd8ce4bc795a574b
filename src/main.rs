use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use candela_back_end::api;
use candela_back_end::utils::app_config::AppConfig;
use candela_back_end::workers::config::MarketDataConfig;
use candela_back_end::workers::context::MarketDataContext;
use candela_back_end::workers::scheduler::spawn_workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
                .as_str(),
        )
        .init();

    let app_config = AppConfig::from_env()?;
    let market_config = MarketDataConfig::from_env();
    tracing::info!(enabled = market_config.enabled, "configuration loaded");

    let ctx = Arc::new(MarketDataContext::new(app_config.pool, market_config));

    let (stop_tx, stop_rx) = watch::channel(false);
    let worker_handles = if ctx.config.enabled {
        spawn_workers(ctx.clone(), stop_rx)
    } else {
        tracing::info!("market data workers disabled");
        Vec::new()
    };

    let router = api::router(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Starting market data API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = stop_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
