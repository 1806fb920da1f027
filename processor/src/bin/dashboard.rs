use aws_config::BehaviorVersion;
use axum::{routing::get, Router};
use processor::config::Config;
use processor::params::{DatabaseSettings, ParameterResolver, SsmParameterStore};
use processor::{db, logging, metrics, rest};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(config.log_format);

    info!("Starting event dashboard");
    info!("HTTP server: {}", config.http_addr);

    metrics::init_dashboard_metrics();

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let params = ParameterResolver::new(
        Arc::new(SsmParameterStore::new(&aws)),
        config.parameter_prefix.clone(),
    );

    let settings = match DatabaseSettings::resolve(&params).await {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to resolve database settings: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::make_pool(&settings).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(pool, settings.table.clone()));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
