mod app;

use std::future::IntoFuture;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use driftflow_core::Config;
use driftflow_store::{PipelineStore, PostgresStore, SqliteStore};

use crate::app::Pipeline;

fn load_config() -> Config {
    driftflow_core::config::load_dotenv();
    Config::from_env()
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn PipelineStore>> {
    if config.database.use_postgres {
        let store = PostgresStore::connect(&config.database.postgres_url()).await?;
        Ok(Arc::new(store))
    } else {
        if let Some(parent) = config.database.sqlite_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = SqliteStore::connect(&config.database.sqlite_url()).await?;
        Ok(Arc::new(store))
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();

    let store = build_store(&config).await?;
    let pipeline = Pipeline::new(config.clone(), store);

    let host = config.service.host.as_str();
    let ingest_listener = TcpListener::bind((host, config.service.ingestion_port)).await?;
    let predict_listener = TcpListener::bind((host, config.service.prediction_port)).await?;
    let monitor_listener = TcpListener::bind((host, config.service.drift_monitor_port)).await?;
    let retrain_listener = TcpListener::bind((host, config.service.retraining_port)).await?;

    info!("ingestion api listening on {}:{}", host, config.service.ingestion_port);
    info!("prediction service listening on {}:{}", host, config.service.prediction_port);
    info!("drift monitor listening on {}:{}", host, config.service.drift_monitor_port);
    info!("retraining worker listening on {}:{}", host, config.service.retraining_port);

    let background = pipeline.spawn_background();

    let ingest_app = driftflow_ingest::build_router(pipeline.ingest_state.clone());
    let predict_app = driftflow_predict::build_router(pipeline.predict_state.clone());
    let monitor_app = driftflow_monitor::build_router();
    let retrain_app = driftflow_retrain::build_router();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        res = axum::serve(ingest_listener, ingest_app).into_future() => res?,
        res = axum::serve(predict_listener, predict_app).into_future() => res?,
        res = axum::serve(monitor_listener, monitor_app).into_future() => res?,
        res = axum::serve(retrain_listener, retrain_app).into_future() => res?,
    }

    pipeline.stop.store(true, Ordering::SeqCst);
    for handle in background {
        handle.abort();
    }
    info!("pipeline stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config();
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("serve") | None => serve(config).await?,
        _ => {
            println!("driftflow v{}", env!("CARGO_PKG_VERSION"));
            println!("Usage: driftflow [serve]");
            println!("  serve    Start all pipeline services (default)");
        }
    }

    Ok(())
}
