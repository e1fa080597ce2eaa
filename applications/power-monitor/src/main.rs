use power_monitor::{
    api::{create_router, AppState},
    config::{AnomalyModelConfig, Config},
    db,
    frequency::FrequencyDetector,
    heartbeat::{Heartbeat, Watchdog},
    listener::Listener,
    memory::MemoryStatusStore,
    monitor::{Collaborators, Monitor},
    predictor::{
        AnomalyPredictor, EnergyForecaster, HttpAnomalyPredictor, HttpClassifier,
        HttpEnergyForecaster,
    },
    redpanda,
    repositories::{PgAlertRepository, PgDeviceRepository, PgTelemetryRepository},
    store::{AlertSink, DeviceStatusStore},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting power-monitor");

    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        subject = %cfg.monitor.subject,
        devices = cfg.devices.len(),
        "loaded config from {}",
        cfg_path
    );

    let pool = db::connect(&cfg.database.url, cfg.database.max_connections).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("connected to database");

    let memory_store = Arc::new(MemoryStatusStore::new());
    let alerts: Arc<dyn AlertSink> = Arc::new(PgAlertRepository::new(pool.clone()));
    let status_stores: Vec<Arc<dyn DeviceStatusStore>> = vec![
        memory_store.clone() as Arc<dyn DeviceStatusStore>,
        Arc::new(PgDeviceRepository::new(pool.clone())),
    ];

    let anomaly: Arc<dyn AnomalyPredictor> = match &cfg.models.anomaly {
        AnomalyModelConfig::Http(endpoint) => {
            info!(url = %endpoint.url, "using HTTP anomaly model");
            Arc::new(HttpAnomalyPredictor::new(endpoint)?)
        }
        AnomalyModelConfig::Frequency {
            alert_threshold,
            bucket_width,
        } => {
            info!(
                alert_threshold = *alert_threshold,
                bucket_width = *bucket_width,
                "using frequency anomaly detector"
            );
            Arc::new(FrequencyDetector::new(*alert_threshold, *bucket_width))
        }
    };

    let forecaster = match &cfg.models.energy {
        Some(endpoint) => {
            info!(url = %endpoint.url, "using HTTP energy model");
            Some(Arc::new(HttpEnergyForecaster::new(endpoint)?) as Arc<dyn EnergyForecaster>)
        }
        None => {
            info!("no energy model configured");
            None
        }
    };

    let monitor = Arc::new(Monitor::new(
        &cfg.monitor,
        cfg.debounce.clone(),
        cfg.device_names(),
        Collaborators {
            classifier: Arc::new(HttpClassifier::new(&cfg.models.classifier)?),
            anomaly,
            telemetry: Arc::new(PgTelemetryRepository::new(pool.clone())),
            status_stores,
            alerts: alerts.clone(),
        },
    ));

    let heartbeat = Arc::new(Heartbeat::new(
        cfg.monitor.subject.clone(),
        chrono::Duration::seconds(cfg.heartbeat.threshold_secs as i64),
        chrono::Utc::now(),
    ));
    let watchdog = Arc::new(Watchdog::new(
        heartbeat.clone(),
        monitor.clone(),
        Duration::from_secs(cfg.heartbeat.check_interval_secs),
    ));
    watchdog.start();

    let consumer = redpanda::create_consumer(&cfg.redpanda)?;
    info!(
        brokers = %cfg.redpanda.brokers,
        group_id = %cfg.redpanda.group_id,
        topic = %cfg.redpanda.topic,
        "connected to Redpanda"
    );
    let listener = Arc::new(Listener::new(monitor.clone(), heartbeat.clone()));
    let listener_task = tokio::spawn(listener.run(consumer));

    let router = create_router(AppState {
        monitor,
        devices: memory_store,
        alerts,
        heartbeat,
        forecaster,
    });
    let addr = cfg.api_bind_address();
    let tcp = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!("API server listening on {}", addr);

    if let Err(e) = axum::serve(tcp, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "API server error");
    }

    watchdog.stop().await;
    listener_task.abort();

    info!("Application shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
