//! grantd - temporary-grant daemon.

use grantd::config::{self, Config};
use grantd::http::{self, ApiState};
use grantd::{
    ConfigAuthority, GrantService, GrantServiceParams, MemoryBackend, TracingNotifier, metrics,
    status, telemetry,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "grantd.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("Failed to load config {}: {}", config_path, e);
        e
    })?;

    // Initialize tracing
    telemetry::init(config.logging.format);

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "Refusing to start with {} configuration error(s). See messages above.",
            errors.len()
        ));
    }

    info!(
        service = %config.service.name,
        admins = config.authority.admins.len(),
        roles = config.roles.configured().len(),
        "Starting grantd"
    );

    let backend = Arc::new(MemoryBackend::with_roles(config.roles.configured()));
    let service = GrantService::new(GrantServiceParams {
        authority: Arc::new(ConfigAuthority::new(config.authority.admins.iter().copied())),
        backend,
        roles: config.roles,
        backend_timeout: config.backend.timeout(),
    });

    // Status side file
    status::spawn_status_writer(
        service.clone(),
        config.status.path.clone(),
        config.status.interval(),
    );
    info!(
        path = %config.status.path.display(),
        interval_secs = config.status.interval_secs,
        "Status writer started"
    );

    // Key lock pruning task (runs every 5 minutes)
    {
        let service = service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                let removed = service.prune_idle_locks();
                if removed > 0 {
                    info!(removed = removed, "Idle grant locks pruned");
                }
            }
        });
    }

    // Convention: http_port = 0 disables the HTTP endpoint (used by tests).
    let http_port = config.service.http_port;
    if http_port == 0 {
        info!("HTTP endpoint disabled");
    } else {
        metrics::init();
        let state = ApiState {
            service: service.clone(),
            notifier: Arc::new(TracingNotifier),
            name: config.service.name.clone(),
        };
        tokio::spawn(async move {
            http::run_http_server(http_port, state).await;
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let cancelled = service.shutdown();
    info!(cancelled = cancelled, "Pending expiry timers cancelled");

    if let Err(e) = status::write_snapshot(&config.status.path, &service.snapshot()).await {
        warn!(error = %e, "Failed to write final status");
    }

    Ok(())
}
