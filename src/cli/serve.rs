//! Serve command implementation

use crate::balancer::LoadBalancer;
use crate::cli::ServeArgs;
use crate::config::{FulcrumConfig, LogFormat};
use crate::proxy::{create_admin_router, create_router, AdminState, AppState, HttpForwarder};
use crate::registry::Backend;
use crate::routing::create_strategy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<FulcrumConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        FulcrumConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        FulcrumConfig::default()
    };

    config = config.with_env_overrides();

    // Apply CLI overrides (highest priority)
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref strategy) = args.strategy {
        config.load_balancer.strategy = strategy.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }

    Ok(config.apply_defaults())
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Add the configured backends to the balancer in file order.
///
/// Entries whose URL does not parse, or that repeat an earlier URL, are
/// skipped with a warning. Returns how many backends were added.
pub fn load_backends_from_config(config: &FulcrumConfig, balancer: &LoadBalancer) -> usize {
    let mut added = 0;
    for backend_config in &config.backends {
        let backend = match Backend::parse(&backend_config.url, backend_config.weight) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(url = %backend_config.url, error = %e, "Skipping backend");
                continue;
            }
        };

        match balancer.add_backend(backend) {
            Ok(_) => added += 1,
            Err(e) => tracing::warn!(url = %backend_config.url, error = %e, "Skipping backend"),
        }
    }
    added
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load, merge and validate configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;
    tracing::info!("Starting Fulcrum");
    tracing::debug!(?config, "Loaded configuration");
    let metrics_handle = crate::metrics::metrics_handle();

    // 3. Build the balancer and load backends
    let strategy = create_strategy(&config.load_balancer.strategy)?;
    let balancer = Arc::new(LoadBalancer::new(strategy));
    let added = load_backends_from_config(&config, &balancer);
    tracing::info!(
        strategy = balancer.strategy_name(),
        backends = added,
        "Load balancer ready"
    );
    if added == 0 {
        tracing::warn!("No backends configured, every request will get 503");
    }

    // 4. Start health checking
    if config.health_check.enabled {
        balancer.start_health_checking(config.health_check.clone())?;
    } else {
        tracing::info!("Health checking disabled");
    }

    let cancel_token = CancellationToken::new();

    // 5. Admin listener
    let admin_handle = match config.server.admin_port {
        Some(admin_port) => {
            let state = Arc::new(AdminState::new(Arc::clone(&balancer), metrics_handle));
            let addr = format!("{}:{}", config.server.host, admin_port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(addr = %addr, "Admin listener started");

            let shutdown = cancel_token.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, create_admin_router(state))
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
            }))
        }
        None => None,
    };

    // 6. Proxy listener
    let forwarder = Arc::new(HttpForwarder::new(None)?);
    let state = Arc::new(AppState::new(Arc::clone(&balancer), forwarder));
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Fulcrum listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
    .await?;

    // 7. Cleanup
    cancel_token.cancel();
    if let Some(handle) = admin_handle {
        handle.await??;
    }
    tracing::info!("Waiting for health checker to stop");
    balancer.stop_health_checking().await;

    tracing::info!("Fulcrum stopped");
    Ok(())
}
