use axum::{response::Json, routing::get, Router};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use mirrorgate::core::config::{load_mirror_config, Settings};
use mirrorgate::proxy::handler::proxy_handler;
use mirrorgate::AppState;

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["MIRRORGATE_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting mirrorgate");

    let settings = Settings::from_env();
    if settings.secret_key.len() < 32 {
        warn!("SECRET_KEY is shorter than 32 bytes; session signatures are weak");
    }

    // Create the shared upstream HTTP client. Redirects are intercepted by
    // the orchestrator, never followed here.
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(settings.request_timeout.max(30));
    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(settings.connect_timeout))
        .build()?;

    // Site definitions + global defaults from mirrorgate.json.
    let mirror_config = load_mirror_config();
    if mirror_config.sites.is_empty() {
        warn!("no sites configured; every request will answer 404 (create mirrorgate.json)");
    }
    for site in &mirror_config.sites {
        info!(
            "site {}: {} -> {} (enabled: {})",
            site.id, site.mirror_root, site.source_root, site.enabled
        );
    }

    let state = Arc::new(AppState::new(http_client, settings, mirror_config));

    // Periodic rate-limiter maintenance so idle IPs do not accumulate.
    {
        let limiter = state.rate_limiter.clone();
        let window = state.settings.rate_limit_window.max(1);
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(std::time::Duration::from_secs(window));
            loop {
                tick.tick().await;
                limiter.cleanup();
            }
        });
    }

    // Build router: health first, then the catch-all proxy route.
    let app = Router::new()
        .route("/health", get(health_check))
        .fallback(proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(8000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/MIRRORGATE_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("mirrorgate listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mirrorgate",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
