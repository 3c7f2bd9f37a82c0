use std::net::SocketAddr;

use axum::http::{header, Method};
use tower_http::cors::CorsLayer;

use drill_engine_service::config::Config;
use drill_engine_service::logging;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    let _file_log_guard = logging::init_tracing(&config.log_level);

    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() => {
            tracing::info!(origin = %origin, "CORS configured with specific origin");
            CorsLayer::new()
                .allow_origin(
                    origin
                        .parse::<header::HeaderValue>()
                        .expect("invalid CORS_ORIGIN"),
                )
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::info!("CORS configured as permissive");
            CorsLayer::permissive()
        }
    };

    let app = drill_engine_service::create_app().layer(cors);

    let addr = config.bind_addr();
    tracing::info!(%addr, "drill engine listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
