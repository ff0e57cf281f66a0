//! HTTPS front of the webhook.
//!
//! Serves `POST /mutate` for the API server and `GET /healthz` for the kubelet.
use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use proxy_webhook_core::{admission::AdmissionReview, review};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::{Config, ProxyRewriter};

/// How long in-flight reviews get to finish once a shutdown signal arrives
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
// Redundant with the error messages and machine names
#[allow(missing_docs)]
/// Possible errors when running the webhook server
pub enum Error {
    #[error("failed to load TLS certificate {cert:?} and key {key:?}: {source}")]
    Tls {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Routes of the webhook, without TLS
pub fn router(rewriter: ProxyRewriter) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(rewriter))
}

async fn mutate(
    State(rewriter): State<Arc<ProxyRewriter>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<AdmissionReview>) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    match review(content_type, &body, |req| rewriter.apply(req)) {
        Ok(review) => (StatusCode::OK, Json(review)),
        Err(err) => {
            tracing::error!(error = %err, "rejecting admission review");
            (err.status_code(), Json(err.into_review()))
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve the webhook over TLS until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<(), Error> {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|source| Error::Tls {
            cert: config.cert_path.clone(),
            key: config.key_path.clone(),
            source,
        })?;

    let app = router(ProxyRewriter::from(&config));

    let handle = axum_server::Handle::new();
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!(grace_period = ?SHUTDOWN_GRACE_PERIOD, "shutting down");
        signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
    });

    tracing::info!(
        addr = %config.listen_addr,
        configmap_prefix = %config.configmap_prefix,
        configmap_key = %config.configmap_key,
        proxy_server = %config.proxy_server,
        force_validate = config.force_validate,
        "webhook server listening with TLS"
    );
    axum_server::bind_rustls(config.listen_addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(Error::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
