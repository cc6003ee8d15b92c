use {
    super::Application,
    crate::Result,
    axum::{
        Router,
        body::Body,
        extract::Request,
        routing::{MethodRouter, Route},
    },
    std::{convert::Infallible, sync::Arc, time::Duration},
    tokio::{signal, sync::Notify},
    tower::{Layer, Service},
};

impl Application {
    /// Compiles the routes if that has not happened yet, then installs the
    /// global middleware stack.
    ///
    /// Layers are added from innermost to outermost; the last one added sees
    /// a request first. Liveness is mounted after the logging and timeout
    /// layers so probes stay cheap, and panic recovery wraps everything.
    pub fn setup_middleware(self) -> Result<Self> {
        const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        tracing::info!("Starting {PACKAGE_NAME} version {VERSION}...");

        let app = if self.compiled { self } else { self.compile()? };

        Ok(app
            .setup_body_limit() // 1. Body size limit
            .setup_cors() // 2. CORS handling
            .setup_logging() // 3. Request/response logging
            .setup_timeout() // 4. Request timeout (optional)
            .setup_request_id() // 5. Request id, before logging sees the request
            .setup_liveness() // 6. Liveness endpoint
            .setup_catch_panic()) // 7. Outermost: panic recovery
    }

    /// Binds `bind_addr:bind_port` and serves until SIGINT or SIGTERM.
    ///
    /// After a signal no new connections are accepted and in-flight requests
    /// get `shutdown_timeout` to finish before the server returns anyway.
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.http.full_bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Bound to {}", &bind_addr);
        tracing::info!("Waiting for connections");

        let shutdown_timeout = self.config.http.shutdown_timeout;
        let initiated = Arc::new(Notify::new());

        let serve_future = axum::serve(listener, self.inner).with_graceful_shutdown(
            shutdown_signal(shutdown_timeout, Arc::clone(&initiated)),
        );

        tokio::select! {
            result = serve_future => {
                tracing::info!("Graceful shutdown completed");
                result?;
            }
            _ = async {
                initiated.notified().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            }
        }

        Ok(())
    }

    /// Adds a plain axum route next to the controller routes.
    #[must_use]
    pub fn route(mut self, path: &str, route: MethodRouter) -> Self {
        self.inner = self.inner.route(path, route);
        self
    }

    #[must_use]
    pub fn merge(mut self, other: Router) -> Self {
        self.inner = self.inner.merge(other);
        self
    }

    /// Adds a custom tower layer around every route mounted so far.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request<Body>> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request<Body>>>::Response: axum::response::IntoResponse + 'static,
        <L::Service as Service<Request<Body>>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    {
        self.inner = self.inner.layer(layer);
        self
    }

    /// Consumes the application and returns the underlying router, for
    /// tests or a custom server loop.
    pub fn into_inner(self) -> Router {
        self.inner
    }
}

/// Resolves on Ctrl+C or SIGTERM and wakes `initiated` so the caller can
/// start the grace period.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal(timeout: Duration, initiated: Arc<Notify>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
        timeout.as_secs()
    );
    initiated.notify_one();
}
