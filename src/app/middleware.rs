//! Global middleware, one `setup_*` method per layer.
//!
//! Each layer wraps every route mounted so far, so routes must be compiled
//! before these methods run. A layer excluded by the configuration is skipped.

use {
    super::Application,
    crate::{HttpMiddleware, utils::RequestIdGenerator},
    axum::{body::Body, extract::DefaultBodyLimit, routing::get},
    http::{HeaderName, Request, Response, StatusCode},
    tower_http::{
        catch_panic::CatchPanicLayer,
        cors::CorsLayer,
        limit::RequestBodyLimitLayer,
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        timeout::TimeoutLayer,
        trace::TraceLayer,
    },
};

impl Application {
    /// Rejects request bodies above `max_payload_size_bytes` with a 413.
    #[must_use]
    pub fn setup_body_limit(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::BodyLimit) {
            return self;
        }

        self.inner = self
            .inner
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.http.body_limit()));
        self
    }

    /// Adds CORS headers and answers preflight requests.
    ///
    /// Without a `[http.cors]` section every origin, method and header is
    /// allowed.
    #[must_use]
    pub fn setup_cors(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Cors) {
            return self;
        }

        let cors = match &self.config.http.cors {
            Some(cors_config) => cors_config.layer(),
            None => {
                tracing::debug!("No CORS configuration found, allowing every origin");
                CorsLayer::permissive()
            }
        };
        self.inner = self.inner.layer(cors);
        self
    }

    /// Logs every request with its method, URI and request id.
    #[must_use]
    pub fn setup_logging(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Logging) {
            return self;
        }

        self.inner = self.inner.layer(TraceLayer::new_for_http().make_span_with(
            |request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ));
        self
    }

    /// Answers with 408 when a request exceeds `request_timeout`. Does nothing
    /// when no timeout is configured.
    #[must_use]
    pub fn setup_timeout(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Timeout) {
            return self;
        }

        if let Some(timeout) = self.config.http.request_timeout {
            self.inner = self.inner.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        self
    }

    /// Keeps or generates an `x-request-id` header and copies it to the
    /// response.
    #[must_use]
    pub fn setup_request_id(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::RequestId) {
            return self;
        }

        let x_request_id = HeaderName::from_static("x-request-id");
        self.inner = self
            .inner
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, RequestIdGenerator));
        self
    }

    /// Mounts the liveness probe at `liveness_route`, unless a controller
    /// route already answers GET there.
    #[must_use]
    pub fn setup_liveness(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Liveness) {
            return self;
        }

        let route = self.config.http.liveness_route.clone();
        if self.liveness_shadowed {
            tracing::warn!(
                route = %route,
                "A controller already serves GET at the liveness route, skipping the probe"
            );
            return self;
        }
        self.inner = self.inner.route(&route, get(|| async { "OK\n" }));
        self
    }

    /// Turns panics into 500 responses and reports them to the panic
    /// notification channel, if any.
    #[must_use]
    pub fn setup_catch_panic(mut self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::CatchPanic) {
            return self;
        }

        let panic_channel = self.panic_channel.clone();
        self.inner = self.inner.layer(CatchPanicLayer::custom(
            move |err: Box<dyn std::any::Any + Send + 'static>| {
                let msg = if let Some(s) = err.downcast_ref::<String>() {
                    format!("Service panicked: {s}")
                } else if let Some(s) = err.downcast_ref::<&str>() {
                    format!("Service panicked: {s}")
                } else {
                    "Service panicked with a non-string payload".to_string()
                };

                tracing::error!("{msg}");
                if let Some(ch) = &panic_channel {
                    ch.try_send(msg).ok();
                }

                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body("Internal Server Error".to_string())
                    .unwrap_or_else(|_| Response::new("Internal Server Error".to_string()))
            },
        ));
        self
    }
}
