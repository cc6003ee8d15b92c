use {
    axum::{extract::Request, response::Response, routing::MethodRouter},
    futures_util::{FutureExt, future::BoxFuture},
    std::{fmt, future::Future, sync::Arc},
};

type MiddlewareFn =
    dyn Fn(Request, axum::middleware::Next) -> BoxFuture<'static, Response> + Send + Sync;

/// Transport-level middleware attached to a single route.
///
/// Route middleware sees the raw request before the body is parsed and
/// before any guard runs. It continues the chain by calling `next.run(req)`.
///
/// ```
/// use axum_controllers::Middleware;
///
/// let tag = Middleware::new(|req, next| async move {
///     let mut response = next.run(req).await;
///     response
///         .headers_mut()
///         .insert("x-route", http::HeaderValue::from_static("tagged"));
///     response
/// });
/// ```
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, axum::middleware::Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |req, next| f(req, next).boxed()))
    }

    /// Wraps `router` so that this middleware runs before it.
    pub(crate) fn wrap(&self, router: MethodRouter) -> MethodRouter {
        let f = Arc::clone(&self.0);
        router.layer(axum::middleware::from_fn(
            move |req: Request, next: axum::middleware::Next| f(req, next),
        ))
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}
