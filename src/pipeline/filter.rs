use {
    super::RequestContext,
    crate::Error,
    futures_util::{FutureExt, future::BoxFuture},
    std::{fmt, future::Future, sync::Arc},
};

type FilterFn = dyn Fn(Arc<Error>, RequestContext) -> BoxFuture<'static, ()> + Send + Sync;

/// Handles errors raised by pipes or handlers.
///
/// Filters run in declaration order until one of them sends a response. A
/// filter that does not send lets the next one try.
#[derive(Clone)]
pub struct Filter(Arc<FilterFn>);

impl Filter {
    /// Creates a filter from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Error>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move |error, ctx| f(error, ctx).boxed()))
    }

    /// Creates a filter from a synchronous closure.
    ///
    /// ```
    /// use axum_controllers::{ErrorKind, Filter};
    /// use serde_json::json;
    ///
    /// let bad_input = Filter::sync(|error, ctx| {
    ///     if error.kind() == ErrorKind::InvalidInput {
    ///         ctx.response().send_json(json!({"error": error.to_string()}));
    ///     }
    /// });
    /// ```
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Error, &RequestContext) + Send + Sync + 'static,
    {
        Self(Arc::new(move |error, ctx| {
            f(&error, &ctx);
            futures_util::future::ready(()).boxed()
        }))
    }

    pub async fn catch(&self, error: Arc<Error>, ctx: RequestContext) {
        (self.0)(error, ctx).await
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter")
    }
}
