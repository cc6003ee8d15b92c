use {
    super::RequestContext,
    futures_util::{FutureExt, future::BoxFuture},
    std::{fmt, future::Future, sync::Arc},
};

type GuardFn = dyn Fn(RequestContext) -> BoxFuture<'static, bool> + Send + Sync;

/// Decides whether a request may reach its handler.
///
/// Guards run in declaration order before any parameter is extracted. The
/// first guard that returns `false` ends the request with a 403, unless the
/// guard already sent a response of its own.
#[derive(Clone)]
pub struct Guard(Arc<GuardFn>);

impl Guard {
    /// Creates a guard from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Creates a guard from a plain predicate.
    ///
    /// ```
    /// use axum_controllers::Guard;
    ///
    /// let has_token = Guard::sync(|ctx| ctx.request().header("authorization").is_some());
    /// ```
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx| {
            let allowed = f(&ctx);
            futures_util::future::ready(allowed).boxed()
        }))
    }

    pub async fn can_activate(&self, ctx: RequestContext) -> bool {
        (self.0)(ctx).await
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}
