use {
    crate::{Result, metadata::ParamSource},
    futures_util::{FutureExt, future::BoxFuture},
    serde_json::Value,
    std::{fmt, future::Future, sync::Arc},
};

/// Where the value handed to a pipe came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeMetadata {
    pub source: ParamSource,
    pub key: Option<String>,
}

type PipeFn = dyn Fn(Value, PipeMetadata) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// Transforms or validates a single parameter value.
///
/// Every pipe of a handler runs, in declaration order, on every parameter of
/// that handler. An error aborts the request and is handed to the filters.
#[derive(Clone)]
pub struct Pipe(Arc<PipeFn>);

impl Pipe {
    /// Creates a pipe from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, PipeMetadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |value, meta| f(value, meta).boxed()))
    }

    /// Creates a pipe from a synchronous transformation.
    ///
    /// ```
    /// use axum_controllers::Pipe;
    /// use serde_json::Value;
    ///
    /// let trim = Pipe::sync(|value, _meta| {
    ///     Ok(match value {
    ///         Value::String(s) => Value::String(s.trim().to_string()),
    ///         other => other,
    ///     })
    /// });
    /// ```
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value, &PipeMetadata) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(move |value, meta| {
            let result = f(value, &meta);
            futures_util::future::ready(result).boxed()
        }))
    }

    pub async fn transform(&self, value: Value, meta: PipeMetadata) -> Result<Value> {
        (self.0)(value, meta).await
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pipe")
    }
}
