use {
    super::Invocation,
    crate::{Error, Result, container::Instance},
    futures_util::{FutureExt, future::BoxFuture},
    serde::Serialize,
    serde_json::Value,
    std::{any::Any, fmt, future::Future, sync::Arc},
};

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The handler sent its own response, or wants none beyond the current
    /// status and headers.
    NoResponse,
    /// Serialize this value as the JSON response body, unless a response was
    /// already sent.
    Json(Value),
}

impl Reply {
    /// Serializes `value` into a [`Reply::Json`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

type HandlerFn = dyn Fn(Instance, Invocation) -> BoxFuture<'static, Result<Reply>> + Send + Sync;

/// A controller method with its controller type erased.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wraps a method of controller `C`.
    ///
    /// The instance passed to [`Handler::call`] must be a `C`; anything else
    /// yields an `Internal` error.
    pub fn new<C, F, Fut>(f: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self(Arc::new(move |instance: Instance, invocation| {
            match instance.downcast::<C>() {
                Ok(controller) => f(controller, invocation).boxed(),
                Err(_) => futures_util::future::ready(Err(Error::internal(format!(
                    "Handler expected a {} instance",
                    std::any::type_name::<C>()
                ))))
                .boxed(),
            }
        }))
    }

    pub async fn call(&self, instance: Instance, invocation: Invocation) -> Result<Reply> {
        (self.0)(instance, invocation).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}
