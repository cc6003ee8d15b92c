use {
    super::{
        Filter, Guard, Handler, InboundRequest, Invocation, Pipe, PipeMetadata, Reply,
        RequestContext,
    },
    crate::{Error, Result, container::Instance, metadata::ParamDescriptor},
    axum::response::Response,
    http::StatusCode,
    serde_json::{Value, json},
    std::sync::Arc,
    tracing::Instrument,
};

/// How a request left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// A guard returned `false`.
    Rejected,
    /// The handler returned normally.
    Completed,
    /// A filter sent a response for an error.
    Filtered,
    /// No filter sent a response; the error goes to the generic error path.
    Unhandled,
}

/// The per-request handler of one route, built once at compile time.
#[derive(Debug)]
pub(crate) struct CompiledRoute {
    label: String,
    controller: Instance,
    handler: Handler,
    params: Vec<ParamDescriptor>,
    arity: usize,
    guards: Vec<Guard>,
    pipes: Vec<Pipe>,
    filters: Vec<Filter>,
}

impl CompiledRoute {
    /// `params` must already be sorted by index with no duplicate indices.
    pub(crate) fn new(
        label: String,
        controller: Instance,
        handler: Handler,
        params: Vec<ParamDescriptor>,
        guards: Vec<Guard>,
        pipes: Vec<Pipe>,
        filters: Vec<Filter>,
    ) -> Self {
        let arity = params.last().map(|p| p.index.saturating_add(1)).unwrap_or(0);
        Self {
            label,
            controller,
            handler,
            params,
            arity,
            guards,
            pipes,
            filters,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Runs the pipeline for one request and renders the response.
    pub(crate) async fn handle(self: Arc<Self>, request: InboundRequest) -> Response {
        let span = tracing::debug_span!("route", route = %self.label);
        let ctx = RequestContext::new(request);
        let outcome = self.execute(ctx.clone()).instrument(span).await;
        tracing::trace!(route = %self.label, ?outcome, "Pipeline finished");
        ctx.response().take_response()
    }

    pub(crate) async fn execute(&self, ctx: RequestContext) -> Outcome {
        for (position, guard) in self.guards.iter().enumerate() {
            if !guard.can_activate(ctx.clone()).await {
                tracing::debug!(guard = position, "Request rejected by guard");
                // A guard that already answered keeps its own response.
                if !ctx.response().is_sent() {
                    ctx.response()
                        .send_json_with_status(StatusCode::FORBIDDEN, json!({"status": "forbidden"}));
                }
                return Outcome::Rejected;
            }
        }

        let result = match self.resolve_args(&ctx).await {
            Ok(args) => {
                let invocation = Invocation::new(args, ctx.clone());
                self.handler
                    .call(Arc::clone(&self.controller), invocation)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(Reply::Json(value)) => {
                if ctx.response().is_sent() {
                    tracing::debug!("Response already sent, discarding handler return value");
                } else {
                    ctx.response().send_json(value);
                }
                Outcome::Completed
            }
            Ok(Reply::NoResponse) => Outcome::Completed,
            Err(error) => self.dispatch(error, &ctx).await,
        }
    }

    /// Extracts every declared parameter in ascending index order and runs
    /// it through all pipes.
    async fn resolve_args(&self, ctx: &RequestContext) -> Result<Vec<Value>> {
        let mut args = vec![Value::Null; self.arity];
        for param in &self.params {
            let mut value = ctx.request().extract(param.source, param.key.as_deref());
            let meta = PipeMetadata {
                source: param.source,
                key: param.key.clone(),
            };
            for pipe in &self.pipes {
                value = pipe.transform(value, meta.clone()).await?;
            }
            args[param.index] = value;
        }
        Ok(args)
    }

    async fn dispatch(&self, error: Error, ctx: &RequestContext) -> Outcome {
        let error = Arc::new(error);
        for (position, filter) in self.filters.iter().enumerate() {
            filter.catch(Arc::clone(&error), ctx.clone()).await;
            if ctx.response().is_sent() {
                tracing::debug!(filter = position, error = %error, "Error handled by filter");
                return Outcome::Filtered;
            }
        }

        if ctx.response().is_sent() {
            // The handler sent a response before failing.
            tracing::warn!(error = %error, "Handler failed after sending a response");
            return Outcome::Filtered;
        }
        ctx.response().forward(error);
        Outcome::Unhandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParamSource;
    use http::Method;
    use parking_lot::Mutex;

    struct Echo;

    fn compiled(
        handler: Handler,
        params: Vec<ParamDescriptor>,
        guards: Vec<Guard>,
        pipes: Vec<Pipe>,
        filters: Vec<Filter>,
    ) -> CompiledRoute {
        CompiledRoute::new(
            "POST /test".into(),
            Arc::new(Echo),
            handler,
            params,
            guards,
            pipes,
            filters,
        )
    }

    fn echo_args() -> Handler {
        Handler::new(|_: Arc<Echo>, inv: Invocation| async move {
            Ok(Reply::Json(Value::Array(inv.args().to_vec())))
        })
    }

    fn context(body: Value) -> RequestContext {
        RequestContext::new(
            InboundRequest::new(Method::POST, "/test?page=2".parse().unwrap()).with_body(body),
        )
    }

    fn sent_body(ctx: &RequestContext) -> Value {
        ctx.response().sent_body().expect("response was not sent")
    }

    #[tokio::test]
    async fn test_guards_short_circuit_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let guard = |id: u32, allow: bool| {
            let calls = Arc::clone(&calls);
            Guard::sync(move |_| {
                calls.lock().push(id);
                allow
            })
        };
        let handler_ran = Arc::new(Mutex::new(false));
        let ran = Arc::clone(&handler_ran);
        let handler = Handler::new(move |_: Arc<Echo>, _| {
            *ran.lock() = true;
            async { Ok(Reply::NoResponse) }
        });

        let route = compiled(
            handler,
            vec![],
            vec![guard(1, true), guard(2, false), guard(3, true)],
            vec![],
            vec![],
        );
        let ctx = context(json!({}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Rejected);
        assert_eq!(*calls.lock(), vec![1, 2]);
        assert!(!*handler_ran.lock());
        assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
        assert_eq!(sent_body(&ctx), json!({"status": "forbidden"}));
    }

    #[tokio::test]
    async fn test_guard_response_is_kept() {
        let guard = Guard::sync(|ctx| {
            ctx.response()
                .send_json_with_status(StatusCode::UNAUTHORIZED, json!({"login": "required"}));
            false
        });
        let route = compiled(echo_args(), vec![], vec![guard], vec![], vec![]);
        let ctx = context(json!({}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Rejected);
        assert_eq!(ctx.response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sent_body(&ctx), json!({"login": "required"}));
    }

    #[tokio::test]
    async fn test_params_follow_index_order_with_gaps() {
        let params = vec![
            ParamDescriptor::new(0, ParamSource::Body, Some("name")),
            ParamDescriptor::new(2, ParamSource::Query, Some("page")),
        ];
        let route = compiled(echo_args(), params, vec![], vec![], vec![]);
        let ctx = context(json!({"name": "ada"}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Completed);
        assert_eq!(sent_body(&ctx), json!(["ada", null, "2"]));
    }

    #[tokio::test]
    async fn test_every_pipe_sees_every_param() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            Pipe::sync(move |value, meta| {
                seen.lock().push((meta.source, meta.key.clone()));
                Ok(value)
            })
        };
        let suffix = Pipe::sync(|value, _| {
            Ok(match value {
                Value::String(s) => Value::String(format!("{s}!")),
                other => other,
            })
        });

        let params = vec![
            ParamDescriptor::new(0, ParamSource::Body, Some("a")),
            ParamDescriptor::new(1, ParamSource::Query, None),
        ];
        let route = compiled(echo_args(), params, vec![], vec![recorder, suffix], vec![]);
        let ctx = context(json!({"a": "x"}));

        route.execute(ctx.clone()).await;
        assert_eq!(sent_body(&ctx), json!(["x!", {"page": "2"}]));
        assert_eq!(
            *seen.lock(),
            vec![
                (ParamSource::Body, Some("a".to_string())),
                (ParamSource::Query, None)
            ]
        );
    }

    #[tokio::test]
    async fn test_pipe_error_goes_to_filters() {
        let reject = Pipe::sync(|_, _| Err(Error::invalid_input("nope")));
        let filter = Filter::sync(|error, ctx| {
            ctx.response()
                .send_json_with_status(error.status_code(), json!({"caught": error.to_string()}));
        });
        let params = vec![ParamDescriptor::new(0, ParamSource::Body, None)];
        let route = compiled(echo_args(), params, vec![], vec![reject], vec![filter]);
        let ctx = context(json!({}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Filtered);
        assert_eq!(ctx.response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filters_stop_after_first_send() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let filter = |id: u32, send: bool| {
            let calls = Arc::clone(&calls);
            Filter::sync(move |_, ctx| {
                calls.lock().push(id);
                if send {
                    ctx.response().send_json(json!({"filter": id}));
                }
            })
        };
        let failing = Handler::new(|_: Arc<Echo>, _| async { Err(Error::internal("boom")) });
        let route = compiled(
            failing,
            vec![],
            vec![],
            vec![],
            vec![filter(1, false), filter(2, true), filter(3, true)],
        );
        let ctx = context(json!({}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Filtered);
        assert_eq!(*calls.lock(), vec![1, 2]);
        assert_eq!(sent_body(&ctx), json!({"filter": 2}));
    }

    #[tokio::test]
    async fn test_exhausted_filters_forward_to_generic_path() {
        let failing = Handler::new(|_: Arc<Echo>, _| async { Err(Error::not_found("gone")) });
        let route = compiled(failing, vec![], vec![], vec![], vec![Filter::sync(|_, _| {})]);
        let ctx = context(json!({}));

        assert_eq!(route.execute(ctx.clone()).await, Outcome::Unhandled);
        assert!(!ctx.response().is_sent());
        assert_eq!(
            ctx.response().take_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_returned_value_ignored_after_send() {
        let handler = Handler::new(|_: Arc<Echo>, inv: Invocation| async move {
            inv.response().send_json(json!({"sent": "first"}));
            Ok(Reply::Json(json!({"returned": true})))
        });
        let route = compiled(handler, vec![], vec![], vec![], vec![]);
        let ctx = context(json!({}));

        route.execute(ctx.clone()).await;
        assert_eq!(sent_body(&ctx), json!({"sent": "first"}));
    }

    #[tokio::test]
    async fn test_handler_status_is_kept_for_returned_value() {
        let handler = Handler::new(|_: Arc<Echo>, inv: Invocation| async move {
            inv.response().set_status(StatusCode::CREATED);
            Ok(Reply::Json(json!({"id": 1})))
        });
        let route = compiled(handler, vec![], vec![], vec![], vec![]);
        let ctx = context(json!({}));

        route.execute(ctx.clone()).await;
        assert_eq!(ctx.response().status(), StatusCode::CREATED);
        assert_eq!(sent_body(&ctx), json!({"id": 1}));
    }
}
