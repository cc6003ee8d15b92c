//! The `(method, path) → handler` table the compiler registers routes into.
//!
//! Registering the same method and path twice keeps the last registration.
//! Paths that differ only in capture names (`/users/:id`, `/users/:userId`)
//! match the same requests and count as the same path. The table is lowered
//! into a plain [`axum::Router`] once compilation is done.

use {
    crate::{
        Error, Result,
        metadata::HttpMethod,
        path::{self, Capture},
        pipeline::{InboundRequest, Middleware},
    },
    axum::{
        Router,
        extract::Request,
        response::{IntoResponse, Response},
        routing::{MethodRouter, on},
    },
    futures_util::future::BoxFuture,
    std::sync::Arc,
};

/// A route's request handler, after body parsing.
pub type RouteHandler =
    Arc<dyn Fn(InboundRequest) -> BoxFuture<'static, Response> + Send + Sync>;

struct RegisteredRoute {
    method: HttpMethod,
    path: String,
    shape: String,
    middleware: Vec<Middleware>,
    handler: RouteHandler,
}

/// Routes sharing one shape, mounted under the first route's path.
struct PathGroup {
    shape: String,
    path: String,
    method_router: MethodRouter,
}

/// Routes in registration order.
pub struct RouteTable {
    routes: Vec<RegisteredRoute>,
    body_limit: usize,
}

impl RouteTable {
    /// Creates an empty table. JSON bodies larger than `body_limit` bytes are
    /// rejected before the route's pipeline runs.
    pub fn new(body_limit: usize) -> Self {
        Self {
            routes: Vec::new(),
            body_limit,
        }
    }

    /// Registers a handler. Express-style `:name`, `*name` and `*` segments
    /// are accepted.
    ///
    /// A route with the same method and path replaces the earlier one in
    /// place and a warning is logged.
    pub fn register(
        &mut self,
        method: HttpMethod,
        path: &str,
        middleware: Vec<Middleware>,
        handler: RouteHandler,
    ) {
        let path = lowered_path(path);
        let route = RegisteredRoute {
            method,
            shape: path::shape(&path),
            path,
            middleware,
            handler,
        };

        match self
            .routes
            .iter_mut()
            .find(|existing| existing.method == route.method && existing.shape == route.shape)
        {
            Some(existing) => {
                tracing::warn!(
                    method = %route.method,
                    path = %route.path,
                    earlier = %existing.path,
                    "Route registered twice, the later registration shadows the earlier one"
                );
                *existing = route;
            }
            None => self.routes.push(route),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns true when a route is registered for `method` at a path of the
    /// same shape as `path`.
    pub fn contains(&self, method: HttpMethod, path: &str) -> bool {
        let shape = path::shape(&lowered_path(path));
        self.routes
            .iter()
            .any(|route| route.method == method && route.shape == shape)
    }

    /// Lowers the table into an axum router.
    ///
    /// Each route's middleware runs in declaration order, the first one
    /// outermost. Routes of the same shape are mounted under the path of the
    /// first one registered; path captures are renamed back to each route's
    /// own names before its handler runs.
    ///
    /// # Errors
    ///
    /// Fails when a wildcard segment is not the last segment of its path.
    pub fn into_router(self) -> Result<Router> {
        let mut groups: Vec<PathGroup> = Vec::new();

        for route in self.routes {
            let captures = path::captures(&route.path);
            let misplaced_wildcard = captures.iter().enumerate().any(|(i, capture)| {
                matches!(capture, Capture::CatchAll(_))
                    && (i + 1 != captures.len() || !route.path.ends_with('}'))
            });
            if misplaced_wildcard {
                return Err(Error::config(format!(
                    "Route {} {}: a wildcard segment must be the last segment",
                    route.method, route.path
                )));
            }

            let group = match groups.iter().position(|g| g.shape == route.shape) {
                Some(index) => &mut groups[index],
                None => {
                    groups.push(PathGroup {
                        shape: route.shape.clone(),
                        path: route.path.clone(),
                        method_router: MethodRouter::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };

            let renames: Vec<(String, String)> = path::captures(&group.path)
                .iter()
                .zip(&captures)
                .filter(|(mounted, own)| mounted.name() != own.name())
                .map(|(mounted, own)| (mounted.name().to_string(), own.name().to_string()))
                .collect();
            if !renames.is_empty() {
                tracing::debug!(
                    method = %route.method,
                    path = %route.path,
                    mounted = %group.path,
                    "Mounting route under a path with different capture names"
                );
            }

            let method_router = lower(route.method, route.handler, renames, self.body_limit);
            let method_router = route
                .middleware
                .iter()
                .rev()
                .fold(method_router, |router, middleware| middleware.wrap(router));

            group.method_router = std::mem::take(&mut group.method_router).merge(method_router);
        }

        Ok(groups
            .into_iter()
            .fold(Router::new(), |router, group| {
                router.route(&group.path, group.method_router)
            }))
    }
}

fn lower(
    method: HttpMethod,
    handler: RouteHandler,
    renames: Vec<(String, String)>,
    limit: usize,
) -> MethodRouter {
    let renames = Arc::new(renames);
    on(method.method_filter(), move |req: Request| {
        let handler = Arc::clone(&handler);
        let renames = Arc::clone(&renames);
        async move {
            match InboundRequest::from_request(req, limit).await {
                Ok(mut inbound) => {
                    inbound.rename_params(&renames);
                    handler(inbound).await
                }
                Err(e) => e.into_response(),
            }
        }
    })
}

fn lowered_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path::to_axum_captures(path)
    }
}
