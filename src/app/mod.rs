//! The application builder: registration, route compilation, the global
//! middleware stack and server start-up.

mod middleware;
mod server;

use {
    crate::{
        AppEnv, Config, Controller, Error, HttpMiddleware, Result,
        compiler,
        container::{Container, Dependency, Injectable},
        metadata::{HttpMethod, Registry},
        transport::RouteTable,
    },
    axum::Router,
    std::{any::Any, sync::Arc},
};

/// Ties configuration, the container, the metadata registry and the axum
/// router together.
///
/// Controllers and providers are registered first, then [`Application::compile`]
/// turns the declared routes into axum routes. The `setup_*` methods layer the
/// global middleware around them, and [`Application::start`] serves the result.
///
/// ```rust,no_run
/// use axum_controllers::{
///     Application, Config, Controller, ControllerDecl, Dependencies, Injectable, Invocation,
///     Reply, Result,
/// };
/// use serde_json::json;
/// use std::sync::Arc;
///
/// struct PingController;
///
/// impl Injectable for PingController {
///     fn construct(_: &mut Dependencies) -> Result<Self> {
///         Ok(PingController)
///     }
/// }
///
/// impl PingController {
///     async fn ping(self: Arc<Self>, _: Invocation) -> Result<Reply> {
///         Ok(Reply::Json(json!({ "pong": true })))
///     }
/// }
///
/// impl Controller for PingController {
///     fn declare(c: &mut ControllerDecl<'_, Self>) {
///         c.prefix("ping");
///         c.get("", "ping", Self::ping);
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let app = Application::from_env()?;
///     app.config().setup_tracing();
///
///     app.controller::<PingController>()
///         .compile()?
///         .setup_middleware()?
///         .start()
///         .await
/// }
/// ```
pub struct Application {
    pub(crate) config: Config,
    pub(crate) container: Arc<Container>,
    pub(crate) registry: Registry,
    pub(crate) controllers: Vec<Dependency>,
    pub(crate) inner: Router,
    pub(crate) compiled: bool,
    pub(crate) liveness_shadowed: bool,
    pub(crate) panic_channel: Option<tokio::sync::mpsc::Sender<String>>,
}

impl Application {
    /// Creates an application from a validated configuration.
    ///
    /// The configuration itself is registered in the container, so
    /// providers and controllers can depend on `Config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let container = Arc::new(Container::new());
        container.register_instance(config.clone());

        Ok(Self {
            config,
            container,
            registry: Registry::new(),
            controllers: Vec::new(),
            inner: Router::new(),
            compiled: false,
            liveness_shadowed: false,
            panic_channel: None,
        })
    }

    /// Reads the process environment once, applies it to the default
    /// configuration and registers the resulting [`AppEnv`] in the container.
    pub fn from_env() -> Result<Self> {
        let env = AppEnv::from_env();
        let config = Config::default().with_app_env(&env);
        Ok(Self::new(config)?.with_app_env(env))
    }

    /// Registers `env` in the container.
    #[must_use]
    pub fn with_app_env(self, env: AppEnv) -> Self {
        self.container.register_instance(env);
        self
    }

    /// Registers an injectable service.
    #[must_use]
    pub fn provider<T: Injectable>(self) -> Self {
        self.container.register::<T>();
        self
    }

    /// Registers a pre-built singleton.
    #[must_use]
    pub fn instance<T: Any + Send + Sync>(self, value: T) -> Self {
        self.container.register_instance(value);
        self
    }

    /// Registers a controller and records its declarations.
    ///
    /// Registering the same controller twice has no further effect.
    #[must_use]
    pub fn controller<C: Controller>(mut self) -> Self {
        let dependency = C::dependency();
        if self.controllers.contains(&dependency) {
            tracing::warn!(
                controller = dependency.type_name(),
                "Controller registered twice, ignoring"
            );
            return self;
        }
        self.container.register::<C>();
        self.registry.declare::<C>();
        self.controllers.push(dependency);
        self
    }

    /// Resolves every controller and mounts its routes.
    ///
    /// # Errors
    ///
    /// Fails when a controller or one of its dependencies cannot be
    /// constructed, when a handler declares a parameter index twice or out of
    /// range, when a route path cannot be mounted, or when the routes were
    /// already compiled.
    pub fn compile(mut self) -> Result<Self> {
        if self.compiled {
            return Err(Error::config("Application routes were already compiled"));
        }

        let mut table = RouteTable::new(self.config.http.body_limit());
        let count = compiler::compile(
            &self.registry,
            &self.container,
            &self.controllers,
            &self.config.http.global_prefix,
            &mut table,
        )?;
        tracing::info!(
            routes = count,
            controllers = self.controllers.len(),
            "Compiled controller routes"
        );

        self.liveness_shadowed =
            table.contains(HttpMethod::Get, &self.config.http.liveness_route);
        self.inner = self.inner.merge(table.into_router()?);
        self.compiled = true;
        Ok(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns true when the global middleware is enabled by the
    /// configuration's include or exclude list (all are enabled by default).
    pub(crate) fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.config
            .http
            .middleware
            .as_ref()
            .map(|config| config.is_enabled(middleware))
            .unwrap_or(true)
    }

    /// Sends the message of every caught panic to `ch`.
    #[must_use]
    pub fn with_panic_notification_channel(self, ch: tokio::sync::mpsc::Sender<String>) -> Self {
        Self {
            panic_channel: Some(ch),
            ..self
        }
    }
}

#[cfg(test)]
pub(crate) mod tests;
