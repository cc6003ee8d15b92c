//! The controller metadata registry.
//!
//! Routes, parameter sources and per-handler pipeline steps are recorded in a
//! side-table keyed by controller type and handler name. Nothing is stored on
//! the controller types themselves. Registration is append-only: declaring a
//! route or a guard twice records it twice.
//!
//! Controllers normally fill the registry through [`Controller::declare`]:
//!
//! ```
//! use axum_controllers::{
//!     Controller, ControllerDecl, Dependencies, Injectable, Invocation, Reply, Result,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct GreetController;
//!
//! impl Injectable for GreetController {
//!     fn construct(_: &mut Dependencies) -> Result<Self> {
//!         Ok(GreetController)
//!     }
//! }
//!
//! impl GreetController {
//!     async fn greet(self: Arc<Self>, call: Invocation) -> Result<Reply> {
//!         let name: String = call.arg(0)?;
//!         Ok(Reply::Json(json!({ "hello": name })))
//!     }
//! }
//!
//! impl Controller for GreetController {
//!     fn declare(c: &mut ControllerDecl<'_, Self>) {
//!         c.prefix("greet");
//!         c.post("", "greet", Self::greet).body_field(0, "name");
//!     }
//! }
//! ```

use {
    crate::{
        container::{Dependency, Injectable},
        pipeline::{Filter, Guard, Handler, Invocation, Middleware, Pipe, Reply},
        Result,
    },
    axum::routing::MethodFilter,
    serde::{Deserialize, Serialize},
    std::{
        any::{Any, TypeId},
        collections::HashMap,
        fmt,
        future::Future,
        marker::PhantomData,
        sync::Arc,
    },
};

/// HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub(crate) fn method_filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a handler parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Body,
    Query,
    Path,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamSource::Body => "body",
            ParamSource::Query => "query",
            ParamSource::Path => "path",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Positional slot in the handler's argument list.
    pub index: usize,
    pub source: ParamSource,
    /// Sub-field of the source. `None` selects the whole source.
    pub key: Option<String>,
}

impl ParamDescriptor {
    pub fn new(index: usize, source: ParamSource, key: Option<&str>) -> Self {
        Self {
            index,
            source,
            key: key.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub handler_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerDescriptor {
    pub prefix: String,
    pub routes: Vec<RouteDescriptor>,
}

#[derive(Debug, Default)]
struct HandlerMetadata {
    handler: Option<Handler>,
    params: Vec<ParamDescriptor>,
    guards: Vec<Guard>,
    pipes: Vec<Pipe>,
    middleware: Vec<Middleware>,
    filters: Vec<Filter>,
}

#[derive(Debug, Default)]
struct ControllerEntry {
    descriptor: ControllerDescriptor,
    handlers: HashMap<String, HandlerMetadata>,
}

/// Side-table of controller and handler metadata.
#[derive(Debug, Default)]
pub struct Registry {
    controllers: HashMap<TypeId, ControllerEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `C`'s declarations against this registry.
    pub fn declare<C: Controller>(&mut self) -> &mut Self {
        let mut decl = ControllerDecl::<C>::new(self);
        C::declare(&mut decl);
        self
    }

    fn entry<C: Any>(&mut self) -> &mut ControllerEntry {
        self.controllers.entry(TypeId::of::<C>()).or_default()
    }

    fn handler_entry<C: Any>(&mut self, handler_name: &str) -> &mut HandlerMetadata {
        self.entry::<C>()
            .handlers
            .entry(handler_name.to_string())
            .or_default()
    }

    fn handler_meta(&self, controller: TypeId, handler_name: &str) -> Option<&HandlerMetadata> {
        self.controllers
            .get(&controller)
            .and_then(|entry| entry.handlers.get(handler_name))
    }

    /// Sets the controller prefix. The last call wins.
    pub fn set_prefix<C: Any>(&mut self, prefix: impl Into<String>) {
        self.entry::<C>().descriptor.prefix = prefix.into();
    }

    /// Appends a route and binds `handler` to `handler_name`.
    ///
    /// Binding a second closure to the same handler name replaces the first
    /// one for every route that uses that name.
    pub fn add_route<C: Any>(
        &mut self,
        method: HttpMethod,
        path: impl Into<String>,
        handler_name: impl Into<String>,
        handler: Handler,
    ) {
        let handler_name = handler_name.into();
        let entry = self.entry::<C>();
        entry.descriptor.routes.push(RouteDescriptor {
            method,
            path: path.into(),
            handler_name: handler_name.clone(),
        });
        entry.handlers.entry(handler_name).or_default().handler = Some(handler);
    }

    pub fn add_param<C: Any>(&mut self, handler_name: &str, param: ParamDescriptor) {
        self.handler_entry::<C>(handler_name).params.push(param);
    }

    pub fn add_guards<C: Any>(&mut self, handler_name: &str, guards: impl IntoIterator<Item = Guard>) {
        self.handler_entry::<C>(handler_name).guards.extend(guards);
    }

    pub fn add_pipes<C: Any>(&mut self, handler_name: &str, pipes: impl IntoIterator<Item = Pipe>) {
        self.handler_entry::<C>(handler_name).pipes.extend(pipes);
    }

    pub fn add_middleware<C: Any>(
        &mut self,
        handler_name: &str,
        middleware: impl IntoIterator<Item = Middleware>,
    ) {
        self.handler_entry::<C>(handler_name)
            .middleware
            .extend(middleware);
    }

    pub fn add_filters<C: Any>(
        &mut self,
        handler_name: &str,
        filters: impl IntoIterator<Item = Filter>,
    ) {
        self.handler_entry::<C>(handler_name).filters.extend(filters);
    }

    pub fn controller(&self, controller: TypeId) -> Option<&ControllerDescriptor> {
        self.controllers.get(&controller).map(|entry| &entry.descriptor)
    }

    pub fn prefix(&self, controller: TypeId) -> &str {
        self.controller(controller)
            .map(|descriptor| descriptor.prefix.as_str())
            .unwrap_or("")
    }

    pub fn routes(&self, controller: TypeId) -> &[RouteDescriptor] {
        self.controller(controller)
            .map(|descriptor| descriptor.routes.as_slice())
            .unwrap_or(&[])
    }

    pub fn handler(&self, controller: TypeId, handler_name: &str) -> Option<&Handler> {
        self.handler_meta(controller, handler_name)
            .and_then(|meta| meta.handler.as_ref())
    }

    pub fn params(&self, controller: TypeId, handler_name: &str) -> &[ParamDescriptor] {
        self.handler_meta(controller, handler_name)
            .map(|meta| meta.params.as_slice())
            .unwrap_or(&[])
    }

    pub fn guards(&self, controller: TypeId, handler_name: &str) -> &[Guard] {
        self.handler_meta(controller, handler_name)
            .map(|meta| meta.guards.as_slice())
            .unwrap_or(&[])
    }

    pub fn pipes(&self, controller: TypeId, handler_name: &str) -> &[Pipe] {
        self.handler_meta(controller, handler_name)
            .map(|meta| meta.pipes.as_slice())
            .unwrap_or(&[])
    }

    pub fn middleware(&self, controller: TypeId, handler_name: &str) -> &[Middleware] {
        self.handler_meta(controller, handler_name)
            .map(|meta| meta.middleware.as_slice())
            .unwrap_or(&[])
    }

    pub fn filters(&self, controller: TypeId, handler_name: &str) -> &[Filter] {
        self.handler_meta(controller, handler_name)
            .map(|meta| meta.filters.as_slice())
            .unwrap_or(&[])
    }
}

/// A type that exposes HTTP routes.
///
/// Controllers are resolved through the container like any other injectable
/// type, so they can declare their services as dependencies.
pub trait Controller: Injectable {
    fn declare(controller: &mut ControllerDecl<'_, Self>);

    /// Token used to resolve this controller at compile time.
    fn dependency() -> Dependency {
        Dependency::of::<Self>()
    }
}

/// Declaration surface for one controller type.
pub struct ControllerDecl<'r, C> {
    registry: &'r mut Registry,
    _controller: PhantomData<fn() -> C>,
}

impl<'r, C: Any + Send + Sync> ControllerDecl<'r, C> {
    fn new(registry: &'r mut Registry) -> Self {
        Self {
            registry,
            _controller: PhantomData,
        }
    }

    pub fn prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.registry.set_prefix::<C>(prefix);
        self
    }

    /// Declares a route bound to a controller method.
    pub fn route<F, Fut>(
        &mut self,
        method: HttpMethod,
        path: &str,
        handler_name: &str,
        handler: F,
    ) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.registry
            .add_route::<C>(method, path, handler_name, Handler::new(handler));
        self.handler(handler_name)
    }

    pub fn get<F, Fut>(&mut self, path: &str, handler_name: &str, handler: F) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.route(HttpMethod::Get, path, handler_name, handler)
    }

    pub fn post<F, Fut>(&mut self, path: &str, handler_name: &str, handler: F) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.route(HttpMethod::Post, path, handler_name, handler)
    }

    pub fn put<F, Fut>(&mut self, path: &str, handler_name: &str, handler: F) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.route(HttpMethod::Put, path, handler_name, handler)
    }

    pub fn patch<F, Fut>(&mut self, path: &str, handler_name: &str, handler: F) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.route(HttpMethod::Patch, path, handler_name, handler)
    }

    pub fn delete<F, Fut>(&mut self, path: &str, handler_name: &str, handler: F) -> HandlerDecl<'_, C>
    where
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.route(HttpMethod::Delete, path, handler_name, handler)
    }

    /// Attaches further metadata to a handler by name, whether or not a route
    /// has been declared for it yet.
    pub fn handler(&mut self, handler_name: &str) -> HandlerDecl<'_, C> {
        HandlerDecl {
            registry: &mut *self.registry,
            handler_name: handler_name.to_string(),
            _controller: PhantomData,
        }
    }
}

/// Declaration surface for one handler of a controller.
pub struct HandlerDecl<'d, C> {
    registry: &'d mut Registry,
    handler_name: String,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Any + Send + Sync> HandlerDecl<'_, C> {
    fn param_at(&mut self, index: usize, source: ParamSource, key: Option<&str>) -> &mut Self {
        self.registry
            .add_param::<C>(&self.handler_name, ParamDescriptor::new(index, source, key));
        self
    }

    /// Binds argument `index` to the whole JSON body.
    pub fn body(&mut self, index: usize) -> &mut Self {
        self.param_at(index, ParamSource::Body, None)
    }

    /// Binds argument `index` to one field of the JSON body.
    pub fn body_field(&mut self, index: usize, key: &str) -> &mut Self {
        self.param_at(index, ParamSource::Body, Some(key))
    }

    /// Binds argument `index` to the whole query map.
    pub fn query(&mut self, index: usize) -> &mut Self {
        self.param_at(index, ParamSource::Query, None)
    }

    pub fn query_field(&mut self, index: usize, key: &str) -> &mut Self {
        self.param_at(index, ParamSource::Query, Some(key))
    }

    /// Binds argument `index` to the whole path capture map.
    pub fn param(&mut self, index: usize) -> &mut Self {
        self.param_at(index, ParamSource::Path, None)
    }

    pub fn param_field(&mut self, index: usize, key: &str) -> &mut Self {
        self.param_at(index, ParamSource::Path, Some(key))
    }

    pub fn guard(&mut self, guard: Guard) -> &mut Self {
        self.registry.add_guards::<C>(&self.handler_name, [guard]);
        self
    }

    pub fn pipe(&mut self, pipe: Pipe) -> &mut Self {
        self.registry.add_pipes::<C>(&self.handler_name, [pipe]);
        self
    }

    pub fn middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.registry
            .add_middleware::<C>(&self.handler_name, [middleware]);
        self
    }

    pub fn filter(&mut self, filter: Filter) -> &mut Self {
        self.registry.add_filters::<C>(&self.handler_name, [filter]);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Dependencies;
    use serde_json::json;

    struct Users;
    struct Empty;

    impl Injectable for Users {
        fn construct(_: &mut Dependencies) -> Result<Self> {
            Ok(Users)
        }
    }

    impl Users {
        async fn list(self: Arc<Self>, _: Invocation) -> Result<Reply> {
            Ok(Reply::Json(json!([])))
        }

        async fn create(self: Arc<Self>, call: Invocation) -> Result<Reply> {
            Ok(Reply::Json(call.raw_arg(0).clone()))
        }
    }

    impl Controller for Users {
        fn declare(c: &mut ControllerDecl<'_, Self>) {
            c.prefix("users");
            c.get("", "list", Self::list);
            c.post("", "create", Self::create)
                .body(0)
                .query_field(1, "dry_run")
                .guard(Guard::sync(|_| true))
                .pipe(Pipe::sync(|v, _| Ok(v)));
            c.handler("create").filter(Filter::sync(|_, _| {}));
        }
    }

    #[test]
    fn test_unregistered_lookups_are_empty() {
        let registry = Registry::new();
        let id = TypeId::of::<Empty>();

        assert!(registry.controller(id).is_none());
        assert_eq!(registry.prefix(id), "");
        assert!(registry.routes(id).is_empty());
        assert!(registry.params(id, "x").is_empty());
        assert!(registry.guards(id, "x").is_empty());
        assert!(registry.pipes(id, "x").is_empty());
        assert!(registry.middleware(id, "x").is_empty());
        assert!(registry.filters(id, "x").is_empty());
        assert!(registry.handler(id, "x").is_none());
    }

    #[test]
    fn test_declare_records_routes_in_order() {
        let mut registry = Registry::new();
        registry.declare::<Users>();
        let id = TypeId::of::<Users>();

        assert_eq!(registry.prefix(id), "users");
        let routes = registry.routes(id);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler_name, "list");
        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].handler_name, "create");
        assert!(registry.handler(id, "create").is_some());
    }

    #[test]
    fn test_declare_records_handler_steps() {
        let mut registry = Registry::new();
        registry.declare::<Users>();
        let id = TypeId::of::<Users>();

        assert_eq!(
            registry.params(id, "create"),
            &[
                ParamDescriptor::new(0, ParamSource::Body, None),
                ParamDescriptor::new(1, ParamSource::Query, Some("dry_run")),
            ]
        );
        assert_eq!(registry.guards(id, "create").len(), 1);
        assert_eq!(registry.pipes(id, "create").len(), 1);
        assert_eq!(registry.filters(id, "create").len(), 1);
        assert!(registry.guards(id, "list").is_empty());
    }

    #[test]
    fn test_registration_is_append_only() {
        let mut registry = Registry::new();
        registry.add_guards::<Empty>("h", [Guard::sync(|_| true)]);
        registry.add_guards::<Empty>("h", [Guard::sync(|_| false), Guard::sync(|_| true)]);
        registry.add_param::<Empty>("h", ParamDescriptor::new(0, ParamSource::Body, None));
        registry.add_param::<Empty>("h", ParamDescriptor::new(0, ParamSource::Body, None));

        let id = TypeId::of::<Empty>();
        assert_eq!(registry.guards(id, "h").len(), 3);
        assert_eq!(registry.params(id, "h").len(), 2);
    }

    #[test]
    fn test_prefix_last_call_wins() {
        let mut registry = Registry::new();
        registry.set_prefix::<Empty>("first");
        registry.set_prefix::<Empty>("second");
        assert_eq!(registry.prefix(TypeId::of::<Empty>()), "second");
    }

    #[test]
    fn test_http_method_display_and_serde() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(
            serde_json::to_value(HttpMethod::Delete).unwrap(),
            json!("DELETE")
        );
        assert_eq!(
            serde_json::to_value(ParamSource::Query).unwrap(),
            json!("query")
        );
    }
}
