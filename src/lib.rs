//! # axum-controllers
//!
//! Declarative controllers for Axum: constructor injection, per-route guards,
//! pipes, middleware and exception filters, and a production middleware stack
//! configured through TOML.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum_controllers::{
//!     Application, Controller, ControllerDecl, Dependencies, Injectable, Invocation, Reply,
//!     Result,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct HelloController;
//!
//! impl Injectable for HelloController {
//!     fn construct(_: &mut Dependencies) -> Result<Self> {
//!         Ok(HelloController)
//!     }
//! }
//!
//! impl HelloController {
//!     async fn hello(self: Arc<Self>, inv: Invocation) -> Result<Reply> {
//!         let name: Option<String> = inv.arg(0)?;
//!         Reply::json(&json!({ "hello": name.unwrap_or_else(|| "world".into()) }))
//!     }
//! }
//!
//! impl Controller for HelloController {
//!     fn declare(c: &mut ControllerDecl<'_, Self>) {
//!         c.prefix("hello");
//!         c.get("", "hello", Self::hello).query_field(0, "name");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let app = Application::from_env()?;
//!     app.config().setup_tracing();
//!
//!     app.controller::<HelloController>()
//!         .setup_middleware()?
//!         .start()
//!         .await
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! [http]
//! global_prefix = "/api"
//! max_payload_size_bytes = "1MiB"
//! ```
//!
//! Run with `RUST_ENV=dev cargo run` and call `GET /api/hello?name=ada`.
//!
//! # Request Pipeline
//!
//! Every controller route runs the same fixed sequence:
//!
//! 1. Route middleware, first declared outermost
//! 2. Guards in order; the first `false` answers 403 `{"status":"forbidden"}`
//! 3. Parameter extraction from body, query or path captures
//! 4. Every pipe over every parameter, in declaration order
//! 5. The handler; a returned [`Reply::Json`] is serialized unless the
//!    handler already wrote a response
//! 6. On error, exception filters in order until one writes a response;
//!    otherwise the generic JSON error response
//!
//! # Global Middleware
//!
//! | Middleware | Description | Default |
//! |------------|-------------|---------|
//! | `body-limit` | 413 above `max_payload_size_bytes` | 100KiB |
//! | `cors` | CORS headers and preflight | Permissive |
//! | `logging` | Request spans with method, URI and request id | Enabled |
//! | `timeout` | 408 after `request_timeout` | Off |
//! | `request-id` | UUIDv7 `x-request-id` propagation | Enabled |
//! | `liveness` | `OK` at `liveness_route` | `/live` |
//! | `catch-panic` | Panics become 500 responses | Enabled |
//!
//! Disable some with `exclude = [...]` (or enable a subset with
//! `include = [...]`) under `[http]`.
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | `container` | Dependency injection ([`Container`], [`Injectable`]) |
//! | `metadata` | Controller declarations ([`Controller`], [`Registry`]) |
//! | `pipeline` | Guards, pipes, filters, middleware and the request context |
//! | `compiler` | Turns declarations into routes ([`compile`]) |
//! | `transport` | The route table lowered into an axum router ([`RouteTable`]) |
//! | `app` | The application builder and server ([`Application`]) |
//! | `config` | Configuration loading and validation ([`Config`], [`AppEnv`]) |
//! | [`path`] | Route path normalization |
//!
//! # Error Handling
//!
//! The library uses a custom [`Result`] type. Errors that reach the generic
//! error path become structured JSON:
//!
//! ```json
//! {
//!   "error_code": "NOT_FOUND",
//!   "message": "user 7 does not exist"
//! }
//! ```
mod app;
mod compiler;
mod config;
mod container;
mod error;
mod metadata;
pub mod path;
mod pipeline;
mod transport;
mod utils;

pub use app::*;
pub use compiler::*;
pub use config::*;
pub use container::*;
pub use error::*;
pub use metadata::*;
pub use pipeline::*;
pub use transport::*;
pub use utils::*;

pub type Result<T> = std::result::Result<T, Error>;
