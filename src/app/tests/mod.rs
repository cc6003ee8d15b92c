//! Router-level tests for [`Application`].
//!
//! These run in-process through `oneshot()`; the real-server tests live under
//! `tests/`.

use crate::{Application, Config, Controller};
use axum::{Router, body::Body, http::Request, response::Response};
use serde_json::Value;

pub(crate) mod injection;

const BASE_CONFIG_TOML: &str = r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 3000
global_prefix = "/api"
max_payload_size_bytes = "1KiB"
liveness_route = "/health"

[logging]
format = "json"
"#;

pub(crate) fn create_test_config() -> Config {
    BASE_CONFIG_TOML
        .parse()
        .expect("Failed to parse test config TOML")
}

/// Parses the base configuration with `additional_toml` appended to the
/// `[http]` section.
pub(crate) fn create_config_with_http_toml(additional_toml: &str) -> Config {
    format!(
        r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 3000
global_prefix = "/api"
max_payload_size_bytes = "1KiB"
liveness_route = "/health"
{additional_toml}
"#
    )
    .parse()
    .expect("Failed to parse test config TOML")
}

/// Compiles a single controller without the global middleware.
pub(crate) fn create_test_router<C: Controller>() -> Router {
    Application::new(create_test_config())
        .unwrap()
        .controller::<C>()
        .compile()
        .unwrap()
        .into_inner()
}

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) async fn get_body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub(crate) async fn get_body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
