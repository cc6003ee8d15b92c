//! Controllers receiving their dependencies from the container.

use super::*;
use crate::{
    AppEnv, Controller, ControllerDecl, Dependencies, Dependency, ErrorKind, Injectable,
    Invocation, Reply, Result,
};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tower::ServiceExt;

static GREETING_SERVICES_BUILT: AtomicUsize = AtomicUsize::new(0);

struct GreetingService {
    prefix: String,
}

impl Injectable for GreetingService {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Config>()]
    }

    fn construct(deps: &mut Dependencies) -> Result<Self> {
        let config = deps.next::<Config>()?;
        GREETING_SERVICES_BUILT.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            prefix: format!("served on port {}", config.http.bind_port),
        })
    }
}

struct Welcome {
    greetings: Arc<GreetingService>,
    env: Arc<AppEnv>,
}

impl Injectable for Welcome {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::of::<GreetingService>(),
            Dependency::of::<AppEnv>(),
        ]
    }

    fn construct(deps: &mut Dependencies) -> Result<Self> {
        Ok(Self {
            greetings: deps.next()?,
            env: deps.next()?,
        })
    }
}

impl Welcome {
    async fn index(self: Arc<Self>, _: Invocation) -> Result<Reply> {
        Reply::json(&json!({
            "greeting": self.greetings.prefix,
            "mode": self.env.run_mode,
            "production": self.env.is_production(),
        }))
    }
}

impl Controller for Welcome {
    fn declare(c: &mut ControllerDecl<'_, Self>) {
        c.prefix("welcome");
        c.get("", "index", Self::index);
    }
}

/// Shares `GreetingService` with `Welcome`.
struct Farewell {
    greetings: Arc<GreetingService>,
}

impl Injectable for Farewell {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<GreetingService>()]
    }

    fn construct(deps: &mut Dependencies) -> Result<Self> {
        Ok(Self {
            greetings: deps.next()?,
        })
    }
}

impl Farewell {
    async fn index(self: Arc<Self>, _: Invocation) -> Result<Reply> {
        Reply::json(&json!({ "bye": self.greetings.prefix }))
    }
}

impl Controller for Farewell {
    fn declare(c: &mut ControllerDecl<'_, Self>) {
        c.prefix("farewell");
        c.get("", "index", Self::index);
    }
}

fn production_env() -> AppEnv {
    AppEnv::from_lookup(|name| match name {
        "RUST_ENV" => Some("production".into()),
        "PORT" => Some("8123".into()),
        _ => None,
    })
}

#[tokio::test]
async fn test_controller_receives_injected_services() {
    let env = production_env();
    let config = create_test_config().with_app_env(&env);
    let app = Application::new(config)
        .unwrap()
        .with_app_env(env)
        .provider::<GreetingService>()
        .controller::<Welcome>()
        .controller::<Farewell>()
        .compile()
        .unwrap();

    assert!(app.container().is_resolved::<GreetingService>());
    let router = app.into_inner();

    let response = router
        .clone()
        .oneshot(get_request("/api/welcome"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({
            "greeting": "served on port 8123",
            "mode": "production",
            "production": true,
        })
    );

    let response = router.oneshot(get_request("/api/farewell")).await.unwrap();
    assert_eq!(
        get_body_json(response).await,
        json!({ "bye": "served on port 8123" })
    );
    assert_eq!(GREETING_SERVICES_BUILT.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_provider_fails_compilation() {
    let err = Application::new(create_test_config())
        .unwrap()
        .with_app_env(AppEnv::default())
        .controller::<Welcome>()
        .compile()
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::NotInjectable);
    assert!(err.to_string().contains("GreetingService"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = create_test_config().with_bind_addr("not-an-ip");
    let err = Application::new(config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_registered_instance_is_resolvable() {
    let app = Application::new(create_test_config())
        .unwrap()
        .instance(String::from("shared"));

    assert_eq!(*app.container().resolve::<String>().unwrap(), "shared");
    assert!(app.container().contains::<Config>());
}
