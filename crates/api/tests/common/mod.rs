#![allow(dead_code)]

use std::sync::Arc;

use adgen_api::config::{ProviderMode, ServerConfig};
use adgen_api::router::build_app_router;
use adgen_api::state::AppState;
use adgen_db::InMemoryJobStore;
use adgen_events::EventBus;
use adgen_pipeline::{Dispatcher, ManifestComposer, Reconciler};
use adgen_providers::{Delivery, ProviderConfig, Script, ScriptedProvider};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        provider_mode: ProviderMode::Simulated,
        provider: ProviderConfig {
            provider_base_url: String::new(),
            api_key: String::new(),
            callback_base_address: "http://localhost:3000".to_string(),
        },
    }
}

/// Application wired to an in-memory store and a scripted provider.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryJobStore>,
    pub provider: Arc<ScriptedProvider>,
}

/// Callbacks are held by the provider so tests drive them over HTTP.
pub fn build_test_app() -> TestApp {
    build_test_app_with(Delivery::Manual, &[])
}

pub fn build_test_app_with(
    delivery: Delivery,
    scripts: &[(adgen_core::component::ComponentKind, Script)],
) -> TestApp {
    let store = Arc::new(InMemoryJobStore::new());
    let event_bus = Arc::new(EventBus::default());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(ManifestComposer),
        event_bus.clone(),
    ));

    let mut provider = ScriptedProvider::new(reconciler.clone(), delivery);
    for (component, script) in scripts {
        provider = provider.with_script(*component, script.clone());
    }
    let provider = Arc::new(provider);

    let config = test_config();
    let dispatcher =
        Dispatcher::with_provider(config.provider.clone(), provider.clone(), event_bus.clone());
    let state = AppState::new(config, store.clone(), event_bus, reconciler, dispatcher);

    TestApp {
        router: build_app_router(state),
        store,
        provider,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn podcast_ad_body(owner_id: &str) -> serde_json::Value {
    serde_json::json!({
        "owner_id": owner_id,
        "type": "podcastAd",
        "input": {
            "music": {
                "prompt": {"genres": "lofi", "moods": "calm"},
                "duration_secs": 30,
                "volume": 0.4
            },
            "voiceOver": {
                "prompt": {"voice": "alloy", "text": "This episode is brought to you by..."},
                "duration_secs": 25,
                "offset_ms": 1500
            }
        }
    })
}

/// Create a podcast ad job and return its id.
pub async fn create_job(app: &Router, owner_id: &str) -> String {
    let response = post_json(app.clone(), "/api/v1/jobs", podcast_ad_body(owner_id)).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}
