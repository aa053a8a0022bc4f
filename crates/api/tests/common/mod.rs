//! Common test utilities for integration tests.
//!
//! The router runs over the in-memory store with recording mock transports, so
//! these tests need no database or network.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use domain::services::{MockEmailTransport, MockWhatsAppTransport};
use fake::faker::name::en::Name;
use fake::Fake;
use persistence::MemoryTableStore;
use retreat_portal_api::app::{create_app, AppState};
use retreat_portal_api::config::Config;
use serde_json::{json, Value};
use shared::jwt::AccessTokenVerifier;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-shared-secret";
pub const PRIMARY_ADMIN_EMAIL: &str = "coordenacao@example.com";
pub const APPROVER_EMAIL: &str = "aprovador@example.com";

/// Router plus handles on everything it talks to.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryTableStore>,
    pub email: Arc<MockEmailTransport>,
    pub whatsapp: Arc<MockWhatsAppTransport>,
    pub verifier: AccessTokenVerifier,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Bearer token for an arbitrary user.
    pub fn token_for(&self, user_id: Uuid, email: &str) -> String {
        self.verifier.issue(user_id, Some(email), 3600).unwrap()
    }

    /// Bearer token for the configured primary admin.
    pub fn admin_token(&self) -> String {
        self.token_for(Uuid::new_v4(), PRIMARY_ADMIN_EMAIL)
    }
}

/// Test configuration: memory backend, no confirmation backoff.
pub fn test_config() -> Config {
    let mut config = Config::load_for_test(&[
        ("jwt.secret", JWT_SECRET),
        ("approval.approver_email", APPROVER_EMAIL),
        ("approval.link_base_url", "https://retiros.example.com"),
    ])
    .expect("Failed to load test config");
    config.approval.primary_admins = vec![PRIMARY_ADMIN_EMAIL.to_string()];
    config.notifications.confirmation_backoff_ms = 0;
    config
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(MockEmailTransport::new(), MockWhatsAppTransport::new())
}

pub fn create_test_app_with(email: MockEmailTransport, whatsapp: MockWhatsAppTransport) -> TestApp {
    let store = Arc::new(MemoryTableStore::new());
    let email = Arc::new(email);
    let whatsapp = Arc::new(whatsapp);
    let config = test_config();
    let verifier = AccessTokenVerifier::new(JWT_SECRET, 0).unwrap();

    let state = AppState::new(
        config,
        store.clone(),
        Arc::new(store.elevated()),
        email.clone(),
        whatsapp.clone(),
    )
    .expect("Failed to build app state");

    TestApp {
        router: create_app(state),
        store,
        email,
        whatsapp,
        verifier,
    }
}

/// Helper to build a JSON request, optionally authenticated.
pub fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Helper to build a request without a body.
pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Creates a retreat through the admin API and returns its JSON.
pub async fn create_retreat(app: &TestApp, overrides: Value) -> Value {
    let mut body = json!({
        "name": "Retiro de Quaresma",
        "startDate": "2026-03-20",
        "endDate": "2026-03-22",
        "location": "Casa de Retiros São José",
        "whatToBring": "Bíblia, roupa de cama",
        "paymentInstructions": "PIX: financeiro@example.com - R$ 350,00",
        "shirtSizes": ["P", "M", "G"],
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }

    let token = app.admin_token();
    let response = app
        .send(json_request(Method::POST, "/api/v1/retreats", body, Some(&token)))
        .await;
    assert_eq!(response.status(), 201);
    parse_response_body(response).await
}

/// A valid public registration form.
pub fn registration_form() -> Value {
    let name: String = Name().fake();
    json!({
        "fullName": name,
        "phone": "(11) 98765-4321",
        "email": format!("participante.{}@example.com", Uuid::new_v4().simple()),
        "dateOfBirth": "1988-07-02",
        "parish": "Paróquia São Judas",
        "hasHealthIssue": false,
        "shirtSize": "M",
        "emergencyContactName": "Ana",
        "emergencyContactPhone": "(11) 91234-5678",
        "termsAccepted": true,
    })
}

/// Submits `form` for the retreat behind `share_link`.
pub async fn submit_registration(app: &TestApp, share_link: &str, form: Value) -> axum::response::Response {
    app.send(json_request(
        Method::POST,
        &format!("/api/v1/public/retreats/{}/registrations", share_link),
        form,
        None,
    ))
    .await
}
