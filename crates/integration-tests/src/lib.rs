//! Integration tests for Gilded.
//!
//! The whole storefront runs in-process: the real axum router and workflow
//! services, wired to the in-memory store and the scripted gateway/mailer
//! doubles. Tests drive the HTTP surface with `tower::ServiceExt::oneshot`
//! and assert on both the JSON responses and the recorded side effects.
//!
//! ```bash
//! cargo test -p gilded-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use tower::util::ServiceExt;

use gilded_core::{Email, Money, UserId};
use gilded_server::config::{EmailConfig, MidtransConfig, ServerConfig};
use gilded_server::db::{MemoryStore, Store};
use gilded_server::models::{NewProduct, Product, Profile};
use gilded_server::routes;
use gilded_server::state::AppState;
use gilded_server::testing::{RecordingMailer, ScriptedGateway};

/// An in-process storefront with handles to every collaborator.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build a storefront over fresh in-memory collaborators.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let mailer = Arc::new(RecordingMailer::new());

        let state = AppState::new(
            test_config(),
            store.clone(),
            gateway.clone(),
            mailer.clone(),
        );

        Self {
            store,
            gateway,
            mailer,
            state,
        }
    }

    /// The service router, as `main` builds it.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes().with_state(self.state.clone())
    }

    /// Seed a shopper profile.
    pub async fn seed_shopper(&self, user_id: i32, email: &str) {
        self.store
            .upsert_profile(Profile {
                user_id: UserId::new(user_id),
                email: Email::parse(email).expect("valid test email"),
                full_name: None,
                address: None,
            })
            .await
            .expect("seed profile");
    }

    /// Seed one product.
    pub async fn seed_product(&self, name: &str, price: i64, stock: i32) -> Product {
        self.store
            .insert_product(NewProduct {
                name: name.to_owned(),
                description: String::new(),
                price: Money::new(price),
                stock,
                category: "rings".to_owned(),
                image_url: None,
            })
            .await
            .expect("seed product")
    }

    /// Send a JSON request and return (status, parsed body).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder
                    .body(Body::from(json.to_string()))
                    .expect("build request")
            }
            None => builder.body(Body::empty()).expect("build request"),
        };

        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON body")
        };

        (status, json)
    }

    /// POST a JSON body.
    pub async fn post(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request("POST", uri, Some(body)).await
    }

    /// GET a resource.
    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request("GET", uri, None).await
    }
}

/// A configuration good enough for in-process tests; nothing in it is ever
/// dialed.
fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/gilded_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        midtrans: MidtransConfig {
            server_key: SecretString::from("SB-Mid-server-integration"),
            client_key: "SB-Mid-client-integration".to_owned(),
            snap_base_url: "https://app.sandbox.midtrans.com".to_owned(),
            api_base_url: "https://api.sandbox.midtrans.com".to_owned(),
        },
        email: EmailConfig {
            smtp_host: "smtp.test.invalid".to_owned(),
            smtp_port: 587,
            smtp_username: "mailer".to_owned(),
            smtp_password: SecretString::from("integration-test-password"),
            from_address: "Gilded <orders@gilded.example>".to_owned(),
        },
        sentry_dsn: None,
    }
}
