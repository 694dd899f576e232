//! Router fixtures: a temp database, a fixed vault key and both adapters
//! pointed at one WireMock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use calsync_api::{router, AppContext};
use calsync_common::crypto::CredentialVault;
use calsync_domain::{Config, GoogleConfig, NotionConfig};
use calsync_infra::http::HttpClient;
use calsync_infra::providers::{
    DefaultProviderRegistry, GoogleCalendarAdapter, NotionDatabaseAdapter,
};
use calsync_infra::DbManager;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

const RARE_CRON: &str = "0 0 0 1 1 *";

pub struct TestApp {
    pub context: Arc<AppContext>,
    pub server: MockServer,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("calsync-api-test.db");

        let mut config = Config::default();
        config.database.path = db_path.to_string_lossy().into_owned();
        config.server.public_base_url = "https://calsync.test".into();
        // Scheduled jobs stay out of the way of the request-driven tests.
        config.sync.cron_expression = RARE_CRON.into();
        config.sync.renew_cron = RARE_CRON.into();
        config.sync.sweep_cron = RARE_CRON.into();
        config.providers.google = GoogleConfig {
            api_base: server.uri(),
            token_endpoint: format!("{}/token", server.uri()),
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
        };
        config.providers.notion =
            NotionConfig { api_base: server.uri(), notion_version: "2022-06-28".into() };

        let db = DbManager::new(&db_path, 4).expect("db manager should be created");
        db.run_migrations().expect("schema migrations should apply");

        let http = HttpClient::builder()
            .max_attempts(1)
            .timeout(Duration::from_secs(5))
            .build()
            .expect("http client should build");
        let providers = DefaultProviderRegistry::new(
            Arc::new(GoogleCalendarAdapter::with_client(config.providers.google.clone(), http.clone())),
            Arc::new(NotionDatabaseAdapter::with_client(config.providers.notion.clone(), http)),
        );

        let context = AppContext::with_services(
            config,
            Arc::new(db),
            Arc::new(CredentialVault::from_raw_key([9u8; 32])),
            Arc::new(providers),
        );

        Self { context: Arc::new(context), server, _temp_dir: temp_dir }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.context))
    }

    /// Send one request and decode the body as JSON (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.expect("router should respond");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request should build"),
        )
        .await
    }

    pub async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().method(method).uri(uri).body(Body::empty()).expect("request"))
            .await
    }

    /// Run the authorization handoff and connect an integration.
    pub async fn connect(&self, provider: &str, external_id: &str, expires_in: i64) -> String {
        let (status, issued) =
            self.post_json("/api/authorizations", serde_json::json!({ "provider": provider })).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, integration) = self
            .post_json(
                "/api/integrations",
                serde_json::json!({
                    "state": issued["state"],
                    "provider": provider,
                    "externalId": external_id,
                    "accessToken": "access-1",
                    "refreshToken": "refresh-1",
                    "expiresIn": expires_in
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "connect failed: {integration}");
        integration["id"].as_str().expect("integration id").to_string()
    }
}
