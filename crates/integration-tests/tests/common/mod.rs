//! Shared harness: an in-memory engine behind the real HTTP router.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use cp_api::{AppState, Metrics};
use cp_core::config::EngineConfig;
use cp_core::models::{ContentMeta, ContentRef, ContentStatus, ContentType, User};
use cp_core::traits::{EngineStore, Notifier};
use cp_db_sqlite::SqliteEngineStore;
use cp_engine::{
    AggregateCache, AnomalyDetector, ModerationWorkflow, TracingNotifier, TrustScoreLedger,
    VoteAggregationEngine, VotingService,
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteEngineStore>,
    pub ledger: Arc<TrustScoreLedger>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(EngineConfig::default()).await
}

/// Wires the full stack the way the binary does, against `sqlite::memory:`.
pub async fn spawn_app_with(config: EngineConfig) -> TestApp {
    let concrete = Arc::new(
        SqliteEngineStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store"),
    );
    let store: Arc<dyn EngineStore> = concrete.clone();

    let ledger = Arc::new(TrustScoreLedger::new(store.clone(), config.trust.clone()));
    let aggregator = Arc::new(VoteAggregationEngine::new(
        store.clone(),
        config.weights.clone(),
    ));
    let cache = Arc::new(AggregateCache::new(aggregator));
    let voting = Arc::new(VotingService::new(
        store.clone(),
        config.weights.clone(),
        cache.clone(),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let anomalies = Arc::new(AnomalyDetector::new(
        store.clone(),
        cache.clone(),
        notifier.clone(),
    ));
    let moderation = Arc::new(ModerationWorkflow::new(
        store.clone(),
        ledger.clone(),
        notifier,
        &config,
    ));

    let state = AppState {
        store,
        ledger: ledger.clone(),
        voting,
        cache,
        anomalies,
        moderation,
        metrics: Arc::new(Metrics::new()),
    };

    TestApp {
        router: cp_api::router(state),
        store: concrete,
        ledger,
    }
}

impl TestApp {
    pub async fn seed_user(&self, trust_score: f64, is_global_admin: bool) -> Uuid {
        let id = Uuid::now_v7();
        self.store
            .insert_user(&User {
                id,
                trust_score,
                is_global_admin,
                is_official: false,
                created_at: Utc::now(),
            })
            .await
            .expect("seed user");
        id
    }

    pub async fn seed_content(&self, content_type: ContentType, author_id: Uuid) -> ContentRef {
        let content = ContentRef::new(content_type, Uuid::now_v7());
        self.store
            .insert_content(&ContentMeta {
                content,
                author_id,
                status: ContentStatus::Approved,
            })
            .await
            .expect("seed content");
        content
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        acting_user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = acting_user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("serialize body")))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, user: Uuid, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn get(&self, uri: &str, user: Option<Uuid>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, user, None).await
    }

    pub async fn cast_vote(
        &self,
        voter: Uuid,
        content: ContentRef,
        direction: i64,
    ) -> (StatusCode, Value) {
        self.post(
            "/votes",
            voter,
            serde_json::json!({
                "content_type": content.content_type,
                "content_id": content.content_id,
                "direction": direction,
            }),
        )
        .await
    }
}
