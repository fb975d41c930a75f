//! Shared helpers for router tests: an app over an in-memory store with a
//! pinned clock, plus request/response shorthands.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use plantpulse_server::api;
use plantpulse_server::care::{Calendar, Clock, Plant, Reminder, ReminderType};
use plantpulse_server::notifications::LocalNotifier;
use plantpulse_server::reminders::{
    BatchActionCoordinator, ControllerHandle, ReminderLifecycleController,
};
use plantpulse_server::store::{MemoryStore, ReminderStore};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub struct PinnedClock(pub DateTime<Utc>);

impl Clock for PinnedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub controller: Arc<ReminderLifecycleController<Utc>>,
    pub now: DateTime<Utc>,
    _refresher: ControllerHandle,
}

/// Noon UTC tomorrow: always ahead of the wall clock, so notification timers
/// accept every trigger the tests produce.
pub fn pinned_noon() -> DateTime<Utc> {
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();
    tomorrow
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
        .and_utc()
}

pub async fn build_test_app() -> TestApp {
    let now = pinned_noon();
    let store = Arc::new(MemoryStore::new());
    let calendar = Calendar::new(Utc, Arc::new(PinnedClock(now)));
    let coordinator = Arc::new(BatchActionCoordinator::new(
        store.clone(),
        store.clone(),
        Arc::new(LocalNotifier::new()),
        calendar,
    ));
    let controller = Arc::new(ReminderLifecycleController::new(coordinator));
    let refresher = controller.start().await.expect("controller starts");

    TestApp {
        router: api::router(controller.clone()),
        store,
        controller,
        now,
        _refresher: refresher,
    }
}

impl TestApp {
    /// Makes direct store writes visible to snapshot-backed endpoints.
    pub async fn settle(&self) {
        self.controller.refresh().await.expect("refresh snapshot");
    }

    pub async fn plant(&self, name: &str) -> Plant {
        let plant = Plant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            strain: None,
            image_url: None,
            health_percentage: 100,
            next_watering_days: 5,
            next_nutrient_days: 5,
        };
        self.store.upsert_plant(plant.clone()).await;
        self.settle().await;
        plant
    }

    pub async fn reminder(&self, plant: &Plant, due: DateTime<Utc>) -> Reminder {
        let reminder = self
            .store
            .insert(Reminder::new(plant.id, ReminderType::Watering, due))
            .await
            .expect("insert reminder");
        self.settle().await;
        reminder
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.send(Method::POST, uri, None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(Method::DELETE, uri, None).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Asserts the status and returns the JSON body.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
