use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{batch_response, error_body, reminder_response};
use crate::care::DeviceZone;
use crate::reminders::{NewReminder, ReminderLifecycleController};
use crate::store::ReminderQuery;

type Controller<Tz> = Extension<Arc<ReminderLifecycleController<Tz>>>;

fn one_day() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct ListRemindersQuery {
    #[serde(default)]
    pub completed: bool,
    pub plant_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SnoozeRequest {
    #[serde(default = "one_day")]
    pub days: u32,
}

#[derive(Deserialize, Default)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct BatchSnoozeRequest {
    pub ids: Vec<Uuid>,
    #[serde(default = "one_day")]
    pub days: u32,
}

// GET /reminders/grouped
pub async fn grouped_reminders<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
) -> impl IntoResponse {
    Json(controller.grouped_reminders())
}

// GET /reminders?completed=&plant_id=
pub async fn list_reminders<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Query(params): Query<ListRemindersQuery>,
) -> impl IntoResponse {
    let mut query = ReminderQuery {
        completed: params.completed,
        plant_id: None,
    };
    if let Some(plant_id) = params.plant_id {
        query = query.for_plant(plant_id);
    }

    match controller.coordinator().reminder_store().list(&query).await {
        Ok(reminders) => Json(reminders).into_response(),
        Err(e) => {
            error!("Failed to list reminders: {}", e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_FAILURE",
                "Database error",
            )
        }
    }
}

// POST /reminders
pub async fn register_reminder<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Json(payload): Json<NewReminder>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "register");
    reminder_response(StatusCode::CREATED, controller.register(payload).await)
}

// DELETE /reminders/:id
pub async fn discard_reminder<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "discard");
    reminder_response(StatusCode::OK, controller.discard(id).await)
}

// POST /reminders/:id/done
pub async fn mark_done<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "mark_done");
    reminder_response(StatusCode::OK, controller.mark_done(id).await)
}

// POST /reminders/:id/snooze
pub async fn snooze<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SnoozeRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "snooze");
    reminder_response(StatusCode::OK, controller.snooze(id, payload.days).await)
}

// POST /reminders/:id/reschedule
// The body is optional; without a date the reminder moves one day.
pub async fn reschedule<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "reschedule");
    let payload: RescheduleRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RescheduleRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                return error_body(StatusCode::BAD_REQUEST, "INVALID_BODY", e.to_string());
            }
        }
    };

    reminder_response(
        StatusCode::OK,
        controller.reschedule(id, payload.scheduled_for).await,
    )
}

// POST /reminders/batch/done
pub async fn batch_mark_done<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Json(payload): Json<BatchRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "batch_mark_done");
    let report = controller.batch_mark_done(&payload.ids).await;
    info!(
        requested = payload.ids.len(),
        failed = report.failure_count(),
        "Batch mark-done handled"
    );
    batch_response(&report)
}

// POST /reminders/batch/snooze
pub async fn batch_snooze<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Json(payload): Json<BatchSnoozeRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "batch_snooze");
    let report = controller.batch_snooze(&payload.ids, payload.days).await;
    info!(
        requested = payload.ids.len(),
        failed = report.failure_count(),
        "Batch snooze handled"
    );
    batch_response(&report)
}

