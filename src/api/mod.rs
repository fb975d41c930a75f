pub mod events;
pub mod layers;
pub mod plants;
pub mod reminders;
pub mod selection;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::care::{DeviceZone, Reminder};
use crate::error::ActionError;
use crate::reminders::{BatchReport, ReminderLifecycleController};

/// Application routes. Observability layers and `/metrics` are added by the
/// binary.
pub fn router<Tz: DeviceZone>(controller: Arc<ReminderLifecycleController<Tz>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/reminders",
            get(reminders::list_reminders::<Tz>).post(reminders::register_reminder::<Tz>),
        )
        .route("/reminders/grouped", get(reminders::grouped_reminders::<Tz>))
        .route("/reminders/batch/done", post(reminders::batch_mark_done::<Tz>))
        .route("/reminders/batch/snooze", post(reminders::batch_snooze::<Tz>))
        .route("/reminders/:id", delete(reminders::discard_reminder::<Tz>))
        .route("/reminders/:id/done", post(reminders::mark_done::<Tz>))
        .route("/reminders/:id/snooze", post(reminders::snooze::<Tz>))
        .route("/reminders/:id/reschedule", post(reminders::reschedule::<Tz>))
        .route("/plants/attention", get(plants::list_attention::<Tz>))
        .route("/plants/:id/attention", get(plants::get_attention::<Tz>))
        .route(
            "/selection",
            get(selection::get_selection::<Tz>).delete(selection::clear_selection::<Tz>),
        )
        .route("/selection/mode", put(selection::set_batch_mode::<Tz>))
        .route("/selection/done", post(selection::mark_selection_done::<Tz>))
        .route("/selection/snooze", post(selection::snooze_selection::<Tz>))
        .route(
            "/selection/:id",
            post(selection::select::<Tz>).delete(selection::deselect::<Tz>),
        )
        .route("/events", get(events::stream_snapshots::<Tz>))
        .layer(Extension(controller))
}

async fn health_check() -> &'static str {
    "OK"
}

pub(crate) fn error_body(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": code, "message": message.into() })),
    )
        .into_response()
}

pub(crate) fn action_error_response(error: &ActionError) -> Response {
    let status = match error {
        ActionError::NotFound(_) | ActionError::PlantNotFound(_) => StatusCode::NOT_FOUND,
        ActionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ActionError::Terminal { .. } => StatusCode::CONFLICT,
        ActionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let span = tracing::Span::current();
    span.record("error", error.code());
    error_body(status, error.code(), error.to_string())
}

pub(crate) fn reminder_response(
    status: StatusCode,
    result: Result<Reminder, ActionError>,
) -> Response {
    match result {
        Ok(reminder) => (status, Json(reminder)).into_response(),
        Err(e) => action_error_response(&e),
    }
}

#[derive(Serialize)]
struct ItemFailure {
    id: Uuid,
    error: &'static str,
    message: String,
}

#[derive(Serialize)]
struct BatchResponse<'a> {
    succeeded: Vec<&'a Reminder>,
    failed: Vec<ItemFailure>,
}

/// Batches always answer 200; per-item failures are in the body.
pub(crate) fn batch_response(report: &BatchReport) -> Response {
    let body = BatchResponse {
        succeeded: report.succeeded().collect(),
        failed: report
            .failed()
            .map(|(id, e)| ItemFailure {
                id,
                error: e.code(),
                message: e.to_string(),
            })
            .collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}
