use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::error_body;
use crate::care::DeviceZone;
use crate::reminders::ReminderLifecycleController;

// GET /plants/attention
pub async fn list_attention<Tz: DeviceZone>(
    Extension(controller): Extension<Arc<ReminderLifecycleController<Tz>>>,
) -> impl IntoResponse {
    Json(controller.attention_statuses())
}

// GET /plants/:id/attention
pub async fn get_attention<Tz: DeviceZone>(
    Extension(controller): Extension<Arc<ReminderLifecycleController<Tz>>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match controller.attention_status(id) {
        Some(status) => Json(status).into_response(),
        None => error_body(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Plant {} not found", id),
        ),
    }
}
