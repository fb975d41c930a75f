use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{action_error_response, batch_response};
use crate::care::DeviceZone;
use crate::reminders::ReminderLifecycleController;

type Controller<Tz> = Extension<Arc<ReminderLifecycleController<Tz>>>;

#[derive(Deserialize)]
pub struct BatchModeRequest {
    pub enabled: bool,
}

#[derive(Deserialize)]
pub struct SnoozeSelectionRequest {
    #[serde(default = "one_day")]
    pub days: u32,
}

fn one_day() -> u32 {
    1
}

pub async fn get_selection<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
) -> impl IntoResponse {
    Json(controller.selection().await)
}

pub async fn clear_selection<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
) -> impl IntoResponse {
    Json(controller.clear_selection().await)
}

pub async fn set_batch_mode<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Json(payload): Json<BatchModeRequest>,
) -> impl IntoResponse {
    Json(controller.set_batch_mode(payload.enabled).await)
}

pub async fn select<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match controller.select(id).await {
        Ok(selection) => Json(selection).into_response(),
        Err(e) => action_error_response(&e),
    }
}

pub async fn deselect<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    Json(controller.deselect(id).await)
}

pub async fn mark_selection_done<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "selection_done");
    batch_response(&controller.mark_selection_done().await)
}

pub async fn snooze_selection<Tz: DeviceZone>(
    Extension(controller): Controller<Tz>,
    Json(payload): Json<SnoozeSelectionRequest>,
) -> impl IntoResponse {
    tracing::Span::current().record("action", "selection_snooze");
    batch_response(&controller.snooze_selection(payload.days).await)
}
