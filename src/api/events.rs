use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};

use crate::care::DeviceZone;
use crate::reminders::ReminderLifecycleController;

// GET /events
// Sends the current snapshot right away, then one event per change.
pub async fn stream_snapshots<Tz: DeviceZone>(
    Extension(controller): Extension<Arc<ReminderLifecycleController<Tz>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = controller.subscribe();
    tracing::info!("📡 Snapshot stream opened");

    let events = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok(event), (rx, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
