//! Server-Sent Events stream of the caller's domain events

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};

use crate::middleware::CurrentUser;
use crate::AppState;

/// GET /events
///
/// Each SSE message is named after the domain event (`saleCreated`,
/// `stockAlertCreated`, ...) and carries its JSON payload. Only events for
/// the authenticated owner are forwarded.
pub async fn stream_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner = current_user.id();
    tracing::debug!(owner = %owner, "event stream opened");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(move |message| {
        match message {
            Ok(event) if event.owner_id == owner => Event::default()
                .event(event.name.as_str())
                .json_data(&event.payload)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(owner = %owner, skipped, "event stream lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
