use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde_json::json;
use tracing::debug;

use super::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Serves the story index.
///
/// A plain request gets the current snapshot as JSON, waiting for any
/// needed rebuild. A request accepting `text/event-stream` is upgraded to a
/// long-lived push channel instead: no initial payload, an `invalidate`
/// event whenever the index content changed, keep-alive comments while
/// idle. Streaming clients re-fetch the index themselves.
pub async fn index_json(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if wants_event_stream(&headers) {
        return index_events(&state).into_response();
    }

    match state.cache.get_index().await {
        Ok(index) => Json(&*index).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}

fn index_events(state: &AppState) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.notifier.subscribe();
    debug!("index event stream opened");

    let stream = async_stream::stream! {
        while subscription.changed().await {
            yield Ok(Event::default().event("invalidate").data(""));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}
