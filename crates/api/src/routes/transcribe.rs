use std::convert::Infallible;

use axum::{
    Json,
    extract::{Multipart, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use scribe_transcription::{StreamEvent, TranscriptionOutput};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

use super::{TranscribeParams, read_single_upload};
use crate::{error::ApiError, state::AppState};

/// Terminal SSE payload.
pub const DONE_MARKER: &str = "[DONE]";

/// Transcribes a single `file` part and waits for the result.
pub async fn transcribe(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
    multipart: Multipart,
) -> Result<Json<TranscriptionOutput>, ApiError> {
    let file = read_single_upload(multipart, "file").await?;
    let options = params.decode_options()?;

    let output = state
        .dispatcher
        .transcribe_now(file, params.language.as_deref(), options)
        .await?;
    Ok(Json(output))
}

/// Streams a single `file` part as Server-Sent Events: metadata, then one
/// event per segment, then `[DONE]`.
pub async fn stream(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let file = read_single_upload(multipart, "file").await?;
    let options = params.decode_options()?;

    let events = state
        .dispatcher
        .open_stream(file, params.language.as_deref(), options)
        .await?;

    let stream = ReceiverStream::new(events).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &StreamEvent) -> Event {
    Event::default().data(sse_payload(event))
}

fn sse_payload(event: &StreamEvent) -> String {
    if matches!(event, StreamEvent::Done) {
        return DONE_MARKER.to_string();
    }
    serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
    })
}
