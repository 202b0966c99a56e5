use std::convert::Infallible;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::{
    extract::{Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use pricefeed_models::PriceUpdateEvent;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, warn};

use crate::{AppState, StreamSession, StreamStart};

/// Events buffered between a session task and the HTTP body.
pub const OUTBOUND_BUFFER: usize = 16;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub since: Option<String>,
}

impl StreamParams {
    /// An absent or empty `since` starts from the latest event. A value that
    /// is not an integer is ignored and the client only gets live updates.
    pub fn start(&self) -> StreamStart {
        let Some(raw) = self.since.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) else {
            return StreamStart::Latest;
        };

        match raw.parse() {
            Ok(since) => StreamStart::Since(since),
            Err(e) => {
                warn!(since = raw, error = %e, "Ignoring invalid since parameter, streaming live updates only");
                StreamStart::LiveOnly
            }
        }
    }
}

/// SSE body fed by a [`StreamSession`].
///
/// Dropping the body (the client disconnected) cancels the session through
/// the held guard.
pub struct SseFrames {
    events: mpsc::Receiver<PriceUpdateEvent>,
    _disconnect: DropGuard,
}

impl SseFrames {
    pub fn new(events: mpsc::Receiver<PriceUpdateEvent>, disconnect: DropGuard) -> Self {
        Self {
            events,
            _disconnect: disconnect,
        }
    }
}

impl Stream for SseFrames {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(event) = ready!(self.events.poll_recv(cx)) else {
                return Poll::Ready(None);
            };

            match Event::default().json_data(event) {
                Ok(frame) => return Poll::Ready(Some(Ok(frame))),
                Err(e) => {
                    warn!(timestamp = event.timestamp, error = %e, "Error encoding price update, skipping");
                }
            }
        }
    }
}

/// `GET /prices/stream[?since=<epoch seconds>]`
pub async fn stream_prices(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Response {
    let start = params.start();

    let cancel = state.shutdown.child_token();
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let session = StreamSession::new(state.store.clone(), state.hub.clone(), start, cancel.clone());
    tokio::spawn(session.run(tx));
    debug!(?start, "Stream client connected");

    let frames = SseFrames::new(rx, cancel.drop_guard());
    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(frames).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
