//! Server-sent event stream of service events
//!
//! Frames are written as `event: <type>\ndata: <json>\n\n`, with a comment
//! frame after every quiet keep-alive period.

use super::handlers::AppState;
use crate::constants::events::KEEP_ALIVE_SECS;
use crate::domain::Subscription;
use axum::{
    body::StreamBody,
    extract::State,
    response::{IntoResponse, Response},
};
use http::header;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_stream::Stream;
use tracing::info;

const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

/// GET /v1/events
///
/// Each connection owns one broadcaster subscription. It is released when the
/// client disconnects and the response body is dropped.
pub async fn stream_events(State(app): State<AppState>) -> Response {
    let subscription = app.subscribe();
    info!(subscriber_id = %subscription.id(), "SSE client connected");

    let frames = EventFrames::new(subscription, Duration::from_secs(KEEP_ALIVE_SECS));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        StreamBody::new(frames),
    )
        .into_response()
}

/// Wire frames for one subscription, ending when its mailbox is closed
pub struct EventFrames {
    subscription: Subscription,
    keep_alive: Interval,
}

impl EventFrames {
    pub fn new(subscription: Subscription, keep_alive: Duration) -> Self {
        let mut keep_alive = interval_at(Instant::now() + keep_alive, keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            subscription,
            keep_alive,
        }
    }
}

impl Stream for EventFrames {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.subscription).poll_next(cx);
        match polled {
            Poll::Ready(Some(event)) => {
                self.keep_alive.reset();
                return Poll::Ready(Some(Ok(event.to_frame())));
            }
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        match self.keep_alive.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(Some(Ok(KEEP_ALIVE_FRAME.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
