//! Event monitor: a long-poll loop over the camera's event feed.
//!
//! `GET /ccapi/ver110/event/polling?timeout=long` asks the camera to hold
//! the connection open (~30 s) and answer only when state changes or its own
//! timeout expires. The reply is a JSON object mapping each changed field
//! name to its new value; an empty object means "nothing happened, timed out
//! naturally" and is not an error. This is deliberate backpressure
//! avoidance: the camera decides when to answer instead of the client
//! busy-polling.
//!
//! The monitor is independent of the timelapse scheduler and shares no
//! actuator state with it. Retry policy:
//!
//! - empty body → re-poll immediately (the long poll *is* the wait)
//! - unexpected status → log, re-poll without delay
//! - client-side timeout → log, re-poll (should not happen with the long
//!   timeout sized past the server-side one)
//! - connection failure → wait 5 s (cancellable), retry

use crate::cancel::CancelToken;
use crate::client::{CameraClient, ClientError};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::time::Duration;

/// Event feed path. `timeout=long` is the server-side hold; ver110 carries
/// the polling endpoint on every CCAPI camera seen so far.
pub const EVENT_POLL_PATH: &str = "/ccapi/ver110/event/polling?timeout=long";

/// Backoff after a connection failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// One observed state-change notification. Ephemeral: produced and consumed
/// inside the monitor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name of the changed field, e.g. `battery` or `addedcontents`.
    pub name: String,
    pub observed_at: DateTime<Local>,
}

/// One long-poll response: HTTP status plus body (parsed only on 200).
#[derive(Debug, Clone)]
pub struct PollResponse {
    pub status: u16,
    pub body: Value,
}

/// Wire seam for the event feed; [`CameraClient`] is the production
/// implementation, tests script responses.
pub trait EventSource {
    fn poll(&self) -> Result<PollResponse, ClientError>;
}

impl EventSource for CameraClient {
    fn poll(&self) -> Result<PollResponse, ClientError> {
        let (status, body) = self.long_poll_json(EVENT_POLL_PATH)?;
        Ok(PollResponse { status, body })
    }
}

/// Extract one [`Event`] per changed field. An empty or non-object body
/// yields no events.
pub fn events_from_body(body: &Value) -> Vec<Event> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };
    let observed_at = Local::now();
    map.keys()
        .map(|name| Event {
            name: name.clone(),
            observed_at,
        })
        .collect()
}

/// Poll the event feed until cancelled. Returns the total number of events
/// observed.
pub fn run<S: EventSource>(source: &S, cancel: &CancelToken) -> u64 {
    tracing::info!("starting event monitor — Ctrl-C to stop");
    let mut poll_number: u64 = 0;
    let mut observed: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        poll_number += 1;
        match source.poll() {
            Ok(response) if response.status == 200 => {
                for event in events_from_body(&response.body) {
                    observed += 1;
                    tracing::info!(poll = poll_number, event = %event.name, "state change");
                }
                // Empty body: the server-side timeout expired with nothing
                // to report. Loop straight back into the next poll.
            }
            Ok(response) => {
                tracing::warn!(status = response.status, "unexpected response code");
            }
            Err(ClientError::Http(err)) if err.is_timeout() => {
                tracing::warn!("poll timed out client-side — retrying");
            }
            Err(err) => {
                tracing::error!(error = %err, "connection lost to camera");
                tracing::info!(delay_secs = RETRY_DELAY.as_secs(), "waiting before retry");
                if cancel.wait(RETRY_DELAY) {
                    break;
                }
            }
        }
    }
    tracing::info!(events = observed, polls = poll_number, "event monitor stopped");
    observed
}
