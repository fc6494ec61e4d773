//! Shutter actuation state machine.
//!
//! A CCAPI exposure is a press/release pair against the resolved shutter
//! endpoint. The failure mode that makes this interesting is a *stuck*
//! shutter: the press landed, the release didn't, and the button is now
//! physically engaged on the camera. The actuator models this explicitly:
//!
//! ```text
//!          press ok            release ok
//!   Idle ───────────▶ Pressed ───────────▶ Idle
//!    ▲                   │ release failed
//!    │ variant accepted  ▼
//!    └─────────── Recovering ──▶ Stuck   (all variants rejected)
//! ```
//!
//! Recovery walks an ordered list of release payload shapes and stops at the
//! first the camera accepts. `Stuck` is not fatal to the process: the
//! scheduler keeps going, and every later cycle retries recovery before
//! pressing again.
//!
//! Exactly one actuator exists per session and it exclusively owns the
//! state; the machine is not reentrant.

use crate::client::{is_success_status, CameraClient, ClientError};
use serde_json::{json, Value};
use std::time::Duration;

/// Pause between a successful press and the release attempt, so the camera
/// registers the press before being asked to let go.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Shutter button state. One instance per session, owned by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterState {
    Idle,
    Pressed,
    Recovering,
    Stuck,
}

/// Release payload shapes, tried in order during recovery. The first is the
/// documented form; the rest cover firmware variations seen in the field.
fn recovery_payloads() -> [Value; 4] {
    [
        json!({"af": false, "action": "release"}),
        json!({"action": "release"}),
        json!({"press": "release"}),
        json!({"button": "release"}),
    ]
}

/// Wire seam for shutter actions.
///
/// The production implementation is [`CameraClient`]; tests script a fake
/// that records payloads and answers from a queue.
pub trait ShutterTransport {
    /// POST an action payload to the shutter path, returning the HTTP status.
    fn post_shutter(&self, path: &str, payload: &Value) -> Result<u16, ClientError>;

    /// Settle pause between press and release. Fakes override to a no-op.
    fn settle(&self) {
        std::thread::sleep(SETTLE_DELAY);
    }
}

impl ShutterTransport for CameraClient {
    fn post_shutter(&self, path: &str, payload: &Value) -> Result<u16, ClientError> {
        self.post_json(path, payload)
    }
}

/// Press/release state machine bound to one resolved endpoint.
pub struct ShutterActuator<'a, T: ShutterTransport> {
    transport: &'a T,
    path: String,
    state: ShutterState,
}

impl<'a, T: ShutterTransport> ShutterActuator<'a, T> {
    pub fn new(transport: &'a T, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            state: ShutterState::Idle,
        }
    }

    pub fn state(&self) -> ShutterState {
        self.state
    }

    /// POST one payload; network errors and rejections both count as "not
    /// accepted" and are logged with enough context to diagnose.
    fn post(&self, payload: &Value) -> bool {
        match self.transport.post_shutter(&self.path, payload) {
            Ok(status) if is_success_status(status) => true,
            Ok(status) => {
                tracing::warn!(path = %self.path, %payload, status, "shutter action rejected");
                false
            }
            Err(err) => {
                tracing::warn!(path = %self.path, %payload, error = %err, "shutter action failed");
                false
            }
        }
    }

    /// Press the shutter. On a failed first attempt, retries once with the
    /// opposite autofocus flag before giving up; a failed press leaves the
    /// state `Idle`.
    pub fn press(&mut self, af: bool) -> bool {
        if self.post(&json!({"af": af, "action": "full_press"})) {
            self.state = ShutterState::Pressed;
            return true;
        }
        tracing::warn!(af = !af, "press failed — retrying with opposite autofocus flag");
        if self.post(&json!({"af": !af, "action": "full_press"})) {
            self.state = ShutterState::Pressed;
            return true;
        }
        false
    }

    /// Release a pressed shutter. Failure means the button is still engaged,
    /// so the state moves to `Recovering`.
    pub fn release(&mut self) -> bool {
        if self.post(&json!({"af": false, "action": "release"})) {
            self.state = ShutterState::Idle;
            true
        } else {
            self.state = ShutterState::Recovering;
            false
        }
    }

    /// Try every release payload variant in order, stopping at the first the
    /// camera accepts. All rejected → `Stuck` (non-fatal; the next cycle
    /// retries).
    pub fn recover(&mut self) -> bool {
        tracing::warn!("attempting to release stuck shutter");
        self.state = ShutterState::Recovering;
        for payload in recovery_payloads() {
            if self.post(&payload) {
                tracing::warn!("shutter released");
                self.state = ShutterState::Idle;
                return true;
            }
        }
        tracing::error!("could not release shutter — camera may need a manual reset");
        self.state = ShutterState::Stuck;
        false
    }

    /// One full exposure cycle. Returns true only when press and release
    /// both succeeded on the nominal path.
    ///
    /// A cycle that ends in recovery still reports the shot as failed, even
    /// when recovery unstuck the button — the frame cannot be trusted.
    /// At most one press is ever outstanding: a non-`Idle` entry state
    /// (prior `Stuck` or `Recovering`) runs recovery first and skips the
    /// press if the shutter stays stuck.
    pub fn take_shot(&mut self, af: bool) -> bool {
        if self.state != ShutterState::Idle && !self.recover() {
            return false;
        }
        if !self.press(af) {
            tracing::error!("shutter press failed");
            return false;
        }
        self.transport.settle();
        if self.release() {
            tracing::debug!("shot completed");
            return true;
        }
        tracing::warn!("press succeeded but release failed — attempting recovery");
        self.recover();
        false
    }
}
