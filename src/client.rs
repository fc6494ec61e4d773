//! HTTP transport to the camera's CCAPI control plane.
//!
//! Canon cameras expose CCAPI over HTTPS with a self-signed certificate, so
//! the client is built with certificate verification disabled. Two separate
//! clients are held because the protocol has two very different timing
//! profiles:
//!
//! - **Action/settings calls** complete in well under a second; a short
//!   timeout (5 s) turns a wedged camera into a failed cycle quickly.
//! - **Event polling** is a long poll: the camera holds the connection open
//!   for ~30 s and replies only when state changes or its own timeout
//!   expires. The client-side timeout (35 s) sits just past the server-side
//!   one so the camera, not the client, decides when to answer.
//!
//! Success for shutter actions is any of HTTP 200/201/202. The camera does
//! not document a semantic difference between them and the controller treats
//! them uniformly — see [`is_success_status`].

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Timeout for action and settings calls.
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side timeout for the event long poll. Must exceed the camera's
/// server-side hold (~30 s with `timeout=long`).
pub const POLL_TIMEOUT: Duration = Duration::from_secs(35);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {path}")]
    UnexpectedStatus { path: String, status: u16 },
}

/// True for the statuses the camera uses to acknowledge an action.
pub fn is_success_status(status: u16) -> bool {
    matches!(status, 200 | 201 | 202)
}

/// Blocking HTTPS client bound to one camera.
pub struct CameraClient {
    base: String,
    action: reqwest::blocking::Client,
    poll: reqwest::blocking::Client,
}

impl CameraClient {
    /// Build a client for `https://<host>:<port>`.
    pub fn new(host: &str, port: u16) -> Result<Self, ClientError> {
        let action = reqwest::blocking::Client::builder()
            .timeout(ACTION_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        let poll = reqwest::blocking::Client::builder()
            .timeout(POLL_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            base: format!("https://{host}:{port}"),
            action,
            poll,
        })
    }

    /// Base URL the client was built with, e.g. `https://192.168.12.98:443`.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// GET a CCAPI path and parse the body as JSON.
    ///
    /// Any non-success status is an error: the caller asked for a document
    /// and did not get one.
    pub fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(%url, "GET");
        let response = self.action.get(&url).send()?;
        let status = response.status().as_u16();
        if !is_success_status(status) {
            return Err(ClientError::UnexpectedStatus {
                path: path.to_string(),
                status,
            });
        }
        Ok(response.json()?)
    }

    /// POST a JSON payload to a CCAPI path and return the HTTP status.
    ///
    /// Rejections (4xx/5xx) are data, not transport errors: the shutter
    /// state machine decides what a non-success status means.
    pub fn post_json(&self, path: &str, payload: &Value) -> Result<u16, ClientError> {
        let url = format!("{}{}", self.base, path);
        let response = self.action.post(&url).json(payload).send()?;
        let status = response.status().as_u16();
        tracing::debug!(%url, %payload, status, "POST");
        if let Ok(body) = response.text() {
            let body = body.trim();
            if !body.is_empty() {
                tracing::debug!(body, "response");
            }
        }
        Ok(status)
    }

    /// One event long poll: GET with the extended timeout client.
    ///
    /// Returns the status plus the parsed body (only parsed on 200; the
    /// caller retries on anything else).
    pub fn long_poll_json(&self, path: &str) -> Result<(u16, Value), ClientError> {
        let url = format!("{}{}", self.base, path);
        let response = self.poll.get(&url).send()?;
        let status = response.status().as_u16();
        let body = if status == 200 {
            response.json()?
        } else {
            Value::Null
        };
        Ok((status, body))
    }

    /// Reachability probe: GET the CCAPI root with the short timeout.
    ///
    /// Logs the outcome and answers yes/no; used before entering a loop so
    /// an unplugged camera fails fast instead of on the first long poll.
    pub fn check_camera(&self) -> bool {
        match self.get_json("/ccapi/") {
            Ok(_) => {
                tracing::info!(base = %self.base, "camera is reachable");
                true
            }
            Err(ClientError::UnexpectedStatus { status, .. }) => {
                tracing::warn!(status, "camera responded with unexpected status");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, base = %self.base, "cannot connect to camera");
                false
            }
        }
    }
}
