//! Exposure settings: shutter-speed reading and interval validation.
//!
//! Before scheduling begins the controller reads the camera's current
//! shooting settings and checks that the requested shot interval actually
//! leaves room for each exposure. A 30-second exposure with a 10-second
//! interval would pile presses on top of each other; catching that before
//! the first shot is cheaper than diagnosing a night of failed frames.
//!
//! ## Value forms
//!
//! The `tv` (time value) field comes back in several shapes depending on
//! model and mode:
//!
//! - `"1/60"` — fractional seconds
//! - `"2"` — whole seconds as a string
//! - `2` — a native JSON number
//!
//! Anything else parses to "unknown". An unknown shutter speed is *not*
//! fatal: some bodies simply do not expose the field, so validation degrades
//! to pass-with-warning rather than refusing to shoot.

use crate::capability::{CapabilityIndex, Method};
use crate::client::CameraClient;
use serde_json::Value;

/// Fallback settings path for cameras whose index omits the settings
/// endpoint. Reading settings is advisory, so a wrong guess only costs the
/// validation warning.
const DEFAULT_SETTINGS_PATH: &str = "/ccapi/ver100/shooting/settings";

/// Current exposure setting as reported by the camera.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureSetting {
    /// Device-reported value, verbatim. Empty when the field was absent.
    pub raw: String,
    /// Parsed exposure duration in seconds. `None` when absent or
    /// unparseable — derived, never authoritative.
    pub seconds: Option<f64>,
}

impl ExposureSetting {
    /// Parse a `tv` value in any of its shapes.
    pub fn from_tv_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self {
                raw: s.clone(),
                seconds: parse_seconds(s),
            },
            Value::Number(n) => Self {
                raw: n.to_string(),
                seconds: n.as_f64(),
            },
            other => {
                tracing::warn!(value = %other, "unexpected shutter speed shape");
                Self {
                    raw: other.to_string(),
                    seconds: None,
                }
            }
        }
    }
}

/// Parse a shutter-speed string into seconds.
///
/// `"1/60"` → `1/60`; `"2"` → `2.0`; anything unparseable → `None`.
fn parse_seconds(raw: &str) -> Option<f64> {
    if let Some((numerator, denominator)) = raw.split_once('/') {
        let n: f64 = numerator.trim().parse().ok()?;
        let d: f64 = denominator.trim().parse().ok()?;
        if d == 0.0 {
            return None;
        }
        return Some(n / d);
    }
    raw.trim().parse().ok()
}

/// Locate the shooting-settings path from the capability index, falling back
/// to the ver100 path when the camera does not list one.
fn settings_path(index: &CapabilityIndex) -> String {
    index
        .iter()
        .find(|e| e.path.ends_with("shooting/settings") && e.supports(Method::Get))
        .map(|e| e.path.clone())
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string())
}

/// Fetch the camera's shooting settings and extract the shutter speed.
///
/// Every failure mode (unreachable, malformed response, missing field)
/// collapses to an empty [`ExposureSetting`] with a warning — the field is
/// advisory and validation handles its absence.
pub fn read_exposure(client: &CameraClient, index: &CapabilityIndex) -> ExposureSetting {
    let path = settings_path(index);
    let settings = match client.get_json(&path) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, %path, "could not fetch camera settings");
            return ExposureSetting::default();
        }
    };
    match settings.get("tv").and_then(|tv| tv.get("value")) {
        Some(value) => {
            let setting = ExposureSetting::from_tv_value(value);
            tracing::info!(shutter_speed = %setting.raw, "camera shutter speed");
            setting
        }
        None => {
            tracing::warn!("could not find shutter speed in camera settings");
            ExposureSetting::default()
        }
    }
}

/// Check that the shot interval strictly exceeds the exposure duration.
///
/// Passes unconditionally when the exposure is unknown. Failure is fatal to
/// the session: the scheduler must not start.
pub fn validate_interval(interval_seconds: f64, exposure: &ExposureSetting) -> bool {
    let Some(exposure_seconds) = exposure.seconds else {
        tracing::warn!("could not determine camera shutter speed — skipping interval validation");
        return true;
    };
    if interval_seconds > exposure_seconds {
        tracing::info!(
            interval = interval_seconds,
            exposure = exposure_seconds,
            "interval validation passed"
        );
        true
    } else {
        tracing::error!(
            interval = interval_seconds,
            exposure = exposure_seconds,
            "interval must be longer than the exposure"
        );
        false
    }
}
