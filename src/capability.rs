//! Capability discovery and shutter endpoint resolution.
//!
//! `GET /ccapi/` returns the camera's capability index: a JSON object mapping
//! each protocol version to the list of endpoints it supports, each entry
//! carrying a path and four method flags:
//!
//! ```text
//! {
//!   "ver100": [
//!     {"path": "/ccapi/ver100/shooting/control/shutterbutton",
//!      "get": false, "post": true, "put": false, "delete": false},
//!     ...
//!   ],
//!   "ver110": [...]
//! }
//! ```
//!
//! The index is built once per session and read-only afterwards. Malformed
//! entries (missing path, wrong shape) are skipped with a debug log rather
//! than failing discovery — cameras vary and one odd entry should not stop
//! a shoot.
//!
//! ## Endpoint preference
//!
//! Cameras expose both a plain `shutterbutton` endpoint and a
//! `shutterbutton/manual` variant. The manual variant gives separate
//! press/release control, which the actuator needs for long exposures, so
//! resolution prefers it whenever both are present — regardless of list
//! order. Only POST-capable endpoints qualify.

use crate::client::{CameraClient, ClientError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// HTTP methods a device endpoint can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// One endpoint from the capability index. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    /// Full CCAPI path, e.g. `/ccapi/ver100/shooting/control/shutterbutton`.
    pub path: String,
    /// Protocol version the endpoint was listed under, e.g. `ver100`.
    pub version: String,
    /// Methods the endpoint accepts, from the entry's boolean flags.
    pub methods: BTreeSet<Method>,
}

impl DeviceEndpoint {
    /// Explicit set membership test for "does this endpoint support X".
    pub fn supports(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }
}

/// Parsed capability index: version → ordered endpoint list.
///
/// Version groups and the endpoints within them keep the order they were
/// seen in the device response.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    versions: Vec<(String, Vec<DeviceEndpoint>)>,
}

impl CapabilityIndex {
    /// Build the index from the `GET /ccapi/` response body.
    pub fn from_value(root: &Value) -> Self {
        let mut versions = Vec::new();
        let Some(map) = root.as_object() else {
            tracing::debug!("capability root is not an object");
            return Self::default();
        };
        for (version, entries) in map {
            let Some(list) = entries.as_array() else {
                tracing::debug!(%version, "capability entry is not a list — skipping");
                continue;
            };
            let endpoints: Vec<DeviceEndpoint> = list
                .iter()
                .filter_map(|entry| parse_endpoint(version, entry))
                .collect();
            versions.push((version.clone(), endpoints));
        }
        Self { versions }
    }

    /// All endpoints across all versions, in first-seen scan order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceEndpoint> {
        self.versions.iter().flat_map(|(_, list)| list.iter())
    }

    /// Number of protocol versions the camera advertises.
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

/// Wire shape of one index entry. Unknown fields are tolerated; missing
/// method flags default to unsupported.
#[derive(Debug, Deserialize)]
struct RawEndpoint {
    path: String,
    #[serde(default)]
    get: bool,
    #[serde(default)]
    post: bool,
    #[serde(default)]
    put: bool,
    #[serde(default)]
    delete: bool,
}

fn parse_endpoint(version: &str, entry: &Value) -> Option<DeviceEndpoint> {
    let raw: RawEndpoint = match serde_json::from_value(entry.clone()) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(version, error = %err, "skipping malformed endpoint entry");
            return None;
        }
    };
    let mut methods = BTreeSet::new();
    for (supported, method) in [
        (raw.get, Method::Get),
        (raw.post, Method::Post),
        (raw.put, Method::Put),
        (raw.delete, Method::Delete),
    ] {
        if supported {
            methods.insert(method);
        }
    }
    Some(DeviceEndpoint {
        path: raw.path,
        version: version.to_string(),
        methods,
    })
}

/// Fetch `GET /ccapi/` and build the capability index.
///
/// Failure here is fatal to startup: without the index there is no shutter
/// endpoint to drive.
pub fn discover(client: &CameraClient) -> Result<CapabilityIndex, ClientError> {
    tracing::info!(base = %client.base_url(), "connecting to camera API");
    let root = client.get_json("/ccapi/")?;
    let index = CapabilityIndex::from_value(&root);
    tracing::debug!(versions = index.version_count(), "capability index built");
    Ok(index)
}

/// Select the best shutter-actuation endpoint.
///
/// Scans every version's list for POST-capable paths containing
/// `shutterbutton`; a `manual` variant wins over a plain one, otherwise the
/// first plain match in scan order is used. `None` means the camera offers
/// no usable shutter control (wrong mode, e.g. playback) and startup must
/// abort.
pub fn resolve_shutter_endpoint(index: &CapabilityIndex) -> Option<&DeviceEndpoint> {
    let mut manual = None;
    let mut plain = None;
    for endpoint in index.iter() {
        if !endpoint.path.contains("shutterbutton") || !endpoint.supports(Method::Post) {
            continue;
        }
        if endpoint.path.contains("manual") {
            if manual.is_none() {
                manual = Some(endpoint);
            }
        } else if plain.is_none() {
            plain = Some(endpoint);
        }
    }
    manual.or(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(path: &str, post: bool) -> Value {
        json!({"path": path, "get": false, "post": post, "put": false, "delete": false})
    }

    // =========================================================================
    // Index parsing
    // =========================================================================

    #[test]
    fn parses_versions_and_method_flags() {
        let root = json!({
            "ver100": [
                {"path": "/ccapi/ver100/shooting/settings",
                 "get": true, "post": false, "put": true, "delete": false},
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        let endpoint = index.iter().next().unwrap();
        assert_eq!(endpoint.path, "/ccapi/ver100/shooting/settings");
        assert_eq!(endpoint.version, "ver100");
        assert!(endpoint.supports(Method::Get));
        assert!(endpoint.supports(Method::Put));
        assert!(!endpoint.supports(Method::Post));
        assert!(!endpoint.supports(Method::Delete));
    }

    #[test]
    fn missing_method_flags_default_to_unsupported() {
        let root = json!({"ver100": [{"path": "/ccapi/ver100/x"}]});
        let index = CapabilityIndex::from_value(&root);
        let endpoint = index.iter().next().unwrap();
        assert!(endpoint.methods.is_empty());
    }

    #[test]
    fn skips_entries_without_path() {
        let root = json!({
            "ver100": [
                {"get": true},
                entry("/ccapi/ver100/ok", true),
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        assert_eq!(index.iter().count(), 1);
    }

    #[test]
    fn skips_non_list_version_entries() {
        let root = json!({
            "ver100": "not a list",
            "ver110": [entry("/ccapi/ver110/ok", true)],
        });
        let index = CapabilityIndex::from_value(&root);
        assert_eq!(index.iter().count(), 1);
    }

    #[test]
    fn non_object_root_yields_empty_index() {
        let index = CapabilityIndex::from_value(&json!([1, 2, 3]));
        assert_eq!(index.iter().count(), 0);
    }

    // =========================================================================
    // Shutter endpoint resolution
    // =========================================================================

    #[test]
    fn prefers_manual_over_plain_when_manual_listed_first() {
        let root = json!({
            "ver100": [
                entry("/ccapi/ver100/shooting/control/shutterbutton/manual", true),
                entry("/ccapi/ver100/shooting/control/shutterbutton", true),
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        let resolved = resolve_shutter_endpoint(&index).unwrap();
        assert!(resolved.path.ends_with("manual"));
    }

    #[test]
    fn prefers_manual_over_plain_when_plain_listed_first() {
        let root = json!({
            "ver100": [
                entry("/ccapi/ver100/shooting/control/shutterbutton", true),
                entry("/ccapi/ver100/shooting/control/shutterbutton/manual", true),
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        let resolved = resolve_shutter_endpoint(&index).unwrap();
        assert!(resolved.path.ends_with("manual"));
    }

    #[test]
    fn falls_back_to_first_plain_match_in_scan_order() {
        let root = json!({
            "ver100": [
                entry("/ccapi/ver100/shooting/control/shutterbutton", true),
            ],
            "ver110": [
                entry("/ccapi/ver110/shooting/control/shutterbutton", true),
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        let resolved = resolve_shutter_endpoint(&index).unwrap();
        assert_eq!(resolved.version, "ver100");
    }

    #[test]
    fn ignores_shutter_endpoints_without_post() {
        let root = json!({
            "ver100": [
                entry("/ccapi/ver100/shooting/control/shutterbutton", false),
            ],
        });
        let index = CapabilityIndex::from_value(&root);
        assert!(resolve_shutter_endpoint(&index).is_none());
    }

    #[test]
    fn unresolved_when_no_shutter_endpoint_exists() {
        let root = json!({
            "ver100": [entry("/ccapi/ver100/shooting/settings", false)],
        });
        let index = CapabilityIndex::from_value(&root);
        assert!(resolve_shutter_endpoint(&index).is_none());
    }

    #[test]
    fn manual_variant_found_across_versions() {
        let root = json!({
            "ver100": [entry("/ccapi/ver100/shooting/control/shutterbutton", true)],
            "ver110": [entry("/ccapi/ver110/shooting/control/shutterbutton/manual", true)],
        });
        let index = CapabilityIndex::from_value(&root);
        let resolved = resolve_shutter_endpoint(&index).unwrap();
        assert!(resolved.path.contains("manual"));
    }
}
