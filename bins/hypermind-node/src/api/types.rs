//! JSON payloads served to dashboard clients.

use serde::Serialize;

use hypermind_gossip::{DiagnosticsSnapshot, Location};

/// The dashboard state object, pushed over `/events` and served once from
/// `/api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Live peers as this node sees them, itself included.
    pub count: usize,
    /// Open direct connections.
    pub direct: usize,
    /// This node's identifier.
    pub id: String,
    /// Last completed diagnostics window.
    pub diagnostics: DiagnosticsSnapshot,
    /// Known peer coordinates (opt-in only).
    pub locations: Vec<Location>,
    #[serde(rename = "optedIn")]
    pub opted_in: bool,
}

/// Answer to `POST /api/location-optin`.
#[derive(Debug, Serialize)]
pub struct OptInResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(rename = "hasLocation")]
    pub has_location: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_dashboard_field_names() {
        let snap = StatsSnapshot {
            count: 3,
            direct: 1,
            id: "ab".repeat(32),
            diagnostics: DiagnosticsSnapshot::default(),
            locations: vec![],
            opted_in: false,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["direct"], 1);
        assert_eq!(json["optedIn"], false);
        assert!(json.get("diagnostics").is_some());
        assert!(json.get("locations").is_some());
    }

    #[test]
    fn optin_response_omits_missing_location() {
        let json = serde_json::to_value(OptInResponse {
            success: true,
            location: None,
            has_location: false,
        })
        .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["hasLocation"], false);
        assert!(json.get("location").is_none());
    }
}
