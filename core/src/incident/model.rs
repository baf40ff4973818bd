use crate::audit::entry::Actor;
use crate::incident::catalog::{TeamKey, ZoneProfile};
use crate::notify::model::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Alert produced by an upstream detector; the input to `create_incident`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertTrigger {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub location: String,
    pub message: String,
}

impl AlertTrigger {
    pub fn new(
        alert_type: impl Into<String>,
        severity: impl Into<Severity>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity: severity.into(),
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Open-ended incident status. Only `resolved` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IncidentStatus {
    Active,
    Resolved,
    Other(String),
}

impl IncidentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            IncidentStatus::Active => "active",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }
}

impl From<String> for IncidentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => IncidentStatus::Active,
            "resolved" => IncidentStatus::Resolved,
            _ => IncidentStatus::Other(s),
        }
    }
}

impl From<&str> for IncidentStatus {
    fn from(s: &str) -> Self {
        IncidentStatus::from(s.to_string())
    }
}

impl From<IncidentStatus> for String {
    fn from(s: IncidentStatus) -> Self {
        match s {
            IncidentStatus::Other(v) => v,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: String,
    pub action: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub actor: Actor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Dispatched,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamAssignment {
    pub team_key: TeamKey,
    pub team_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
    pub status: AssignmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub eta: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Deployed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDeployment {
    pub resource_type: String,
    pub quantity: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub deployed_at: OffsetDateTime,
    pub status: DeploymentStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvacuationStatus {
    Evacuating,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneEvacuation {
    pub zone_key: String,
    pub name: String,
    pub population: u64,
    pub shelters: Vec<String>,
    pub routes: Vec<String>,
    pub evacuation_minutes: i64,
    pub status: EvacuationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub estimated_completion: OffsetDateTime,
}

impl ZoneEvacuation {
    pub fn start(zone: &ZoneProfile, now: OffsetDateTime) -> Self {
        Self {
            zone_key: zone.key.to_string(),
            name: zone.name.to_string(),
            population: zone.population,
            shelters: zone.shelters.iter().map(|s| s.to_string()).collect(),
            routes: zone.routes.iter().map(|s| s.to_string()).collect(),
            evacuation_minutes: zone.evacuation_minutes,
            status: EvacuationStatus::Evacuating,
            start_time: now,
            estimated_completion: now + time::Duration::minutes(zone.evacuation_minutes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvacuationRecord {
    pub id: String,
    pub incident_id: String,
    pub zones: Vec<ZoneEvacuation>,
    pub status: EvacuationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub initiated_at: OffsetDateTime,
    pub total_population: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: String,
    pub incident_type: String,
    pub severity: Severity,
    pub location: String,
    pub description: String,
    pub status: IncidentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: Actor,
    pub timeline: Vec<TimelineEntry>,
    pub assigned_teams: Vec<TeamAssignment>,
    pub resources: Vec<ResourceDeployment>,
    pub evacuation: Option<EvacuationRecord>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

impl Incident {
    pub fn resolution_minutes(&self) -> Option<i64> {
        self.resolved_at
            .map(|r| ((r - self.created_at).as_seconds_f64() / 60.0).round() as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedIncident {
    pub incident: Incident,
    #[serde(with = "time::serde::rfc3339")]
    pub resolved_at: OffsetDateTime,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Updated(Incident),
    Resolved(ResolvedIncident),
}

impl StatusChange {
    pub fn incident(&self) -> &Incident {
        match self {
            StatusChange::Updated(i) => i,
            StatusChange::Resolved(r) => &r.incident,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentStatistics {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    pub by_type: BTreeMap<String, usize>,
    pub average_resolution_minutes: i64,
    pub most_common_location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_custom_values() {
        let s: IncidentStatus = serde_json::from_str("\"contained\"").unwrap();
        assert_eq!(s, IncidentStatus::Other("contained".to_string()));
        assert!(!s.is_terminal());
        assert!(IncidentStatus::from("resolved").is_terminal());
    }

    #[test]
    fn trigger_uses_type_key() {
        let t: AlertTrigger = serde_json::from_value(serde_json::json!({
            "type": "tsunami",
            "severity": "critical",
            "location": "Harbor Bay",
            "message": "Wave detected"
        }))
        .unwrap();
        assert_eq!(t.alert_type, "tsunami");
        assert_eq!(t.severity, Severity::Critical);
    }
}
