use crate::audit::entry::{Actor, LogCategory, LogLevel};
use crate::audit::log::{lock, AuditLog};
use crate::clock::{rfc3339, Clock};
use crate::determinism::ids;
use crate::error::{CoreError, CoreResult};
use crate::incident::catalog::{teams_for_incident_type, zone, TeamKey};
use crate::incident::model::{
    AlertTrigger, AssignmentStatus, DeploymentStatus, EvacuationRecord, EvacuationStatus,
    Incident, IncidentStatus, ResolvedIncident, ResourceDeployment, StatusChange, TeamAssignment,
    TimelineEntry, ZoneEvacuation,
};
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::model::{Dispatch, Severity};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use time::{Duration, OffsetDateTime};

const SEQUENCE_MODULUS: u32 = 1_000_000;

#[derive(Default)]
pub(crate) struct IncidentStore {
    pub(crate) active: Vec<Incident>,
    pub(crate) history: Vec<ResolvedIncident>,
    next_sequence: u32,
}

impl IncidentStore {
    fn contains(&self, id: &str) -> bool {
        self.active.iter().any(|i| i.id == id) || self.history.iter().any(|r| r.incident.id == id)
    }

    /// Next free `INC_<year>_<seq>` id. Wraps at one million and skips ids
    /// still held by an active or resolved incident.
    fn allocate_id(&mut self, year: i32) -> CoreResult<String> {
        for _ in 0..SEQUENCE_MODULUS {
            self.next_sequence = if self.next_sequence + 1 >= SEQUENCE_MODULUS {
                1
            } else {
                self.next_sequence + 1
            };
            let id = ids::incident_id(year, self.next_sequence);
            if !self.contains(&id) {
                return Ok(id);
            }
        }
        Err(CoreError::InvalidInput(format!(
            "incident id space for {} is exhausted",
            year
        )))
    }

    fn active_mut(&mut self, id: &str) -> CoreResult<&mut Incident> {
        self.active
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CoreError::IncidentNotFound(id.to_string()))
    }
}

fn push_timeline(
    incident: &mut Incident,
    action: &str,
    description: String,
    actor: &Actor,
    at: OffsetDateTime,
) {
    incident.timeline.push(TimelineEntry {
        id: ids::timeline_entry_id(),
        action: action.to_string(),
        description,
        timestamp: at,
        actor: actor.clone(),
    });
}

/// Owns active incidents and the resolved history.
///
/// Every mutation happens under one store lock, so the `resolved` move into
/// history happens exactly once. The lock is never held across an await.
pub struct IncidentOrchestrator {
    audit: Arc<AuditLog>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    store: Mutex<IncidentStore>,
}

impl IncidentOrchestrator {
    pub fn new(
        audit: Arc<AuditLog>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            audit,
            dispatcher,
            clock,
            store: Mutex::new(IncidentStore::default()),
        }
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn store(&self) -> std::sync::MutexGuard<'_, IncidentStore> {
        lock(&self.store)
    }

    fn audit_incident(&self, action: &str, payload: Value, actor: &Actor) {
        self.audit
            .log(LogLevel::Info, LogCategory::Incident, action, payload, actor);
    }

    /// Opens an incident from `trigger` and dispatches the teams its type calls
    /// for. `severity` overrides the trigger's own severity.
    pub fn create_incident(
        &self,
        trigger: &AlertTrigger,
        severity: Option<Severity>,
    ) -> CoreResult<Incident> {
        if trigger.alert_type.trim().is_empty() {
            return Err(CoreError::InvalidInput("incident type is empty".to_string()));
        }
        let now = self.clock.now();
        let actor = Actor::System;
        let severity = severity.unwrap_or_else(|| trigger.severity.clone());

        let id = {
            let mut store = lock(&self.store);
            let id = store.allocate_id(now.year())?;
            let mut incident = Incident {
                id: id.clone(),
                incident_type: trigger.alert_type.clone(),
                severity: severity.clone(),
                location: trigger.location.clone(),
                description: trigger.message.clone(),
                status: IncidentStatus::Active,
                created_at: now,
                created_by: actor.clone(),
                timeline: Vec::new(),
                assigned_teams: Vec::new(),
                resources: Vec::new(),
                evacuation: None,
                resolved_at: None,
            };
            push_timeline(
                &mut incident,
                "incident_created",
                "Incident automatically created from sensor alert".to_string(),
                &actor,
                now,
            );
            store.active.push(incident);
            id
        };

        tracing::info!(incident_id = %id, incident_type = %trigger.alert_type, "incident created");
        self.audit_incident(
            "incident_created",
            json!({
                "incidentId": id,
                "type": trigger.alert_type,
                "severity": severity,
                "location": trigger.location,
            }),
            &actor,
        );

        for team in teams_for_incident_type(&trigger.alert_type) {
            self.assign_known_team(&id, team, &actor)?;
        }
        self.get_incident(&id)
    }

    pub fn assign_team(
        &self,
        incident_id: &str,
        team_key: &str,
        actor: &Actor,
    ) -> CoreResult<TeamAssignment> {
        if !lock(&self.store).active.iter().any(|i| i.id == incident_id) {
            tracing::debug!(incident_id, "assign_team on unknown incident");
            return Err(CoreError::IncidentNotFound(incident_id.to_string()));
        }
        let team: TeamKey = team_key.parse().map_err(|e| {
            tracing::debug!(incident_id, team_key, "assign_team with unknown team");
            e
        })?;
        self.assign_known_team(incident_id, team, actor)
    }

    fn assign_known_team(
        &self,
        incident_id: &str,
        team: TeamKey,
        actor: &Actor,
    ) -> CoreResult<TeamAssignment> {
        let now = self.clock.now();
        let profile = team.profile();
        let assignment = TeamAssignment {
            team_key: team,
            team_name: profile.name.to_string(),
            assigned_at: now,
            status: AssignmentStatus::Dispatched,
            eta: now + Duration::minutes(profile.response_minutes),
        };
        {
            let mut store = lock(&self.store);
            let incident = store.active_mut(incident_id)?;
            incident.assigned_teams.push(assignment.clone());
            push_timeline(
                incident,
                "team_assigned",
                format!("{} dispatched to incident", profile.name),
                actor,
                now,
            );
        }
        self.audit_incident(
            "team_assigned",
            json!({ "incidentId": incident_id, "team": team, "eta": rfc3339(assignment.eta) }),
            actor,
        );
        Ok(assignment)
    }

    /// Records a status change. A move to `resolved` stamps the resolution
    /// time and transfers the incident into history.
    pub fn update_incident_status(
        &self,
        incident_id: &str,
        new_status: impl Into<IncidentStatus>,
        notes: &str,
        actor: &Actor,
    ) -> CoreResult<StatusChange> {
        let new_status = new_status.into();
        let now = self.clock.now();

        let (old_status, change) = {
            let mut store = lock(&self.store);
            let incident = store.active_mut(incident_id)?;
            let old_status = incident.status.clone();
            incident.status = new_status.clone();
            let description = format!(
                "Status changed from {} to {}. {}",
                old_status, new_status, notes
            );
            push_timeline(
                incident,
                "status_change",
                description.trim_end().to_string(),
                actor,
                now,
            );

            if new_status.is_terminal() {
                incident.resolved_at = Some(now);
                push_timeline(
                    incident,
                    "incident_resolved",
                    "Incident officially resolved".to_string(),
                    actor,
                    now,
                );
                let pos = store
                    .active
                    .iter()
                    .position(|i| i.id == incident_id)
                    .ok_or_else(|| CoreError::IncidentNotFound(incident_id.to_string()))?;
                let incident = store.active.remove(pos);
                let resolved = ResolvedIncident {
                    duration_ms: (now - incident.created_at).whole_milliseconds() as i64,
                    resolved_at: now,
                    incident,
                };
                store.history.push(resolved.clone());
                (old_status, StatusChange::Resolved(resolved))
            } else {
                (old_status, StatusChange::Updated(incident.clone()))
            }
        };

        self.audit_incident(
            "status_change",
            json!({
                "incidentId": incident_id,
                "from": old_status,
                "to": new_status,
                "notes": notes,
            }),
            actor,
        );
        if let StatusChange::Resolved(r) = &change {
            tracing::info!(incident_id, duration_ms = r.duration_ms, "incident resolved");
            self.audit_incident(
                "incident_resolved",
                json!({ "incidentId": incident_id, "durationMs": r.duration_ms }),
                actor,
            );
        }
        Ok(change)
    }

    /// Orders evacuation of the named zones. Unknown zone keys are skipped.
    pub fn initiate_evacuation(
        &self,
        incident_id: &str,
        zone_keys: &[&str],
        actor: &Actor,
    ) -> CoreResult<EvacuationRecord> {
        let now = self.clock.now();
        let zones: Vec<ZoneEvacuation> = zone_keys
            .iter()
            .filter_map(|key| match zone(key) {
                Some(z) => Some(ZoneEvacuation::start(z, now)),
                None => {
                    tracing::debug!(incident_id, zone = %key, "skipping unknown evacuation zone");
                    None
                }
            })
            .collect();
        let record = EvacuationRecord {
            id: ids::evacuation_id(),
            incident_id: incident_id.to_string(),
            total_population: zones.iter().map(|z| z.population).sum(),
            zones,
            status: EvacuationStatus::Active,
            initiated_at: now,
        };
        let zone_list = record
            .zones
            .iter()
            .map(|z| z.zone_key.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        {
            let mut store = lock(&self.store);
            let incident = store.active_mut(incident_id)?;
            incident.evacuation = Some(record.clone());
            push_timeline(
                incident,
                "evacuation_initiated",
                format!("Evacuation ordered for zones: {}", zone_list),
                actor,
                now,
            );
        }

        tracing::info!(incident_id, population = record.total_population, "evacuation initiated");
        self.audit_incident(
            "evacuation_initiated",
            json!({
                "incidentId": incident_id,
                "evacuationId": record.id,
                "zones": record.zones.iter().map(|z| &z.zone_key).collect::<Vec<_>>(),
                "totalPopulation": record.total_population,
            }),
            actor,
        );
        Ok(record)
    }

    pub fn deploy_resource(
        &self,
        incident_id: &str,
        resource_type: &str,
        quantity: u32,
        notes: &str,
        actor: &Actor,
    ) -> CoreResult<ResourceDeployment> {
        if quantity == 0 {
            return Err(CoreError::InvalidInput(
                "resource quantity must be at least 1".to_string(),
            ));
        }
        let now = self.clock.now();
        let deployment = ResourceDeployment {
            resource_type: resource_type.to_string(),
            quantity,
            deployed_at: now,
            status: DeploymentStatus::Deployed,
            notes: notes.to_string(),
        };
        {
            let mut store = lock(&self.store);
            let incident = store.active_mut(incident_id)?;
            incident.resources.push(deployment.clone());
            let description = format!("Deployed {} {}. {}", quantity, resource_type, notes);
            push_timeline(
                incident,
                "resource_deployed",
                description.trim_end().to_string(),
                actor,
                now,
            );
        }
        self.audit_incident(
            "resource_deployed",
            json!({
                "incidentId": incident_id,
                "resourceType": resource_type,
                "quantity": quantity,
            }),
            actor,
        );
        Ok(deployment)
    }

    /// Sends an emergency alert for an active incident and notes the alert id
    /// on its timeline.
    pub async fn broadcast(
        &self,
        incident_id: &str,
        custom_message: Option<&str>,
        actor: &Actor,
    ) -> CoreResult<Dispatch> {
        let (alert_type, severity, location) = {
            let mut store = lock(&self.store);
            let incident = store.active_mut(incident_id)?;
            (
                incident.incident_type.clone(),
                incident.severity.clone(),
                incident.location.clone(),
            )
        };

        let dispatch = self
            .dispatcher
            .send_emergency_alert(&alert_type, severity, &location, custom_message)
            .await?;

        let now = self.clock.now();
        let failed = dispatch.results.failed_channels();
        {
            let mut store = lock(&self.store);
            match store.active_mut(incident_id) {
                Ok(incident) => push_timeline(
                    incident,
                    "alert_broadcast",
                    format!("Emergency alert {} broadcast", dispatch.alert_id),
                    actor,
                    now,
                ),
                // Resolved while the alert was in flight; history is immutable.
                Err(_) => tracing::debug!(incident_id, "incident left the active set during broadcast"),
            }
        }
        self.audit_incident(
            "alert_broadcast",
            json!({
                "incidentId": incident_id,
                "alertId": dispatch.alert_id,
                "failedChannels": failed,
            }),
            actor,
        );
        Ok(dispatch)
    }

    /// Active incident by id.
    pub fn get_incident(&self, incident_id: &str) -> CoreResult<Incident> {
        lock(&self.store)
            .active
            .iter()
            .find(|i| i.id == incident_id)
            .cloned()
            .ok_or_else(|| CoreError::IncidentNotFound(incident_id.to_string()))
    }

    pub fn find_resolved(&self, incident_id: &str) -> Option<ResolvedIncident> {
        lock(&self.store)
            .history
            .iter()
            .find(|r| r.incident.id == incident_id)
            .cloned()
    }

    pub fn active_incidents(&self) -> Vec<Incident> {
        lock(&self.store).active.clone()
    }

    pub fn incident_history(&self) -> Vec<ResolvedIncident> {
        lock(&self.store).history.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_wraps_and_skips_taken_ids() {
        let mut store = IncidentStore {
            next_sequence: SEQUENCE_MODULUS - 2,
            ..IncidentStore::default()
        };
        assert_eq!(store.allocate_id(2026).unwrap(), "INC_2026_999999");
        assert_eq!(store.allocate_id(2026).unwrap(), "INC_2026_000001");
    }
}
