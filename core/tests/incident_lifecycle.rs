mod common;

use coastal_core::audit::entry::{Actor, LogCategory};
use coastal_core::audit::report::LogFilter;
use coastal_core::error::{CoreError, Lenient};
use coastal_core::export::ExportFormat;
use coastal_core::incident::catalog::TeamKey;
use coastal_core::incident::model::{AlertTrigger, IncidentStatus, StatusChange};
use coastal_core::notify::model::Severity;
use coastal_core::transport::DeliveryChannel;
use common::{fixture, t0};
use regex::Regex;
use time::Duration;

fn dumping() -> AlertTrigger {
    AlertTrigger::new(
        "Illegal Dumping Detected",
        "warning",
        "North Pier",
        "Oil sheen near outfall",
    )
}

fn tsunami() -> AlertTrigger {
    AlertTrigger::new("tsunami", "critical", "Harbor Bay", "Wave height rising")
}

#[tokio::test]
async fn created_incident_is_active_and_staffed() {
    let f = fixture();
    let incident = f.pipeline.incidents.create_incident(&dumping(), None).unwrap();

    let id_format = Regex::new(r"^INC_2026_\d{6}$").unwrap();
    assert!(id_format.is_match(&incident.id), "bad id {}", incident.id);
    assert_eq!(incident.status, IncidentStatus::Active);
    assert_eq!(incident.severity, Severity::Warning);
    assert_eq!(incident.created_by, Actor::System);
    assert_eq!(incident.created_at, t0());

    let teams: Vec<TeamKey> = incident.assigned_teams.iter().map(|t| t.team_key).collect();
    assert_eq!(teams, vec![TeamKey::Hazmat, TeamKey::Medical]);
    assert_eq!(incident.assigned_teams[0].team_name, "Hazardous Materials Team");
    assert_eq!(incident.assigned_teams[0].eta, t0() + Duration::minutes(30));
    assert_eq!(incident.assigned_teams[1].eta, t0() + Duration::minutes(10));

    let actions: Vec<&str> = incident.timeline.iter().map(|t| t.action.as_str()).collect();
    assert_eq!(actions, vec!["incident_created", "team_assigned", "team_assigned"]);
    assert_eq!(
        incident.timeline[1].description,
        "Hazardous Materials Team dispatched to incident"
    );
}

#[tokio::test]
async fn severity_override_and_unique_ids() {
    let f = fixture();
    let a = f
        .pipeline
        .incidents
        .create_incident(&tsunami(), Some(Severity::Warning))
        .unwrap();
    let b = f.pipeline.incidents.create_incident(&tsunami(), None).unwrap();
    let c = f.pipeline.incidents.create_incident(&dumping(), None).unwrap();
    assert_eq!(a.severity, Severity::Warning);
    assert_eq!(b.severity, Severity::Critical);
    assert_ne!(a.id, b.id);
    assert_ne!(b.id, c.id);
    assert_eq!(f.pipeline.incidents.active_incidents().len(), 3);

    let teams: Vec<TeamKey> = a.assigned_teams.iter().map(|t| t.team_key).collect();
    assert_eq!(teams, vec![TeamKey::WaterRescue, TeamKey::Medical]);
}

#[tokio::test]
async fn unknown_entities_are_explicit_errors() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let op = Actor::operator("op-1");

    let err = incidents.assign_team("INC_2026_999999", "hazmat", &op).unwrap_err();
    assert!(matches!(err, CoreError::IncidentNotFound(_)));

    let incident = incidents.create_incident(&dumping(), None).unwrap();
    let err = incidents.assign_team(&incident.id, "bomb squad", &op).unwrap_err();
    assert!(matches!(err, CoreError::UnknownTeam(_)));

    let skipped = incidents
        .deploy_resource("INC_2026_999999", "boats", 2, "", &op)
        .or_skip()
        .unwrap();
    assert!(skipped.is_none());

    let assigned = incidents
        .assign_team(&incident.id, "water_rescue", &op)
        .or_skip()
        .unwrap()
        .unwrap();
    assert_eq!(assigned.team_key, TeamKey::WaterRescue);
    assert_eq!(assigned.eta, t0() + Duration::minutes(15));
}

#[tokio::test]
async fn evacuation_sums_known_zone_populations() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let incident = incidents.create_incident(&tsunami(), None).unwrap();
    let record = incidents
        .initiate_evacuation(&incident.id, &["zoneA", "zoneB", "zoneQ"], &Actor::operator("op-2"))
        .unwrap();

    assert!(record.id.starts_with("EVAC_"));
    assert_eq!(record.total_population, 4700);
    assert_eq!(record.zones.len(), 2);
    assert_eq!(record.zones[1].zone_key, "zoneB");
    assert_eq!(record.zones[1].estimated_completion, t0() + Duration::minutes(30));
    assert_eq!(record.zones[0].shelters.len(), 2);

    let stored = incidents.get_incident(&incident.id).unwrap();
    assert_eq!(stored.evacuation.as_ref(), Some(&record));
    assert_eq!(
        stored.timeline.last().unwrap().description,
        "Evacuation ordered for zones: zoneA, zoneB"
    );
}

#[tokio::test]
async fn resolution_moves_incident_to_history_once() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let op = Actor::operator("op-3");
    let incident = incidents.create_incident(&dumping(), None).unwrap();

    let change = incidents
        .update_incident_status(&incident.id, "contained", "Perimeter set", &op)
        .unwrap();
    assert!(matches!(change, StatusChange::Updated(_)));
    assert_eq!(
        change.incident().timeline.last().unwrap().description,
        "Status changed from active to contained. Perimeter set"
    );

    f.clock.advance(Duration::minutes(45));
    let change = incidents
        .update_incident_status(&incident.id, IncidentStatus::Resolved, "", &op)
        .unwrap();
    let resolved = match change {
        StatusChange::Resolved(r) => r,
        other => panic!("expected resolution, got {:?}", other),
    };
    assert_eq!(resolved.duration_ms, 45 * 60 * 1000);
    assert_eq!(resolved.incident.resolved_at, Some(t0() + Duration::minutes(45)));
    assert_eq!(resolved.incident.status, IncidentStatus::Resolved);
    let actions: Vec<&str> = resolved
        .incident
        .timeline
        .iter()
        .rev()
        .take(2)
        .map(|t| t.action.as_str())
        .collect();
    assert_eq!(actions, vec!["incident_resolved", "status_change"]);

    assert!(incidents.active_incidents().is_empty());
    assert_eq!(incidents.incident_history().len(), 1);
    assert!(incidents.find_resolved(&incident.id).is_some());

    let err = incidents
        .update_incident_status(&incident.id, "active", "reopen", &op)
        .unwrap_err();
    assert!(matches!(err, CoreError::IncidentNotFound(_)));
    assert_eq!(incidents.incident_history().len(), 1);
}

#[tokio::test]
async fn resource_deployment_is_recorded() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let op = Actor::operator("op-5");
    let incident = incidents.create_incident(&tsunami(), None).unwrap();

    let err = incidents
        .deploy_resource(&incident.id, "sandbags", 0, "", &op)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let d = incidents
        .deploy_resource(&incident.id, "sandbags", 400, "North wall", &op)
        .unwrap();
    assert_eq!(d.quantity, 400);
    let stored = incidents.get_incident(&incident.id).unwrap();
    assert_eq!(stored.resources.len(), 1);
    let last = stored.timeline.last().unwrap();
    assert_eq!(last.description, "Deployed 400 sandbags. North wall");
    assert_eq!(last.actor, op);
}

#[tokio::test]
async fn every_step_is_audited() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let op = Actor::operator("op-6");
    let incident = incidents.create_incident(&dumping(), None).unwrap();
    incidents
        .deploy_resource(&incident.id, "booms", 3, "", &op)
        .unwrap();
    incidents
        .update_incident_status(&incident.id, "resolved", "", &op)
        .unwrap();

    let entries = f.pipeline.audit.query_logs(&LogFilter {
        categories: vec![LogCategory::Incident],
        ..LogFilter::default()
    });
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            "incident_created",
            "team_assigned",
            "team_assigned",
            "resource_deployed",
            "status_change",
            "incident_resolved",
        ]
    );
    assert!(entries
        .iter()
        .all(|e| e.payload["incidentId"] == incident.id.as_str()));
}

#[tokio::test]
async fn broadcast_dispatches_and_notes_alert() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let incident = incidents.create_incident(&tsunami(), None).unwrap();

    let d = incidents
        .broadcast(&incident.id, None, &Actor::operator("op-7"))
        .await
        .unwrap();
    assert!(d.results.all_succeeded());
    let email = &f.transport.deliveries_on(DeliveryChannel::Email)[0].body;
    assert_eq!(email["subject"], "CRITICAL: tsunami - Harbor Bay");

    let stored = incidents.get_incident(&incident.id).unwrap();
    let last = stored.timeline.last().unwrap();
    assert_eq!(last.action, "alert_broadcast");
    assert!(last.description.contains(&d.alert_id));

    let err = incidents
        .broadcast("INC_2026_424242", None, &Actor::System)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn pipeline_responds_end_to_end() {
    let f = fixture();
    let (incident, dispatch) = f.pipeline.respond(&tsunami()).await.unwrap();
    assert_eq!(incident.timeline.last().unwrap().action, "alert_broadcast");
    assert!(dispatch.results.all_succeeded());

    let report = f.pipeline.flush().await;
    assert_eq!(report.persist_failed, 0);
    assert_eq!(report.persisted, f.pipeline.audit.len());
    assert_eq!(f.pipeline.audit.verify_all_logs_integrity().integrity_rate, 100.0);
    assert!(f.pipeline.audit.verify_chain().is_valid);
}

#[tokio::test]
async fn statistics_cover_active_and_resolved() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let a = incidents.create_incident(&dumping(), None).unwrap();
    incidents.create_incident(&tsunami(), None).unwrap();
    incidents
        .create_incident(
            &AlertTrigger::new("storm surge", "warning", "North Pier", "Surge"),
            None,
        )
        .unwrap();
    f.clock.advance(Duration::minutes(30));
    incidents
        .update_incident_status(&a.id, "resolved", "", &Actor::System)
        .unwrap();

    let stats = incidents.get_incident_statistics("30d");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.by_type.get("tsunami"), Some(&1));
    assert_eq!(stats.average_resolution_minutes, 30);
    assert_eq!(stats.most_common_location, "North Pier");

    f.clock.advance(Duration::days(40));
    let stale = incidents.get_incident_statistics("30d");
    assert_eq!(stale.total, 0);
    assert_eq!(stale.most_common_location, "Unknown");
}

#[tokio::test]
async fn incident_exports_have_documented_shape() {
    let f = fixture();
    let incidents = &f.pipeline.incidents;
    let a = incidents.create_incident(&dumping(), None).unwrap();
    let b = incidents
        .create_incident(
            &AlertTrigger::new("Rip Current & Debris", "advisory", "South Dock", "Debris"),
            None,
        )
        .unwrap();
    f.clock.advance(Duration::minutes(30));
    incidents
        .update_incident_status(&a.id, "resolved", "", &Actor::System)
        .unwrap();

    let csv = incidents.export_incident_data(ExportFormat::Csv, "30d").unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "ID,Type,Severity,Location,Status,Created,Resolved,Duration (min)"
    );
    assert_eq!(
        lines[1],
        format!(
            "{},Illegal Dumping Detected,warning,North Pier,resolved,2026-01-01T00:00:00Z,2026-01-01T00:30:00Z,30",
            a.id
        )
    );
    assert!(lines[2].ends_with("active,2026-01-01T00:00:00Z,,"));

    let xml = incidents.export_incident_data(ExportFormat::Xml, "30d").unwrap();
    assert!(xml.contains(&format!("<incident id=\"{}\">", b.id)));
    assert!(xml.contains("<type>Rip Current &amp; Debris</type>"));
    assert!(xml.contains("<resolved>2026-01-01T00:30:00Z</resolved>"));
    assert!(xml.trim_end().ends_with("</incidents>"));

    let json = incidents.export_incident_data(ExportFormat::Json, "30d").unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
    assert_eq!(v[0]["incident_type"], "Illegal Dumping Detected");
}
