use crate::clock::rfc3339;
use crate::determinism::time_range::time_range_or;
use crate::error::CoreResult;
use crate::export::{finish_csv, xml_escape, ExportFormat};
use crate::incident::model::{Incident, IncidentStatistics};
use crate::incident::orchestrator::IncidentOrchestrator;
use crate::tally::{count_by, most_common};
use time::Duration;

pub const DEFAULT_INCIDENT_RANGE: &str = "30d";

pub fn incident_statistics(incidents: &[Incident]) -> IncidentStatistics {
    let durations: Vec<f64> = incidents
        .iter()
        .filter_map(|i| i.resolved_at.map(|r| (r - i.created_at).as_seconds_f64()))
        .collect();
    let average_resolution_minutes = if durations.is_empty() {
        0
    } else {
        (durations.iter().sum::<f64>() / durations.len() as f64 / 60.0).round() as i64
    };
    IncidentStatistics {
        total: incidents.len(),
        active: incidents.iter().filter(|i| !i.status.is_terminal()).count(),
        resolved: incidents.iter().filter(|i| i.status.is_terminal()).count(),
        by_type: count_by(incidents.iter().map(|i| i.incident_type.clone())),
        average_resolution_minutes,
        most_common_location: most_common(incidents.iter().map(|i| i.location.as_str()))
            .unwrap_or("Unknown")
            .to_string(),
    }
}

pub fn render_incidents_csv(incidents: &[Incident]) -> CoreResult<String> {
    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
    wtr.write_record([
        "ID",
        "Type",
        "Severity",
        "Location",
        "Status",
        "Created",
        "Resolved",
        "Duration (min)",
    ])?;
    for i in incidents {
        wtr.write_record([
            i.id.clone(),
            i.incident_type.clone(),
            i.severity.to_string(),
            i.location.clone(),
            i.status.to_string(),
            rfc3339(i.created_at),
            i.resolved_at.map(rfc3339).unwrap_or_default(),
            i.resolution_minutes()
                .map(|m| m.to_string())
                .unwrap_or_default(),
        ])?;
    }
    finish_csv(wtr)
}

pub fn render_incidents_xml(incidents: &[Incident]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<incidents>\n");
    for i in incidents {
        out.push_str(&format!("  <incident id=\"{}\">\n", xml_escape(&i.id)));
        out.push_str(&format!("    <type>{}</type>\n", xml_escape(&i.incident_type)));
        out.push_str(&format!(
            "    <severity>{}</severity>\n",
            xml_escape(i.severity.as_str())
        ));
        out.push_str(&format!("    <location>{}</location>\n", xml_escape(&i.location)));
        out.push_str(&format!("    <status>{}</status>\n", xml_escape(i.status.as_str())));
        out.push_str(&format!("    <created>{}</created>\n", rfc3339(i.created_at)));
        if let Some(r) = i.resolved_at {
            out.push_str(&format!("    <resolved>{}</resolved>\n", rfc3339(r)));
        }
        out.push_str("  </incident>\n");
    }
    out.push_str("</incidents>\n");
    out
}

impl IncidentOrchestrator {
    /// Active and resolved incidents created within `range`, oldest first.
    pub fn incidents_within(&self, range: &str) -> Vec<Incident> {
        let cutoff = self.clock().now() - time_range_or(range, Duration::DAY);
        let store = self.store();
        let mut out: Vec<Incident> = store
            .history
            .iter()
            .map(|r| &r.incident)
            .chain(store.active.iter())
            .filter(|i| i.created_at >= cutoff)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn get_incident_statistics(&self, range: &str) -> IncidentStatistics {
        incident_statistics(&self.incidents_within(range))
    }

    pub fn export_incident_data(&self, format: ExportFormat, range: &str) -> CoreResult<String> {
        let incidents = self.incidents_within(range);
        tracing::info!(?format, count = incidents.len(), "exporting incident data");
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&incidents)?),
            ExportFormat::Csv => render_incidents_csv(&incidents),
            ExportFormat::Xml => Ok(render_incidents_xml(&incidents)),
        }
    }
}
