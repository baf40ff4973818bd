use crate::audit::entry::{LogCategory, LogEntry, LogLevel};
use crate::audit::integrity::round2;
use crate::audit::log::AuditLog;
use crate::clock::rfc3339;
use crate::determinism::ids;
use crate::error::CoreResult;
use crate::export::{cdata, finish_csv, xml_escape, ExportFormat};
use crate::tally::{count_by, most_common};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Selection criteria for buffered entries. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogFilter {
    #[serde(with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
    pub categories: Vec<LogCategory>,
    pub actor_id: Option<String>,
    pub level: Option<LogLevel>,
}

impl LogFilter {
    pub fn between(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn matches(&self, e: &LogEntry) -> bool {
        if self.start.map_or(false, |s| e.timestamp < s) {
            return false;
        }
        if self.end.map_or(false, |end| e.timestamp > end) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&e.category) {
            return false;
        }
        if let Some(actor) = &self.actor_id {
            if e.actor.actor_id() != actor {
                return false;
            }
        }
        self.level.map_or(true, |l| e.level == l)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogAnalysis {
    pub total_events: usize,
    pub by_level: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_actor: BTreeMap<String, usize>,
    /// Percentage of ERROR and CRITICAL entries.
    pub error_rate: f64,
    pub critical_events: usize,
    /// Entry counts keyed by UTC hour of day.
    pub time_distribution: BTreeMap<u8, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogStatistics {
    pub last_24_hours: usize,
    pub last_week: usize,
    /// Mean entries per day over a 30 day window.
    pub average_per_day: f64,
    pub most_active_actor: String,
    pub most_common_action: String,
    pub peak_hour: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportPeriod {
    #[serde(with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    pub report_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub period: ReportPeriod,
    pub filters: LogFilter,
    pub summary: LogAnalysis,
    pub logs: Vec<LogEntry>,
    pub statistics: LogStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceExport {
    pub export_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    pub period: ReportPeriod,
    pub total_records: usize,
    pub logs: Vec<LogEntry>,
}

pub fn analyze_logs(entries: &[LogEntry]) -> LogAnalysis {
    let total_events = entries.len();
    let errors = entries
        .iter()
        .filter(|e| e.level >= LogLevel::Error)
        .count();
    LogAnalysis {
        total_events,
        by_level: count_by(entries.iter().map(|e| e.level.as_str().to_string())),
        by_category: count_by(entries.iter().map(|e| e.category.as_str().to_string())),
        by_actor: count_by(entries.iter().map(|e| e.actor.actor_id().to_string())),
        error_rate: if total_events == 0 {
            0.0
        } else {
            round2(errors as f64 / total_events as f64 * 100.0)
        },
        critical_events: entries
            .iter()
            .filter(|e| e.level == LogLevel::Critical)
            .count(),
        time_distribution: count_by(entries.iter().map(|e| utc_hour(e))),
    }
}

pub fn log_statistics(entries: &[LogEntry], now: OffsetDateTime) -> LogStatistics {
    let since = |d: Duration| entries.iter().filter(|e| e.timestamp >= now - d).count();
    let last_month = since(Duration::days(30));
    LogStatistics {
        last_24_hours: since(Duration::DAY),
        last_week: since(Duration::WEEK),
        average_per_day: (last_month as f64 / 30.0 * 10.0).round() / 10.0,
        most_active_actor: most_common(entries.iter().map(|e| e.actor.actor_id()))
            .unwrap_or("unknown")
            .to_string(),
        most_common_action: most_common(entries.iter().map(|e| e.action.as_str()))
            .unwrap_or("unknown")
            .to_string(),
        peak_hour: most_common(entries.iter().map(|e| utc_hour(e))).unwrap_or(0),
    }
}

pub fn render_logs_csv(entries: &[LogEntry]) -> CoreResult<String> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(vec![]);
    wtr.write_record([
        "Timestamp",
        "Level",
        "Category",
        "Action",
        "User ID",
        "IP Address",
        "Data",
    ])?;
    for e in entries {
        let data = serde_json::to_string(&e.payload)?.replace(',', ";");
        wtr.write_record([
            rfc3339(e.timestamp).as_str(),
            e.level.as_str(),
            e.category.as_str(),
            e.action.as_str(),
            e.actor.actor_id(),
            e.context.ip_address.as_str(),
            data.as_str(),
        ])?;
    }
    finish_csv(wtr)
}

pub fn render_logs_xml(export: &ComplianceExport) -> CoreResult<String> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<audit_export id=\"{}\" exported_at=\"{}\">\n",
        xml_escape(&export.export_id),
        rfc3339(export.exported_at)
    ));
    out.push_str(&format!(
        "  <period start=\"{}\" end=\"{}\"/>\n",
        export.period.start.map(rfc3339).unwrap_or_default(),
        export.period.end.map(rfc3339).unwrap_or_default()
    ));
    out.push_str(&format!(
        "  <total_records>{}</total_records>\n",
        export.total_records
    ));
    out.push_str("  <logs>\n");
    for e in &export.logs {
        out.push_str(&format!(
            "    <log id=\"{}\" timestamp=\"{}\">\n",
            xml_escape(&e.id),
            rfc3339(e.timestamp)
        ));
        out.push_str(&format!("      <level>{}</level>\n", e.level));
        out.push_str(&format!("      <category>{}</category>\n", e.category));
        out.push_str(&format!("      <action>{}</action>\n", xml_escape(&e.action)));
        out.push_str(&format!(
            "      <user_id>{}</user_id>\n",
            xml_escape(e.actor.actor_id())
        ));
        out.push_str(&format!(
            "      <ip_address>{}</ip_address>\n",
            xml_escape(&e.context.ip_address)
        ));
        out.push_str(&format!(
            "      <data>{}</data>\n",
            cdata(&serde_json::to_string(&e.payload)?)
        ));
        out.push_str(&format!("      <digest>{}</digest>\n", e.digest));
        out.push_str("    </log>\n");
    }
    out.push_str("  </logs>\n");
    out.push_str("</audit_export>\n");
    Ok(out)
}

impl AuditLog {
    /// Matching entries, oldest first.
    pub fn query_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        lock_entries(self, |e| filter.matches(e))
    }

    pub fn generate_audit_report(&self, filter: &LogFilter) -> AuditReport {
        let logs = self.query_logs(filter);
        let now = self.clock().now();
        let report = AuditReport {
            report_id: ids::report_id(),
            generated_at: now,
            period: ReportPeriod {
                start: filter.start,
                end: filter.end,
            },
            filters: filter.clone(),
            summary: analyze_logs(&logs),
            statistics: log_statistics(&logs, now),
            logs,
        };
        tracing::info!(
            report_id = %report.report_id,
            total = report.summary.total_events,
            "audit report generated"
        );
        report
    }

    pub fn export_logs_for_compliance(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        format: ExportFormat,
    ) -> CoreResult<String> {
        let logs = self.query_logs(&LogFilter::between(start, end));
        let export = ComplianceExport {
            export_id: ids::report_id(),
            exported_at: self.clock().now(),
            period: ReportPeriod {
                start: Some(start),
                end: Some(end),
            },
            total_records: logs.len(),
            logs,
        };
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&export)?),
            ExportFormat::Csv => render_logs_csv(&export.logs),
            ExportFormat::Xml => render_logs_xml(&export),
        }
    }
}

fn utc_hour(e: &LogEntry) -> u8 {
    e.timestamp.to_offset(UtcOffset::UTC).hour()
}

fn lock_entries(log: &AuditLog, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
    let state = log.state();
    state.entries.iter().filter(|e| keep(e)).cloned().collect()
}
