use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Alert and incident severity. Unrecognized values are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Advisory,
    Warning,
    Critical,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Info => "info",
            Severity::Advisory => "advisory",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Other(s) => s,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Severity::Critical)
    }

    /// Warning and critical alerts also reach secondary contacts and social
    /// feeds. Only critical alerts add the media tier.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Critical)
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => Severity::Info,
            "advisory" => Severity::Advisory,
            "warning" => Severity::Warning,
            "critical" => Severity::Critical,
            _ => Severity::Other(s),
        }
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        Severity::from(s.to_string())
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Other(v) => v,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Severity {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Severity::from(s))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointOutcome {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Per-endpoint results; only the webhook channel fills this.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointOutcome>,
}

impl ChannelOutcome {
    pub fn delivered(at: OffsetDateTime) -> Self {
        Self {
            success: true,
            completed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelResults {
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
    pub broadcast: ChannelOutcome,
    pub webhook: ChannelOutcome,
    pub social: ChannelOutcome,
}

impl ChannelResults {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ChannelOutcome)> + '_ {
        [
            ("email", &self.email),
            ("sms", &self.sms),
            ("broadcast", &self.broadcast),
            ("webhook", &self.webhook),
            ("social", &self.social),
        ]
        .into_iter()
    }

    pub fn failed_channels(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|(_, o)| !o.success)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.iter().all(|(_, o)| o.success)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Sent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgment {
    pub by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub location: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: AlertStatus,
    pub recipients: Vec<Contact>,
    pub results: Option<ChannelResults>,
    pub acknowledgment: Option<Acknowledgment>,
}

/// Returned by a dispatch once every channel has settled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dispatch {
    pub alert_id: String,
    pub results: ChannelResults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertStatistics {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub acknowledged: usize,
    /// Mean acknowledgment latency in whole minutes; 0 when nothing was acknowledged.
    pub average_response_minutes: i64,
}
