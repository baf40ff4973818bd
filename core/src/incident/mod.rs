//! Incident lifecycle: creation, team dispatch, evacuation, resolution.

pub mod catalog;
pub mod export;
pub mod model;
pub mod orchestrator;

pub use model::{AlertTrigger, Incident, IncidentStatus, ResolvedIncident, StatusChange};
pub use orchestrator::IncidentOrchestrator;
