//! Wires the audit log, dispatcher and orchestrator around shared transports.

use crate::audit::entry::Actor;
use crate::audit::log::{AuditLog, FlushReport};
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::incident::model::{AlertTrigger, Incident};
use crate::incident::orchestrator::IncidentOrchestrator;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::model::Dispatch;
use crate::transport::{AuditBackend, HttpTransport, MemoryTransport, NotificationGateway};
use std::sync::Arc;

/// One fully wired incident response context. Construct once per process
/// and share by reference or `Arc`.
pub struct ResponsePipeline {
    pub audit: Arc<AuditLog>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub incidents: Arc<IncidentOrchestrator>,
    pub clock: Arc<dyn Clock>,
}

impl ResponsePipeline {
    pub fn new(
        config: &CoreConfig,
        backend: Arc<dyn AuditBackend>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let audit = Arc::new(AuditLog::new(
            config.audit.clone(),
            backend,
            Arc::clone(&clock),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            config.notify.clone(),
            gateway,
            Arc::clone(&audit),
            Arc::clone(&clock),
        ));
        let incidents = Arc::new(IncidentOrchestrator::new(
            Arc::clone(&audit),
            Arc::clone(&dispatcher),
            Arc::clone(&clock),
        ));
        Self {
            audit,
            dispatcher,
            incidents,
            clock,
        }
    }

    /// Production wiring: HTTP collaborators and the system clock.
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        config.validate()?;
        let http = Arc::new(HttpTransport::new(&config.transport)?);
        Ok(Self::new(
            config,
            Arc::clone(&http) as Arc<dyn AuditBackend>,
            http,
            Arc::new(SystemClock),
        ))
    }

    /// In-process wiring for tests and drills.
    pub fn in_memory(
        config: &CoreConfig,
        transport: Arc<MemoryTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            config,
            Arc::clone(&transport) as Arc<dyn AuditBackend>,
            transport,
            clock,
        )
    }

    /// Opens an incident for `trigger` and broadcasts it on every channel.
    pub async fn respond(&self, trigger: &AlertTrigger) -> CoreResult<(Incident, Dispatch)> {
        let incident = self.incidents.create_incident(trigger, None)?;
        let dispatch = self
            .incidents
            .broadcast(&incident.id, None, &Actor::System)
            .await?;
        let incident = self.incidents.get_incident(&incident.id).unwrap_or(incident);
        Ok((incident, dispatch))
    }

    /// Waits for outstanding audit persistence and paging.
    pub async fn flush(&self) -> FlushReport {
        self.audit.flush().await
    }
}
