use clap::{Parser, ValueEnum};
use coastal_core::audit::entry::Actor;
use coastal_core::clock::{Clock, SystemClock};
use coastal_core::config::CoreConfig;
use coastal_core::incident::model::AlertTrigger;
use coastal_core::pipeline::ResponsePipeline;
use coastal_core::transport::{DeliveryChannel, MemoryTransport};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Runs an offline response drill against the in-memory transport and
/// prints what every channel and the audit log saw.
#[derive(Parser, Debug)]
#[command(name = "drill_runner", version, about, long_about = None)]
struct Cli {
    /// Hazard type reported by the sensor, e.g. "tsunami".
    #[arg(long, default_value = "tsunami")]
    hazard: String,

    #[arg(long, default_value = "critical")]
    severity: String,

    #[arg(long, default_value = "Harbor Bay")]
    location: String,

    #[arg(long, default_value = "Drill: sensor threshold exceeded")]
    message: String,

    /// Channels to take offline for the drill.
    #[arg(long = "fail", value_enum)]
    fail: Vec<Channel>,

    /// Zones to evacuate after the alert goes out.
    #[arg(long = "evacuate")]
    evacuate: Vec<String>,

    /// Resolve the incident at the end of the drill.
    #[arg(long)]
    resolve: bool,

    /// Optional TOML config layered under `COASTAL_*` variables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Channel {
    Email,
    Sms,
    Broadcast,
    Social,
}

impl From<Channel> for DeliveryChannel {
    fn from(c: Channel) -> Self {
        match c {
            Channel::Email => DeliveryChannel::Email,
            Channel::Sms => DeliveryChannel::Sms,
            Channel::Broadcast => DeliveryChannel::Broadcast,
            Channel::Social => DeliveryChannel::Social,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match CoreConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {}", e);
            std::process::exit(2);
        }
    };

    let transport = Arc::new(MemoryTransport::new());
    for channel in &cli.fail {
        transport.fail_channel((*channel).into());
    }
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pipeline = ResponsePipeline::in_memory(&config, Arc::clone(&transport), clock);

    let trigger = AlertTrigger::new(
        cli.hazard.as_str(),
        cli.severity.as_str(),
        cli.location.as_str(),
        cli.message.as_str(),
    );
    let (incident, dispatch) = match pipeline.respond(&trigger).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("drill failed: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(incident_id = %incident.id, alert_id = %dispatch.alert_id, "drill alert dispatched");

    let operator = Actor::operator("drill");
    let evacuation = if cli.evacuate.is_empty() {
        None
    } else {
        let zones: Vec<&str> = cli.evacuate.iter().map(String::as_str).collect();
        match pipeline.incidents.initiate_evacuation(&incident.id, &zones, &operator) {
            Ok(record) => Some(record),
            Err(e) => {
                eprintln!("evacuation failed: {}", e);
                std::process::exit(1);
            }
        }
    };
    if cli.resolve {
        if let Err(e) =
            pipeline
                .incidents
                .update_incident_status(&incident.id, "resolved", "Drill complete", &operator)
        {
            eprintln!("resolution failed: {}", e);
            std::process::exit(1);
        }
    }

    let flush = pipeline.flush().await;
    let integrity = pipeline.audit.verify_all_logs_integrity();
    let chain = pipeline.audit.verify_chain();

    let summary = json!({
        "incident_id": incident.id,
        "alert_id": dispatch.alert_id,
        "failed_channels": dispatch.results.failed_channels(),
        "channels": dispatch.results,
        "evacuated_population": evacuation.map(|r| r.total_population),
        "incident_statistics": pipeline.incidents.get_incident_statistics("1d"),
        "alert_statistics": pipeline.dispatcher.get_alert_statistics("1d"),
        "audit": {
            "entries": pipeline.audit.len(),
            "persisted": flush.persisted,
            "persist_failed": flush.persist_failed,
            "admin_alerts": transport.admin_alerts().len(),
            "integrity_rate": integrity.integrity_rate,
            "chain_valid": chain.is_valid,
        },
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("cannot render summary: {}", e);
            std::process::exit(1);
        }
    }

    if integrity.integrity_rate < 100.0 || !chain.is_valid {
        std::process::exit(1);
    }
}
