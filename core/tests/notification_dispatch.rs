mod common;

use coastal_core::audit::entry::{LogCategory, LogLevel};
use coastal_core::audit::report::LogFilter;
use coastal_core::config::CoreConfig;
use coastal_core::error::CoreError;
use coastal_core::notify::model::{AlertStatus, Severity};
use coastal_core::transport::DeliveryChannel;
use common::{fixture, fixture_with};
use std::time::Duration as StdDuration;
use time::Duration;

#[tokio::test]
async fn critical_alert_reaches_every_tier_and_channel() {
    let f = fixture();
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "Harbor Bay", Some("Move inland now."))
        .await
        .unwrap();
    assert!(d.alert_id.starts_with("ALERT_"));
    assert!(d.results.all_succeeded());

    let email = &f.transport.deliveries_on(DeliveryChannel::Email)[0].body;
    assert_eq!(email["to"].as_array().unwrap().len(), 8);
    assert_eq!(email["subject"], "CRITICAL: tsunami - Harbor Bay");
    assert_eq!(email["priority"], "high");

    let sms = &f.transport.deliveries_on(DeliveryChannel::Sms)[0].body;
    assert_eq!(sms["to"][0], "+1-800-USCG-911");
    assert_eq!(
        sms["message"],
        "ALERT: tsunami - CRITICAL at Harbor Bay. Move inland now."
    );

    let broadcast = &f.transport.deliveries_on(DeliveryChannel::Broadcast)[0].body;
    assert_eq!(broadcast["duration"], 300);

    let social = &f.transport.deliveries_on(DeliveryChannel::Social)[0].body;
    assert_eq!(social["hashtags"][2], "#HarborBay");
    assert_eq!(social["urgent"], true);

    let hooks = f.transport.webhooks();
    assert_eq!(hooks.len(), 3);
    let keys: Vec<&str> = hooks.iter().map(|h| h.api_key.as_str()).collect();
    assert!(keys.contains(&"weather_api_key"));
    assert_eq!(hooks[0].body["alert_id"], d.alert_id.as_str());
    assert_eq!(d.results.webhook.endpoints.len(), 3);

    let alert = f.pipeline.dispatcher.get_alert(&d.alert_id).unwrap();
    assert_eq!(alert.status, AlertStatus::Sent);
    assert_eq!(alert.results.as_ref(), Some(&d.results));
}

#[tokio::test]
async fn warning_tier_excludes_media() {
    let f = fixture();
    f.pipeline
        .dispatcher
        .send_emergency_alert("storm", Severity::Warning, "Low Flats", None)
        .await
        .unwrap();
    let email = &f.transport.deliveries_on(DeliveryChannel::Email)[0].body;
    assert_eq!(email["to"].as_array().unwrap().len(), 6);
    assert_eq!(email["priority"], "normal");
    let broadcast = &f.transport.deliveries_on(DeliveryChannel::Broadcast)[0].body;
    assert_eq!(broadcast["duration"], 180);
    assert_eq!(
        broadcast["message"],
        "STORM SURGE WARNING: Life-threatening flooding imminent. Evacuate flood-prone areas immediately."
    );
}

#[tokio::test]
async fn low_severity_skips_social_media() {
    let f = fixture();
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("algal bloom", Severity::Advisory, "North Pier", None)
        .await
        .unwrap();
    assert!(d.results.social.success);
    assert!(d.results.social.skipped);
    assert_eq!(d.results.social.reason.as_deref(), Some("Low severity"));
    assert!(f.transport.deliveries_on(DeliveryChannel::Social).is_empty());

    let email = &f.transport.deliveries_on(DeliveryChannel::Email)[0].body;
    assert_eq!(email["to"].as_array().unwrap().len(), 3);

    let alert = f.pipeline.dispatcher.get_alert(&d.alert_id).unwrap();
    assert_eq!(
        alert.message,
        "ADVISORY algal bloom detected at North Pier. Follow official guidance."
    );
}

#[tokio::test]
async fn template_messages_fill_location() {
    let f = fixture();
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::from("watch"), "Harbor Bay", None)
        .await
        .unwrap();
    let alert = f.pipeline.dispatcher.get_alert(&d.alert_id).unwrap();
    assert!(alert
        .message
        .starts_with("TSUNAMI WATCH issued for Harbor Bay."));
}

#[tokio::test]
async fn failing_channel_does_not_affect_others() {
    let f = fixture();
    f.transport.fail_channel(DeliveryChannel::Sms);
    f.transport.reject_channel(DeliveryChannel::Email);
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "Harbor Bay", None)
        .await
        .unwrap();

    assert!(!d.results.sms.success);
    assert!(d.results.sms.error.as_deref().unwrap().contains("unreachable"));
    assert!(!d.results.email.success);
    assert!(d.results.broadcast.success);
    assert!(d.results.webhook.success);
    assert!(d.results.social.success);
    assert_eq!(d.results.failed_channels(), vec!["email", "sms"]);

    let failures = f.pipeline.audit.query_logs(&LogFilter {
        categories: vec![LogCategory::Notification],
        ..LogFilter::default()
    });
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|e| e.action == "channel_failed" && e.level == LogLevel::Warn));
    assert_eq!(failures[1].payload["channel"], "sms");
}

#[tokio::test]
async fn webhook_channel_fails_if_any_endpoint_fails() {
    let f = fixture();
    f.transport.fail_webhook("https://api.weather.gov/alerts");
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Warning, "Harbor Bay", None)
        .await
        .unwrap();
    let webhook = &d.results.webhook;
    assert!(!webhook.success);
    assert_eq!(webhook.endpoints.len(), 3);
    let failed: Vec<&str> = webhook
        .endpoints
        .iter()
        .filter(|e| !e.success)
        .map(|e| e.url.as_str())
        .collect();
    assert_eq!(failed, vec!["https://api.weather.gov/alerts"]);
    assert_eq!(f.transport.webhooks().len(), 2);
}

#[tokio::test]
async fn slow_channel_times_out() {
    let mut config = CoreConfig::default();
    config.notify.channel_timeout_ms = 50;
    let f = fixture_with(config);
    f.transport
        .delay_channel(DeliveryChannel::Broadcast, StdDuration::from_millis(500));
    let d = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "Harbor Bay", None)
        .await
        .unwrap();
    assert!(!d.results.broadcast.success);
    assert!(d.results.broadcast.error.as_deref().unwrap().contains("timed out"));
    assert!(d.results.email.success);
    assert!(f.transport.deliveries_on(DeliveryChannel::Broadcast).is_empty());
}

#[tokio::test]
async fn dispatch_writes_alert_audit_entry() {
    let f = fixture();
    f.pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "Harbor Bay", None)
        .await
        .unwrap();
    f.pipeline
        .dispatcher
        .send_emergency_alert("storm", Severity::Warning, "Low Flats", None)
        .await
        .unwrap();
    let alerts = f.pipeline.audit.query_logs(&LogFilter {
        categories: vec![LogCategory::Alert],
        ..LogFilter::default()
    });
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].level, LogLevel::Critical);
    assert_eq!(alerts[0].action, "tsunami");
    assert_eq!(alerts[1].level, LogLevel::Warn);
}

#[tokio::test]
async fn empty_location_is_rejected() {
    let f = fixture();
    let err = f
        .pipeline
        .dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "  ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
    assert!(f.transport.deliveries().is_empty());
}

#[tokio::test]
async fn acknowledgment_feeds_statistics() {
    let f = fixture();
    let dispatcher = &f.pipeline.dispatcher;
    let critical = dispatcher
        .send_emergency_alert("tsunami", Severity::Critical, "Harbor Bay", None)
        .await
        .unwrap();
    dispatcher
        .send_emergency_alert("storm", Severity::Warning, "Low Flats", None)
        .await
        .unwrap();

    f.clock.advance(Duration::minutes(12));
    let acked = dispatcher
        .acknowledge_alert(&critical.alert_id, "op-4", "crews notified")
        .unwrap();
    let ack = acked.acknowledgment.unwrap();
    assert_eq!(ack.by, "op-4");
    assert_eq!(ack.notes, "crews notified");

    let stats = dispatcher.get_alert_statistics("24h");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.critical, 1);
    assert_eq!(stats.warning, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.average_response_minutes, 12);

    let audit = f.pipeline.audit.query_logs(&LogFilter {
        categories: vec![LogCategory::UserAction],
        ..LogFilter::default()
    });
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "alert_acknowledged");
    assert_eq!(audit[0].actor.actor_id(), "op-4");
}

#[tokio::test]
async fn statistics_respect_time_range() {
    let f = fixture();
    let dispatcher = &f.pipeline.dispatcher;
    dispatcher
        .send_emergency_alert("storm", Severity::Warning, "Low Flats", None)
        .await
        .unwrap();
    f.clock.advance(Duration::days(2));
    dispatcher
        .send_emergency_alert("storm", Severity::Warning, "Low Flats", None)
        .await
        .unwrap();

    assert_eq!(dispatcher.get_alert_statistics("24h").total, 1);
    assert_eq!(dispatcher.get_alert_statistics("7d").total, 2);
    // Unparsable ranges fall back to one day.
    assert_eq!(dispatcher.get_alert_statistics("soon").total, 1);
    assert_eq!(dispatcher.get_alert_statistics("24h").average_response_minutes, 0);
}

#[tokio::test]
async fn unknown_alert_cannot_be_acknowledged() {
    let f = fixture();
    let err = f
        .pipeline
        .dispatcher
        .acknowledge_alert("ALERT_missing", "op-1", "")
        .unwrap_err();
    assert!(matches!(err, CoreError::AlertNotFound(ref id) if id == "ALERT_missing"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn alert_history_drops_oldest_beyond_capacity() {
    let mut config = CoreConfig::default();
    config.notify.alert_history_capacity = 2;
    let f = fixture_with(config);
    let dispatcher = &f.pipeline.dispatcher;

    let mut ids = Vec::new();
    for location in ["North Pier", "Low Flats", "Harbor Bay"] {
        let d = dispatcher
            .send_emergency_alert("storm", Severity::Warning, location, None)
            .await
            .unwrap();
        ids.push(d.alert_id);
    }

    let kept: Vec<String> = dispatcher.alerts().into_iter().map(|a| a.id).collect();
    assert_eq!(kept, ids[1..]);
    assert!(dispatcher.get_alert(&ids[0]).is_none());
    assert_eq!(dispatcher.get_alert(&ids[2]).unwrap().status, AlertStatus::Sent);
    assert!(dispatcher
        .acknowledge_alert(&ids[0], "op-1", "")
        .unwrap_err()
        .is_not_found());
    assert_eq!(dispatcher.get_alert_statistics("24h").total, 2);
}
