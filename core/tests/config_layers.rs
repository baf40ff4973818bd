use coastal_core::config::CoreConfig;
use std::io::Write;

// Only test in this binary that touches COASTAL_* variables.
#[test]
fn environment_overrides_file_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coastal.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(
        f,
        "[audit]\nbuffer_capacity = 25\nretention_days = 30\n\n[notify]\nchannel_timeout_ms = 2500"
    )
    .unwrap();

    std::env::set_var("COASTAL_AUDIT__BUFFER_CAPACITY", "500");
    let loaded = CoreConfig::load(Some(&path));
    std::env::remove_var("COASTAL_AUDIT__BUFFER_CAPACITY");
    let config = loaded.unwrap();

    assert_eq!(config.audit.buffer_capacity, 500);
    assert_eq!(config.audit.retention_days, 30);
    assert_eq!(config.notify.channel_timeout_ms, 2500);
    assert_eq!(config.notify.webhooks.len(), 3);

    std::env::set_var("COASTAL_AUDIT__BUFFER_CAPACITY", "0");
    let rejected = CoreConfig::load(None);
    std::env::remove_var("COASTAL_AUDIT__BUFFER_CAPACITY");
    assert!(rejected.is_err());
}
