#![allow(dead_code)]

use coastal_core::clock::ManualClock;
use coastal_core::config::CoreConfig;
use coastal_core::pipeline::ResponsePipeline;
use coastal_core::transport::MemoryTransport;
use std::sync::Arc;
use time::OffsetDateTime;

/// 2026-01-01T00:00:00Z
pub const T0: i64 = 1_767_225_600;

pub fn t0() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(T0).unwrap()
}

pub struct Fixture {
    pub transport: Arc<MemoryTransport>,
    pub clock: Arc<ManualClock>,
    pub pipeline: ResponsePipeline,
}

pub fn fixture() -> Fixture {
    fixture_with(CoreConfig::default())
}

pub fn fixture_with(config: CoreConfig) -> Fixture {
    let transport = Arc::new(MemoryTransport::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let pipeline = ResponsePipeline::in_memory(&config, Arc::clone(&transport), clock.clone());
    Fixture {
        transport,
        clock,
        pipeline,
    }
}
