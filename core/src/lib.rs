pub mod audit;
pub mod clock;
pub mod config;
pub mod determinism;
pub mod export;
pub mod incident;
pub mod notify;
pub mod pipeline;
pub mod tally;
pub mod transport;

pub mod error;
