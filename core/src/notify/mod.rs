//! Multi-channel emergency notification.

pub mod catalog;
pub mod dispatcher;
pub mod model;

pub use dispatcher::NotificationDispatcher;
pub use model::{Alert, AlertStatistics, ChannelOutcome, ChannelResults, Dispatch, Severity};
