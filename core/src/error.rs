use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    #[error("unknown response team: {0}")]
    UnknownTeam(String),

    #[error("alert not found: {0}")]
    AlertNotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl CoreError {
    /// Lookups against ids or keys that do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::IncidentNotFound(_) | CoreError::UnknownTeam(_) | CoreError::AlertNotFound(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Opt-in lenient handling of unknown-entity references.
///
/// Turns not-found outcomes into `Ok(None)` after a debug-level log line;
/// every other error still propagates.
pub trait Lenient<T> {
    fn or_skip(self) -> CoreResult<Option<T>>;
}

impl<T> Lenient<T> for CoreResult<T> {
    fn or_skip(self) -> CoreResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(error = %e, "skipping operation on unknown entity");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl From<figment::Error> for CoreError {
    fn from(e: figment::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for CoreError {
    fn from(e: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        CoreError::Io(e.into_error())
    }
}
