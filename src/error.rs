use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("no collector for {0}")]
    UnknownCollector(String),

    #[error("collector already registered: {0}")]
    DuplicateCollectorRegistration(String),

    #[error("metric {metric} is already registered: {source}")]
    DuplicateMetricIdentity {
        metric: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("metric {metric} has no vector kind declared")]
    UnsupportedVectorKind { metric: String },

    #[error("invalid metric {metric}: {source}")]
    InvalidMetric {
        metric: String,
        #[source]
        source: prometheus::Error,
    },

    #[error(transparent)]
    RemoteQuery(#[from] RemoteQueryError),

    #[error("collection service is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Failures talking to the remote management endpoint. All of them abort the
/// current scrape cycle only.
#[derive(Error, Debug)]
pub enum RemoteQueryError {
    #[error("remote query timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not decode remote response: {0}")]
    Decode(String),

    #[error("no active session with the remote endpoint")]
    MissingSession,
}

impl RemoteQueryError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl ExporterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RemoteQuery(e) if e.is_timeout())
    }
}

/// A raw value had no numeric mapping under the converter bound to it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {kind} value to a number: {value}")]
pub struct ConversionFallback {
    pub kind: &'static str,
    pub value: String,
}
