//! Error types for helio-vso.

use std::io;

use helio_attr::{AttrError, WalkError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid combination of attributes. Always fatal to the call.
    #[error(transparent)]
    Attr(#[from] AttrError),

    /// No converter handler for an attribute.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// The archive does not know a type used in the request.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[cfg(feature = "reqwest")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("unexpected argument {0}")]
    UnexpectedArgument(String),

    #[error("got multiple values for {0}")]
    MultipleValues(String),

    #[error("cannot parse time {0:?}")]
    InvalidTime(String),

    #[error("cannot parse wave range {0:?}")]
    InvalidWave(String),

    #[error("unknown unit {0:?}")]
    UnknownUnit(String),

    #[error("download failed for provider {provider}: {reason}")]
    DownloadFailed { provider: String, reason: String },

    #[error("no acceptable method for provider {provider} among {choices:?}")]
    MultipleChoices { provider: String, choices: Vec<String> },

    #[error("provider {provider} requires {field:?}, none supplied")]
    MissingInformation { provider: String, field: String },

    #[error("provider {provider} does not support {methods:?}")]
    UnknownMethod { provider: String, methods: Vec<String> },

    #[error("unknown status {status:?} from provider {provider}")]
    UnknownStatus { provider: String, status: String },

    #[error("unknown protocol version {version:?} from provider {provider}")]
    UnknownVersion { provider: String, version: String },

    #[error("negotiation with provider {provider} exceeded {rounds} rounds")]
    NegotiationLimit { provider: String, rounds: usize },

    #[error("completion ticket for {0:?} dropped without a result")]
    Abandoned(Vec<String>),

    #[error("invalid path template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("transfer task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] figment::Error),
}

impl Error {
    /// Errors that stand for "nothing matched" rather than a failure.
    pub fn is_type_not_found(&self) -> bool { matches!(self, Error::TypeNotFound(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;
