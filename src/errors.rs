//! Typed failures of the thumbnail pipeline and how each one is presented
//! to clients.

use crate::models::envelope::ResponseEnvelope;
use thiserror::Error;

/// Why an origin fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NotFound,
    TooLarge,
    Timeout,
    Store,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or out-of-range request. The message is shown to the caller.
    #[error("{0}")]
    BadRequest(String),
    #[error("fetch failed: {message}")]
    Fetch {
        kind: FetchErrorKind,
        message: String,
    },
    #[error("scale failed: {0}")]
    Scale(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn fetch(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self::Fetch {
            kind,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::BadRequest(_) => 422,
            PipelineError::Fetch {
                kind: FetchErrorKind::NotFound,
                ..
            } => 404,
            PipelineError::Fetch { .. } | PipelineError::Scale(_) | PipelineError::Publish(_) => {
                500
            }
        }
    }

    /// Text safe to return to any caller. Store and codec diagnostics are left
    /// out; they only travel through diagnostics.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::BadRequest(message) => message.clone(),
            PipelineError::Fetch { kind, .. } => match kind {
                FetchErrorKind::NotFound => "Object not found in media store".into(),
                FetchErrorKind::TooLarge => {
                    "Failed to retrieve object from media store: object too large".into()
                }
                FetchErrorKind::Timeout | FetchErrorKind::Store => {
                    "Failed to retrieve object from media store".into()
                }
            },
            PipelineError::Scale(_) => "Image resizing error: failed to generate scaled image".into(),
            PipelineError::Publish(_) => "Failed to place output object in media store".into(),
        }
    }

    /// Short machine-readable name used in logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PipelineError::BadRequest(_) => "bad_request",
            PipelineError::Fetch { .. } => "fetch_error",
            PipelineError::Scale(_) => "scale_error",
            PipelineError::Publish(_) => "publish_error",
        }
    }

    pub fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope::error(self.status_code(), &self.public_message())
    }
}
