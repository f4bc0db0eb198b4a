//! Error kinds surfaced by the pipeline.
//!
//! Glue code returns `anyhow::Result`; the kinds below are the ones callers
//! branch on, recovered with `anyhow::Error::downcast_ref::<PipelineError>()`.

use std::time::Duration;

/// How a collaborator call (HTTP download, detector, OCR) failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollaboratorFailure {
    /// The call did not complete before its deadline.
    TimedOut { after: Duration },
    /// The call completed (or could not start) with an error.
    Failed { message: String },
}

impl CollaboratorFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CollaboratorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
            Self::Failed { message } => write!(f, "{}", message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// An identifier did not carry a `YYYY_MM_DDThh_mm_ss` timestamp.
    Parse { input: String },
    /// An external collaborator failed for the named scope (camera, folder).
    Collaborator {
        collaborator: &'static str,
        scope: String,
        failure: CollaboratorFailure,
    },
}

impl PipelineError {
    pub fn collaborator(
        collaborator: &'static str,
        scope: impl Into<String>,
        failure: CollaboratorFailure,
    ) -> Self {
        Self::Collaborator {
            collaborator,
            scope: scope.into(),
            failure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Collaborator {
                failure: CollaboratorFailure::TimedOut { .. },
                ..
            }
        )
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { input } => write!(f, "PARSE_ERROR: no timestamp in '{}'", input),
            Self::Collaborator {
                collaborator,
                scope,
                failure,
            } => write!(
                f,
                "COLLABORATOR_FAILURE: {} failed for {}: {}",
                collaborator, scope, failure
            ),
        }
    }
}

impl std::error::Error for PipelineError {}
