/// imagectl error types
///
/// The taxonomy is small and deliberate: reference problems are recoverable
/// per-tag, connection problems abort before any solve is attempted, solve
/// failures carry the backend's own diagnostic text verbatim, and render
/// failures never overturn a build that already completed.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A tag failed to normalize. Callers warn and drop the tag rather than
    /// failing the build.
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The backend connection could not be established or the request could
    /// not be dispatched.
    #[error("backend connection failed: {0}")]
    Connection(#[source] anyhow::Error),

    /// The backend rejected or failed the build. The message is the backend's
    /// diagnostic, passed through unmodified.
    #[error("{0}")]
    Solve(String),

    /// The progress relay's output stream failed.
    #[error("progress rendering failed: {0}")]
    Render(#[source] std::io::Error),
}

impl BuildError {
    pub fn invalid_reference(reference: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Whether an error should abort the whole invocation or can be absorbed
/// with a warning at the call site.
pub fn is_fatal(err: &BuildError) -> bool {
    match err {
        BuildError::InvalidReference { .. } => false,
        BuildError::Connection(_) => true,
        BuildError::Solve(_) => true,
        BuildError::Render(_) => true,
    }
}
