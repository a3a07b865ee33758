use thiserror::Error;

/// Failure conditions the host is expected to match on.
///
/// Resolution failures and malformed paths are absorbed where they occur
/// (logged, entry skipped); only conditions the host must present precisely
/// are surfaced here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("a group named {0:?} already exists")]
    DuplicateGroup(String),

    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("no selection session is active")]
    NoSession,

    /// Confirming an add-mode session with nothing selected removes every
    /// member of the group. The caller must pass an explicit acknowledgment;
    /// an unacknowledged confirm returns this and changes nothing.
    #[error("empty selection would remove every file from group {group:?}")]
    EmptySelection { group: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether retrying the same call can succeed without other input.
    /// Store failures are retryable (the session, if any, is kept alive);
    /// the rest need a different call or argument.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
