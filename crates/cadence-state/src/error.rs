//! Error types for repair state handling.

/// Errors that can occur while maintaining repair states.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The repair state cache has been closed and no longer serves requests.
    #[error("repair state cache is closed")]
    CacheClosed,

    /// A snapshot recomputation failed in a collaborator. The previous
    /// snapshot stays authoritative.
    #[error("repair state update failed: {0}")]
    Update(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StateError {
    /// Wrap a collaborator failure from a snapshot recomputation.
    pub fn update(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Update(err.into())
    }
}
