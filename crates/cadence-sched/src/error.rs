//! Error types for repair scheduling.

/// Errors that can occur while planning repair work.
#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// Token arithmetic or partitioning failed.
    #[error("ring error: {0}")]
    Ring(#[from] cadence_ring::RingError),

    /// The repair state cache refused or failed a request.
    #[error("state error: {0}")]
    State(#[from] cadence_state::StateError),
}
