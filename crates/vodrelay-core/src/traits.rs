//! Shared traits.

use async_trait::async_trait;

/// Checks whether a platform post id still resolves.
///
/// The history store's validation sweep consumes this; the platform client
/// implements it. Keeping the seam here lets the sweep be tested with a
/// stub instead of a live uploader process.
#[async_trait]
pub trait PostValidator: Send + Sync {
    /// True when the post still exists on the platform. Ambiguous responses
    /// must err toward `true`: history is only discarded on a definite miss.
    async fn validate(&self, platform_id: &str) -> bool;
}
