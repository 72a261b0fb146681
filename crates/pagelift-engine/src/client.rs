//! Model client boundary.

use async_trait::async_trait;

/// Black-box boundary to the hosted model.
///
/// The engine never constructs clients, retries transport errors, or
/// manages deadlines; callers pass a client whose `complete` carries its
/// own timeout policy.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Submit one prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}
