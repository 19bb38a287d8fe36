//! File organization port
//!
//! The categorizer is a delegated sweep over the whole inbox. It is
//! idempotent, so it is safe to run once per filesystem event.

/// Port trait for the inbox categorization sweep
#[async_trait::async_trait]
pub trait IFileCategorizer: Send + Sync {
    /// Moves every file in the inbox into its category folder
    ///
    /// # Returns
    /// The number of files moved
    async fn categorize_inbox(&self) -> anyhow::Result<usize>;
}
