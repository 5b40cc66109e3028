//! Pipeline stage trait
//!
//! Defines the interface for pipeline stages. Each stage runs in its own
//! async task and communicates with its neighbors via channels.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for pipeline stages that process frames
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Run the stage, processing data until shutdown
    async fn run(&mut self) -> Result<()>;

    /// Get the name of this stage for logging
    fn name(&self) -> &'static str;

    /// Gracefully shutdown the stage
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
