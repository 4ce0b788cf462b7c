//! Sequential step orchestrator.
//!
//! Runs an explicit, builder-assembled list of [`SyncStep`]s against a
//! mutable context. Execution is strictly in order: the first error aborts
//! the remainder and propagates unchanged, and cancellation is checked
//! before each step so a shutdown never starts work it cannot finish.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, SyncError};
use crate::orchestration::step::SyncStep;

pub struct Orchestrator<C> {
    name: String,
    steps: Vec<Arc<dyn SyncStep<C>>>,
}

impl<C: Send> Orchestrator<C> {
    pub fn builder(name: &str) -> OrchestratorBuilder<C> {
        OrchestratorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order against `ctx`.
    pub async fn execute(&self, ctx: &mut C, token: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        debug!(
            pipeline = %self.name,
            steps = self.steps.len(),
            "Pipeline starting"
        );

        for step in &self.steps {
            if token.is_cancelled() {
                debug!(pipeline = %self.name, step = step.name(), "Pipeline cancelled");
                return Err(SyncError::Cancelled);
            }

            let step_started = Instant::now();
            match step.execute(ctx, token).await {
                Ok(()) => {
                    debug!(
                        pipeline = %self.name,
                        step = step.name(),
                        elapsed_ms = step_started.elapsed().as_millis() as u64,
                        "Step completed"
                    );
                }
                Err(e) => {
                    if !e.is_cancelled() {
                        error!(
                            pipeline = %self.name,
                            step = step.name(),
                            error = %e,
                            "❌ Step failed"
                        );
                    }
                    return Err(e);
                }
            }
        }

        info!(
            pipeline = %self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Pipeline completed"
        );
        Ok(())
    }
}

/// Assembles an [`Orchestrator`] from an explicit ordered step list.
pub struct OrchestratorBuilder<C> {
    name: String,
    steps: Vec<Arc<dyn SyncStep<C>>>,
}

impl<C: Send> OrchestratorBuilder<C> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Arc<dyn SyncStep<C>>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Orchestrator<C> {
        Orchestrator {
            name: self.name,
            steps: self.steps,
        }
    }
}
