use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// One unit of work in a sync pipeline.
///
/// Steps are generic over the pipeline's context type: each step reads the
/// fields earlier steps populated and writes its own. Errors propagate to
/// the orchestrator untouched so the dispatcher's failure taxonomy sees the
/// original error kind.
#[async_trait]
pub trait SyncStep<C>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &mut C, token: &CancellationToken) -> Result<()>;
}
