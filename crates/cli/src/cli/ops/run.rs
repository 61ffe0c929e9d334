use std::sync::Arc;

use clap::Args;
use uuid::Uuid;

use cadmus_cli::client::HttpPropertyService;
use common::behavior::{ActionDispatcher, BehaviorRegistry, DispatchOutcome};
use common::store::{PropertyError, PropertyService};

#[derive(Args, Debug, Clone)]
pub struct Run {
    /// Class whose registry entry to use
    pub class_id: String,

    /// Action to dispatch
    pub action_id: String,

    /// Target document
    pub doc_id: Uuid,

    /// User to act as (defaults to the configured user)
    #[arg(long)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no user id: pass --user-id or set user_id in config")]
    MissingUser,
    #[error("failed to load document: {0}")]
    Property(#[from] PropertyError),
    #[error("action failed: {0}")]
    Failed(String),
    #[error("another action is still running")]
    Busy,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Run {
    type Error = RunError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let user_id = ctx.user_id(self.user_id).ok_or(RunError::MissingUser)?;
        let session = ctx.session(user_id);

        let service: Arc<dyn PropertyService> = Arc::new(
            HttpPropertyService::new(ctx.client.clone())
                .with_verify_writes(ctx.config.verify_writes),
        );
        let doc = service.get_doc(self.doc_id).await?;

        let dispatcher =
            ActionDispatcher::new(Arc::new(BehaviorRegistry::builtin()), service, None);
        let outcome = dispatcher
            .dispatch_named(
                &self.class_id,
                &self.action_id,
                &session,
                doc.id,
                &doc.properties,
            )
            .await;

        match outcome {
            DispatchOutcome::Applied(result) => Ok(format!(
                "{} on {}: {} = {}",
                self.action_id,
                doc.id,
                result.key,
                serde_json::to_string(&result.value).unwrap_or_default()
            )),
            DispatchOutcome::Failed(message) => Err(RunError::Failed(message)),
            DispatchOutcome::Busy => Err(RunError::Busy),
        }
    }
}
