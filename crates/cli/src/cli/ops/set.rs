use std::sync::Arc;

use clap::Args;
use uuid::Uuid;

use cadmus_cli::client::HttpPropertyService;
use cadmus_cli::edit::{edit_property, EditError, EditRequest};
use common::field::CommitOutcome;
use common::store::PropertyService;

#[derive(Args, Debug, Clone)]
pub struct Set {
    /// Document to edit
    pub doc_id: Uuid,

    /// Property key
    pub key: String,

    /// New value, stored as text
    pub value: String,

    /// Encrypt the value even if the class schema does not mark it confidential
    #[arg(long)]
    pub confidential: bool,

    /// User to act as (defaults to the configured user)
    #[arg(long)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum SetError {
    #[error("no user id: pass --user-id or set user_id in config")]
    MissingUser,
    #[error(transparent)]
    Edit(#[from] EditError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Set {
    type Error = SetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let user_id = ctx.user_id(self.user_id).ok_or(SetError::MissingUser)?;
        let service: Arc<dyn PropertyService> = Arc::new(
            HttpPropertyService::new(ctx.client.clone())
                .with_verify_writes(ctx.config.verify_writes),
        );

        let report = edit_property(
            service,
            ctx.session(user_id),
            &ctx.config,
            EditRequest {
                doc_id: self.doc_id,
                key: self.key.clone(),
                value: self.value.clone(),
                confidential: self.confidential,
            },
        )
        .await?;

        let mut output = match report.outcome {
            CommitOutcome::Persisted(stored) | CommitOutcome::Superseded(stored)
                if stored.is_encrypted() =>
            {
                format!("{} on {}: stored encrypted", self.key, self.doc_id)
            }
            CommitOutcome::Persisted(_) | CommitOutcome::Superseded(_) => {
                format!("{} on {}: stored", self.key, self.doc_id)
            }
            _ => format!("{} on {}: unchanged", self.key, self.doc_id),
        };
        if let Some(event) = report.aggregation {
            output.push_str(&format!("\n{}: {:?}", event.action_id, event.outcome));
        }
        Ok(output)
    }
}
