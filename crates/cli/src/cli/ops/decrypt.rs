use clap::Args;
use uuid::Uuid;

use common::crypto;

#[derive(Args, Debug, Clone)]
pub struct Decrypt {
    /// Encrypted payload as stored
    pub payload: String,

    /// User whose key to derive (defaults to the configured user)
    #[arg(long)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("no user id: pass --user-id or set user_id in config")]
    MissingUser,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Decrypt {
    type Error = DecryptError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let user_id = ctx.user_id(self.user_id).ok_or(DecryptError::MissingUser)?;
        // a locked vault decrypts to the sentinel like any other failure
        let secret = ctx.vault.as_ref().map(|s| s.expose()).unwrap_or_default();

        Ok(crypto::decrypt(&self.payload, secret, &user_id.to_string()).await)
    }
}
