use clap::Args;
use uuid::Uuid;

use common::crypto::{self, CryptoError};

#[derive(Args, Debug, Clone)]
pub struct Encrypt {
    /// Value to seal
    pub plaintext: String,

    /// User whose key to derive (defaults to the configured user)
    #[arg(long)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error("vault is locked: pass --vault-secret or set CADMUS_VAULT_SECRET")]
    Locked,
    #[error("no user id: pass --user-id or set user_id in config")]
    MissingUser,
    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Encrypt {
    type Error = EncryptError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let user_id = ctx.user_id(self.user_id).ok_or(EncryptError::MissingUser)?;
        let secret = ctx.vault.as_ref().ok_or(EncryptError::Locked)?;

        let payload =
            crypto::encrypt(&self.plaintext, secret.expose(), &user_id.to_string()).await?;
        Ok(payload.into_inner())
    }
}
