use clap::Args;
use uuid::Uuid;

use cadmus_cli::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// User id to act as; also the key derivation salt
    #[arg(long)]
    pub user_id: Option<Uuid>,

    /// Bearer token for the document API
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Re-fetch documents after every write and warn on mismatch
    #[arg(long)]
    pub verify_writes: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] cadmus_cli::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            remote: ctx.client.remote.clone(),
            user_id: self.user_id,
            auth_token: self.auth_token.clone(),
            verify_writes: self.verify_writes,
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let user = match state.config.user_id {
            Some(id) => id.to_string(),
            None => "unset (pass --user-id per command)".to_string(),
        };

        let output = format!(
            "Initialized cadmus directory at: {}\n\
             - Config: {}\n\
             - Remote: {}\n\
             - User: {}\n\
             - Verify writes: {}",
            state.cadmus_dir.display(),
            state.config_path.display(),
            state.config.remote,
            user,
            state.config.verify_writes,
        );

        Ok(output)
    }
}
