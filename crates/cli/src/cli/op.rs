use std::error::Error;
use std::path::PathBuf;

use url::Url;
use uuid::Uuid;

use cadmus_cli::client::{ApiClient, ApiError};
use cadmus_cli::state::{AppConfig, AppState};
use common::session::{SessionContext, VaultSecret};

/// Resolve the remote URL for the API client.
///
/// Priority: explicit `--remote` flag > config file `remote` > built-in default.
pub fn resolve_remote(explicit: Option<Url>, config: &AppConfig) -> Url {
    explicit.unwrap_or_else(|| config.remote.clone())
}

/// Load the config if one exists, falling back to defaults
pub fn load_config(config_path: Option<PathBuf>) -> AppConfig {
    match AppState::load(config_path) {
        Ok(state) => state.config,
        Err(_) => AppConfig::default(),
    }
}

#[derive(Clone)]
pub struct OpContext {
    /// API client (always initialized with default or custom URL)
    pub client: ApiClient,
    /// Optional custom config path (defaults to ~/.cadmus)
    pub config_path: Option<PathBuf>,
    /// Config as loaded, or defaults when uninitialized
    pub config: AppConfig,
    /// Held in memory for the lifetime of the command only
    pub vault: Option<VaultSecret>,
}

impl OpContext {
    pub fn new(
        remote: Url,
        config_path: Option<PathBuf>,
        config: AppConfig,
        vault_secret: Option<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(&remote, config.auth_token.as_deref())?,
            config_path,
            config,
            vault: vault_secret.and_then(VaultSecret::new),
        })
    }

    /// The acting user: an explicit id wins over the configured one
    pub fn user_id(&self, explicit: Option<Uuid>) -> Option<Uuid> {
        explicit.or(self.config.user_id)
    }

    pub fn session(&self, user_id: Uuid) -> SessionContext {
        SessionContext::new(user_id).with_vault(self.vault.clone())
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
