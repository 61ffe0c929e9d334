use std::convert::Infallible;

use clap::Args;

use common::crypto::is_encrypted;

#[derive(Args, Debug, Clone)]
pub struct Probe {
    /// Stored value to classify
    pub value: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Probe {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let verdict = if is_encrypted(&self.value) {
            "encrypted"
        } else {
            "plaintext"
        };
        Ok(verdict.to_string())
    }
}
