use std::convert::Infallible;

use clap::Args;

use common::behavior::BehaviorRegistry;

#[derive(Args, Debug, Clone)]
pub struct Actions {
    /// Document class to list actions for
    pub class_id: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Actions {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let registry = BehaviorRegistry::builtin();
        let lines: Vec<String> = registry
            .actions_for_class(&self.class_id)
            .iter()
            .map(|action| format!("{:<20} {}", action.id(), action.label()))
            .collect();
        Ok(lines.join("\n"))
    }
}
