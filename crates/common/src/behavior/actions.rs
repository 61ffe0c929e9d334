use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{ActionContext, ActionError, ActionResult, BehaviorAction};
use crate::crypto::FieldCipher;
use crate::property::PropertyValue;

/// Mark a document archived
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveNode;

#[async_trait]
impl BehaviorAction for ArchiveNode {
    fn id(&self) -> &'static str {
        "archive_node"
    }

    fn label(&self) -> &'static str {
        "Archive Artifact"
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError> {
        ctx.write(ActionResult::new("archived", true)).await
    }
}

/// Stamp a note with the local time it was sealed
#[derive(Debug, Default, Clone, Copy)]
pub struct SealNote;

#[async_trait]
impl BehaviorAction for SealNote {
    fn id(&self) -> &'static str {
        "seal_note"
    }

    fn label(&self) -> &'static str {
        "Apply Integrity Seal"
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError> {
        let sealed_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        ctx.write(ActionResult::new("sealed_at", sealed_at)).await
    }
}

/// Sum the `value` property of every direct child into `balance`
///
/// Encrypted child values are decrypted with the session's vault secret; the
/// key is derived once per run. Without a secret, or when a value fails to
/// decrypt, that child counts as zero. Text is read with
/// [`PropertyValue::to_number_lossy`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateBalance;

impl AggregateBalance {
    pub const SOURCE_KEY: &'static str = "value";
    pub const RESULT_KEY: &'static str = "balance";
}

#[async_trait]
impl BehaviorAction for AggregateBalance {
    fn id(&self) -> &'static str {
        "aggregate_balance"
    }

    fn label(&self) -> &'static str {
        "Recalculate Balance"
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError> {
        tracing::info!(doc_id = %ctx.doc_id, "aggregating ledger balance");
        let user_id = ctx.user_id()?;
        let children = ctx.service.get_children(ctx.doc_id, user_id).await?;

        let cipher: OnceCell<FieldCipher> = OnceCell::new();
        let salt = ctx.session.salt();
        let mut total = 0.0;
        for child in &children {
            let Some(value) = child.properties.get(Self::SOURCE_KEY) else {
                continue;
            };

            let amount = match value.as_payload() {
                Some(payload) => {
                    let Some(secret) = ctx.session.vault() else {
                        tracing::debug!(child = %child.id, "vault locked, child counts as zero");
                        continue;
                    };
                    let cipher = cipher
                        .get_or_try_init(|| FieldCipher::derive(secret.expose(), &salt))
                        .await?;
                    PropertyValue::Text(cipher.decrypt(payload.as_str())).to_number_lossy()
                }
                None => value.to_number_lossy(),
            };
            total += amount;
        }

        tracing::info!(doc_id = %ctx.doc_id, children = children.len(), total, "ledger balance computed");
        ctx.write(ActionResult::new(Self::RESULT_KEY, total)).await
    }
}

/// Advance a task's `status` through todo, doing, done and back
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStatus;

impl CycleStatus {
    pub fn next(current: &str) -> &'static str {
        match current.to_lowercase().as_str() {
            "todo" => "doing",
            "doing" => "done",
            _ => "todo",
        }
    }
}

#[async_trait]
impl BehaviorAction for CycleStatus {
    fn id(&self) -> &'static str {
        "cycle_status"
    }

    fn label(&self) -> &'static str {
        "Cycle Status"
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError> {
        let current = ctx
            .properties
            .get("status")
            .and_then(PropertyValue::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("todo");
        let next = Self::next(current);
        tracing::info!(doc_id = %ctx.doc_id, "cycling status {} -> {}", current, next);
        ctx.write(ActionResult::new("status", next)).await
    }
}

/// Average the `progress` of a project's task children
///
/// Rounded to a whole number. With no task children the result is zero and
/// nothing is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateProgress;

fn progress_of(value: Option<&PropertyValue>) -> f64 {
    let n = match value {
        Some(PropertyValue::Number(n)) => *n,
        Some(PropertyValue::Text(text)) if text.trim().is_empty() => 0.0,
        Some(PropertyValue::Text(text)) => text.trim().parse().unwrap_or(0.0),
        Some(PropertyValue::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

#[async_trait]
impl BehaviorAction for AggregateProgress {
    fn id(&self) -> &'static str {
        "aggregate_progress"
    }

    fn label(&self) -> &'static str {
        "Calculate Progress"
    }

    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError> {
        let user_id = ctx.user_id()?;
        let tasks: Vec<_> = ctx
            .service
            .get_children(ctx.doc_id, user_id)
            .await?
            .into_iter()
            .filter(|child| child.class_id.as_deref() == Some("task"))
            .collect();

        if tasks.is_empty() {
            return Ok(ActionResult::new("progress", 0.0));
        }

        let sum: f64 = tasks
            .iter()
            .map(|task| progress_of(task.properties.get("progress")))
            .sum();
        let average = (sum / tasks.len() as f64).round();
        tracing::info!(doc_id = %ctx.doc_id, tasks = tasks.len(), average, "project progress computed");
        ctx.write(ActionResult::new("progress", average)).await
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::crypto;
    use crate::property::PropertyBag;
    use crate::session::{SessionContext, VaultSecret};
    use crate::store::{MemoryPropertyService, WorkspaceNode};

    async fn run(
        action: &dyn BehaviorAction,
        service: &MemoryPropertyService,
        session: &SessionContext,
        doc_id: Uuid,
        properties: &PropertyBag,
    ) -> Result<ActionResult, ActionError> {
        let ctx = ActionContext {
            service,
            session,
            doc_id,
            properties,
        };
        action.execute(&ctx).await
    }

    fn ledger_with(values: &[PropertyValue]) -> (MemoryPropertyService, Uuid) {
        let service = MemoryPropertyService::new();
        let ledger = Uuid::new_v4();
        service.insert(WorkspaceNode::new(ledger, Some("ledger")));
        for value in values {
            service.insert(
                WorkspaceNode::new(Uuid::new_v4(), Some("entry"))
                    .with_parent(ledger)
                    .with_property("value", value.clone()),
            );
        }
        // not a child
        service.insert(WorkspaceNode::new(Uuid::new_v4(), None).with_property("value", "1000"));
        (service, ledger)
    }

    #[tokio::test]
    async fn test_balance_sums_children() {
        let (service, ledger) = ledger_with(&["42".into(), "$10.50".into(), 7.0.into()]);
        let session = SessionContext::new(Uuid::new_v4());

        let result = run(&AggregateBalance, &service, &session, ledger, &PropertyBag::new())
            .await
            .unwrap();

        assert_eq!(result, ActionResult::new("balance", 59.5));
        assert_eq!(service.property(ledger, "balance"), Some(59.5.into()));
        assert_eq!(service.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_is_idempotent() {
        let (service, ledger) = ledger_with(&["1.25".into(), "2.50".into(), "garbage".into()]);
        let session = SessionContext::new(Uuid::new_v4());
        let props = PropertyBag::new();

        let first = run(&AggregateBalance, &service, &session, ledger, &props).await.unwrap();
        let second = run(&AggregateBalance, &service, &session, ledger, &props).await.unwrap();

        assert_eq!(first, second);
        let writes = service.writes_to(ledger, "balance");
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].value, writes[1].value);
        assert_eq!(writes[0].value, PropertyValue::Number(3.75));
    }

    #[tokio::test]
    async fn test_balance_with_mixed_encryption() {
        let user_id = Uuid::new_v4();
        let salt = user_id.to_string();
        let sealed = crypto::encrypt("100.25", "vault", &salt).await.unwrap();
        let foreign = crypto::encrypt("999", "someone else", &salt).await.unwrap();
        let (service, ledger) = ledger_with(&[
            "42".into(),
            "$10.50".into(),
            sealed.clone().into(),
            foreign.into(),
        ]);

        let unlocked = SessionContext::new(user_id).with_vault(VaultSecret::new("vault"));
        let result = run(&AggregateBalance, &service, &unlocked, ledger, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result.value, PropertyValue::Number(152.75));

        // locked: the encrypted children count as zero
        let locked = SessionContext::new(user_id);
        let result = run(&AggregateBalance, &service, &locked, ledger, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result.value, PropertyValue::Number(52.5));
    }

    #[tokio::test]
    async fn test_balance_decrypts_every_sealed_child() {
        let user_id = Uuid::new_v4();
        let salt = user_id.to_string();
        let mut values = Vec::new();
        for amount in ["1.5", "2.5", "6"] {
            values.push(crypto::encrypt(amount, "vault", &salt).await.unwrap().into());
        }
        let (service, ledger) = ledger_with(&values);

        let session = SessionContext::new(user_id).with_vault(VaultSecret::new("vault"));
        let result = run(&AggregateBalance, &service, &session, ledger, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result.value, PropertyValue::Number(10.0));
    }

    #[tokio::test]
    async fn test_balance_without_children_writes_zero() {
        let (service, ledger) = ledger_with(&[]);
        let session = SessionContext::new(Uuid::new_v4());
        let result = run(&AggregateBalance, &service, &session, ledger, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result.value, PropertyValue::Number(0.0));
        assert_eq!(service.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_needs_user() {
        let (service, ledger) = ledger_with(&["1".into()]);
        let session = SessionContext::new(Uuid::nil());
        let result = run(&AggregateBalance, &service, &session, ledger, &PropertyBag::new()).await;
        assert!(matches!(result, Err(ActionError::MissingUser)));
        assert!(service.writes().is_empty());
    }

    #[test]
    fn test_status_cycle() {
        assert_eq!(CycleStatus::next("todo"), "doing");
        assert_eq!(CycleStatus::next("DOING"), "done");
        assert_eq!(CycleStatus::next("done"), "todo");
        assert_eq!(CycleStatus::next("blocked"), "todo");
    }

    #[tokio::test]
    async fn test_cycle_status_defaults_to_todo() {
        let service = MemoryPropertyService::new();
        let task = Uuid::new_v4();
        service.insert(WorkspaceNode::new(task, Some("task")));
        let session = SessionContext::new(Uuid::new_v4());

        let result = run(&CycleStatus, &service, &session, task, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result, ActionResult::new("status", "doing"));
    }

    #[tokio::test]
    async fn test_progress_average() {
        let service = MemoryPropertyService::new();
        let project = Uuid::new_v4();
        service.insert(WorkspaceNode::new(project, Some("project")));
        for progress in [PropertyValue::from(50.0), "25".into(), PropertyValue::Null] {
            service.insert(
                WorkspaceNode::new(Uuid::new_v4(), Some("task"))
                    .with_parent(project)
                    .with_property("progress", progress),
            );
        }
        service.insert(
            WorkspaceNode::new(Uuid::new_v4(), Some("note"))
                .with_parent(project)
                .with_property("progress", 100.0),
        );
        let session = SessionContext::new(Uuid::new_v4());

        let result = run(&AggregateProgress, &service, &session, project, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result, ActionResult::new("progress", 25.0));
        assert_eq!(service.property(project, "progress"), Some(25.0.into()));
    }

    #[tokio::test]
    async fn test_progress_without_tasks_does_not_write() {
        let service = MemoryPropertyService::new();
        let project = Uuid::new_v4();
        service.insert(WorkspaceNode::new(project, Some("project")));
        let session = SessionContext::new(Uuid::new_v4());

        let result = run(&AggregateProgress, &service, &session, project, &PropertyBag::new())
            .await
            .unwrap();
        assert_eq!(result.value, PropertyValue::Number(0.0));
        assert!(service.writes().is_empty());
    }

    #[tokio::test]
    async fn test_seal_and_archive() {
        let service = MemoryPropertyService::new();
        let note = Uuid::new_v4();
        service.insert(WorkspaceNode::new(note, Some("note")));
        let session = SessionContext::new(Uuid::new_v4());
        let props = PropertyBag::new();

        let sealed = run(&SealNote, &service, &session, note, &props).await.unwrap();
        assert_eq!(sealed.key, "sealed_at");
        assert!(!sealed.value.is_blank());

        let archived = run(&ArchiveNode, &service, &session, note, &props).await.unwrap();
        assert_eq!(archived, ActionResult::new("archived", true));
        assert_eq!(service.property(note, "archived"), Some(true.into()));
    }
}
