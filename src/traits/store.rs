//! TemplateRepository trait for durable, domain-keyed template storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::template::Template;

/// Outcome of an upsert under the single-active-per-domain policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The template became the domain's active template
    Installed { id: Uuid },

    /// An existing active template won the conflict; the candidate was
    /// not stored
    Discarded { kept: Uuid },
}

impl UpsertOutcome {
    /// Whether the candidate was installed.
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

/// Durable, domain-keyed storage of learned templates.
///
/// The store exclusively owns template lifecycle transitions: callers
/// submit outcome reports and upsert candidates; they never mutate
/// selectors or status directly.
///
/// # Invariant
///
/// At most one template per domain has `status = Active`, after any
/// sequence of operations.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Install a template for its domain, subject to the replacement
    /// policy. If an active template already exists, the candidate wins
    /// only if the policy says its confidence is sufficient; the
    /// displaced template is retained as stale for audit.
    async fn upsert(&self, template: Template) -> Result<UpsertOutcome>;

    /// The active template for a normalized domain, if any. Stale and
    /// deleted templates are never returned.
    async fn get_active(&self, domain: &str) -> Result<Option<Template>>;

    /// Look a template up by id, regardless of status.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>>;

    /// Report one extraction outcome against a template. Updates the
    /// usage statistics and applies the staleness policy.
    async fn record_outcome(&self, id: Uuid, success: bool) -> Result<()>;

    /// Demote the template to stale if the staleness policy's conditions
    /// hold. Returns whether a transition happened.
    async fn mark_stale(&self, id: Uuid) -> Result<bool>;

    /// Manually remove a template. The record is retained with
    /// `status = Deleted`. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// All templates recorded for a domain, any status, for audit.
    async fn list_for_domain(&self, domain: &str) -> Result<Vec<Template>>;
}
