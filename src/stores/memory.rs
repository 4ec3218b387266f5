//! In-memory template repository for testing, development, and
//! single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::store::{TemplateRepository, UpsertOutcome};
use crate::types::config::StorePolicy;
use crate::types::template::{Template, TemplateStatus};

/// In-memory, domain-keyed template storage.
///
/// All history (stale and deleted templates) is retained for audit.
/// The lock is never held across an await point; mutations are
/// serialized by the write lock, which is strictly stronger than the
/// required per-domain serialization.
pub struct MemoryTemplateStore {
    by_domain: RwLock<HashMap<String, Vec<Template>>>,
    policy: StorePolicy,
}

impl Default for MemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateStore {
    /// Create an empty store with the default lifecycle policy.
    pub fn new() -> Self {
        Self::with_policy(StorePolicy::default())
    }

    /// Create an empty store with a custom lifecycle policy.
    pub fn with_policy(policy: StorePolicy) -> Self {
        Self {
            by_domain: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Total number of stored templates, any status.
    pub fn template_count(&self) -> usize {
        self.by_domain.read().unwrap().values().map(Vec::len).sum()
    }

    fn with_template<T>(&self, id: Uuid, f: impl FnOnce(&mut Template, &StorePolicy) -> T) -> Option<T> {
        let mut domains = self.by_domain.write().unwrap();
        for templates in domains.values_mut() {
            if let Some(template) = templates.iter_mut().find(|t| t.id == id) {
                return Some(f(template, &self.policy));
            }
        }
        None
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateStore {
    async fn upsert(&self, template: Template) -> Result<UpsertOutcome> {
        let mut domains = self.by_domain.write().unwrap();
        let templates = domains.entry(template.domain.clone()).or_default();

        let candidate_id = template.id;
        let active_idx = templates
            .iter()
            .position(|t| t.status == TemplateStatus::Active);

        match active_idx {
            None => {
                info!(
                    domain = %template.domain,
                    template_id = %candidate_id,
                    confidence = template.confidence_score,
                    "installing first active template for domain"
                );
                templates.push(template.with_status(TemplateStatus::Active));
                Ok(UpsertOutcome::Installed { id: candidate_id })
            }
            Some(idx) => {
                if self
                    .policy
                    .replace
                    .replaces(template.confidence_score, templates[idx].confidence_score)
                {
                    info!(
                        domain = %template.domain,
                        new_id = %candidate_id,
                        displaced_id = %templates[idx].id,
                        new_confidence = template.confidence_score,
                        old_confidence = templates[idx].confidence_score,
                        "replacing active template"
                    );
                    templates[idx].status = TemplateStatus::Stale;
                    templates.push(template.with_status(TemplateStatus::Active));
                    Ok(UpsertOutcome::Installed { id: candidate_id })
                } else {
                    debug!(
                        domain = %template.domain,
                        kept_id = %templates[idx].id,
                        "discarding lower-confidence candidate template"
                    );
                    Ok(UpsertOutcome::Discarded {
                        kept: templates[idx].id,
                    })
                }
            }
        }
    }

    async fn get_active(&self, domain: &str) -> Result<Option<Template>> {
        Ok(self
            .by_domain
            .read()
            .unwrap()
            .get(domain)
            .and_then(|ts| ts.iter().find(|t| t.status == TemplateStatus::Active))
            .cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        Ok(self
            .by_domain
            .read()
            .unwrap()
            .values()
            .flatten()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn record_outcome(&self, id: Uuid, success: bool) -> Result<()> {
        self.with_template(id, |template, policy| {
            template.record_outcome(success);

            if template.status == TemplateStatus::Active
                && policy.is_stale(template.usage_count, template.success_rate)
            {
                info!(
                    template_id = %template.id,
                    domain = %template.domain,
                    usage = template.usage_count,
                    success_rate = template.success_rate,
                    "demoting underperforming template to stale"
                );
                template.status = TemplateStatus::Stale;
            }
        });
        Ok(())
    }

    async fn mark_stale(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .with_template(id, |template, policy| {
                if template.status == TemplateStatus::Active
                    && policy.is_stale(template.usage_count, template.success_rate)
                {
                    template.status = TemplateStatus::Stale;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .with_template(id, |template, _| {
                template.status = TemplateStatus::Deleted;
            })
            .is_some())
    }

    async fn list_for_domain(&self, domain: &str) -> Result<Vec<Template>> {
        Ok(self
            .by_domain
            .read()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }
}
