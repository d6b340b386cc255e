use async_trait::async_trait;
use rigfit_core::{CategorySlug, CompatibilityRule, Component, ComponentId, SpecificationTemplate, TemplateId};

use crate::error::StoreError;

/// Read side of the catalog, as the compatibility engines see it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Component with all its specifications, or `None` when the id is unknown.
    async fn fetch_component(&self, id: &ComponentId) -> Result<Option<Component>, StoreError>;

    /// Batch form of `fetch_component`. Unknown ids are skipped.
    async fn fetch_components(&self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(c) = self.fetch_component(id).await? {
                out.push(c);
            }
        }
        Ok(out)
    }

    async fn fetch_products_by_category(&self, category: &CategorySlug) -> Result<Vec<Component>, StoreError>;

    /// Rules linking `a` and `b` in either direction, in authoring order.
    async fn fetch_rules_between(
        &self,
        a: &CategorySlug,
        b: &CategorySlug,
    ) -> Result<Vec<CompatibilityRule>, StoreError>;

    async fn fetch_templates(&self, category: Option<&CategorySlug>) -> Result<Vec<SpecificationTemplate>, StoreError>;

    async fn stats(&self) -> Result<CatalogStats, StoreError>;
}

/// Administrative writes used by catalog import and tests.
#[async_trait]
pub trait CatalogWriter: CatalogStore {
    /// Insert or replace a template. Redefining one that rules reference fails with
    /// `StoreError::TemplateInUse`.
    async fn upsert_template(&self, template: SpecificationTemplate) -> Result<(), StoreError>;

    async fn upsert_component(&self, component: Component) -> Result<(), StoreError>;

    /// Insert or replace a rule. Both templates must exist and belong to the rule's categories.
    async fn upsert_rule(&self, rule: CompatibilityRule) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub templates: usize,
    pub components: usize,
    pub rules: usize,
}

/// Shared rule validation for writers.
pub fn check_rule_templates(
    rule: &CompatibilityRule,
    lookup: impl Fn(&TemplateId) -> Option<SpecificationTemplate>,
) -> Result<(), StoreError> {
    let sides = [
        (&rule.primary_template, &rule.primary_category),
        (&rule.secondary_template, &rule.secondary_category),
    ];
    for (template_id, category) in sides {
        let template = lookup(template_id).ok_or_else(|| StoreError::InvalidRule {
            rule: rule.id.to_string(),
            reason: format!("unknown specification template {template_id}"),
        })?;
        if &template.category != category {
            return Err(StoreError::InvalidRule {
                rule: rule.id.to_string(),
                reason: format!(
                    "template {template_id} belongs to {}, not {category}",
                    template.category
                ),
            });
        }
    }
    Ok(())
}
