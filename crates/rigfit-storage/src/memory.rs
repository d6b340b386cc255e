use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rigfit_core::{CategorySlug, CompatibilityRule, Component, ComponentId, SpecificationTemplate, TemplateId};

use crate::error::StoreError;
use crate::traits::{check_rule_templates, CatalogStats, CatalogStore, CatalogWriter};

/// In-memory catalog for tests and small embedded catalogs. Not durable.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    templates: BTreeMap<TemplateId, SpecificationTemplate>,
    components: BTreeMap<ComponentId, Component>,
    rules: Vec<CompatibilityRule>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::backend("in-memory catalog lock poisoned"))
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn fetch_component(&self, id: &ComponentId) -> Result<Option<Component>, StoreError> {
        Ok(self.lock()?.components.get(id).cloned())
    }

    async fn fetch_components(&self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        let inner = self.lock()?;
        Ok(ids.iter().filter_map(|id| inner.components.get(id).cloned()).collect())
    }

    async fn fetch_products_by_category(&self, category: &CategorySlug) -> Result<Vec<Component>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .components
            .values()
            .filter(|c| &c.category == category)
            .cloned()
            .collect())
    }

    async fn fetch_rules_between(
        &self,
        a: &CategorySlug,
        b: &CategorySlug,
    ) -> Result<Vec<CompatibilityRule>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.rules.iter().filter(|r| r.connects(a, b)).cloned().collect())
    }

    async fn fetch_templates(&self, category: Option<&CategorySlug>) -> Result<Vec<SpecificationTemplate>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .templates
            .values()
            .filter(|t| category.map_or(true, |c| &t.category == c))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<CatalogStats, StoreError> {
        let inner = self.lock()?;
        Ok(CatalogStats {
            templates: inner.templates.len(),
            components: inner.components.len(),
            rules: inner.rules.len(),
        })
    }
}

#[async_trait]
impl CatalogWriter for InMemoryCatalog {
    async fn upsert_template(&self, template: SpecificationTemplate) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.templates.get(&template.id) {
            let referencing = inner
                .rules
                .iter()
                .filter(|r| r.template_ids().contains(&&template.id))
                .count();
            if referencing > 0 && existing.redefines(&template) {
                return Err(StoreError::TemplateInUse {
                    template: template.id.to_string(),
                    rules: referencing,
                });
            }
        }
        inner.templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn upsert_component(&self, component: Component) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.components.insert(component.id.clone(), component);
        Ok(())
    }

    async fn upsert_rule(&self, rule: CompatibilityRule) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        check_rule_templates(&rule, |id| inner.templates.get(id).cloned())?;
        match inner.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => *slot = rule,
            None => inner.rules.push(rule),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigfit_core::{DataType, RuleId, RuleType};

    fn template(id: &str, category: &str, name: &str, data_type: DataType) -> SpecificationTemplate {
        SpecificationTemplate {
            id: TemplateId::from_str(id),
            category: CategorySlug::new(category),
            name: name.to_string(),
            data_type,
            enum_values: vec![],
            min_value: None,
            max_value: None,
            is_compatibility_key: true,
        }
    }

    fn socket_rule() -> CompatibilityRule {
        CompatibilityRule {
            id: RuleId::from_str("r-socket"),
            primary_category: "cpu".into(),
            secondary_category: "motherboard".into(),
            primary_template: TemplateId::from_str("t-cpu-socket"),
            secondary_template: TemplateId::from_str("t-mb-socket"),
            rule_type: RuleType::ExactMatch,
            compatible_values: vec![],
            min_value: None,
            max_value: None,
        }
    }

    async fn seeded() -> InMemoryCatalog {
        let store = InMemoryCatalog::new();
        store.upsert_template(template("t-cpu-socket", "cpu", "socket", DataType::Socket)).await.unwrap();
        store.upsert_template(template("t-mb-socket", "motherboard", "socket", DataType::Socket)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_new_creates_empty_catalog() {
        let store = InMemoryCatalog::new();
        assert_eq!(store.stats().await.unwrap(), CatalogStats::default());
        assert!(store.fetch_component(&ComponentId::from_str("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_products_by_category() {
        let store = InMemoryCatalog::new();
        for (id, cat) in [("c1", "cpu"), ("c2", "cpu"), ("m1", "motherboard")] {
            store
                .upsert_component(Component::new(ComponentId::from_str(id), CategorySlug::new(cat)))
                .await
                .unwrap();
        }
        let cpus = store.fetch_products_by_category(&"cpu".into()).await.unwrap();
        assert_eq!(cpus.len(), 2);

        let batch = store
            .fetch_components(&[ComponentId::from_str("m1"), ComponentId::from_str("nope")])
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_rules_match_either_order() {
        let store = seeded().await;
        store.upsert_rule(socket_rule()).await.unwrap();
        assert_eq!(store.fetch_rules_between(&"motherboard".into(), &"cpu".into()).await.unwrap().len(), 1);
        assert_eq!(store.fetch_rules_between(&"cpu".into(), &"motherboard".into()).await.unwrap().len(), 1);
        assert!(store.fetch_rules_between(&"cpu".into(), &"ram".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rule_upsert_replaces_by_id() {
        let store = seeded().await;
        store.upsert_rule(socket_rule()).await.unwrap();
        let mut changed = socket_rule();
        changed.rule_type = RuleType::CompatibleValues;
        store.upsert_rule(changed).await.unwrap();
        let rules = store.fetch_rules_between(&"cpu".into(), &"motherboard".into()).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::CompatibleValues);
    }

    #[tokio::test]
    async fn test_rule_requires_known_templates() {
        let store = InMemoryCatalog::new();
        let err = store.upsert_rule(socket_rule()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRule { .. }));
    }

    #[tokio::test]
    async fn test_rule_template_must_match_category() {
        let store = seeded().await;
        let mut rule = socket_rule();
        rule.secondary_category = "ram".into();
        assert!(matches!(store.upsert_rule(rule).await, Err(StoreError::InvalidRule { .. })));
    }

    #[tokio::test]
    async fn test_referenced_template_cannot_be_redefined() {
        let store = seeded().await;
        store.upsert_rule(socket_rule()).await.unwrap();

        let retyped = template("t-cpu-socket", "cpu", "socket", DataType::Text);
        let err = store.upsert_template(retyped).await.unwrap_err();
        assert!(matches!(err, StoreError::TemplateInUse { rules: 1, .. }));

        let mut widened = template("t-cpu-socket", "cpu", "socket", DataType::Socket);
        widened.enum_values = vec!["AM5".into()];
        store.upsert_template(widened).await.unwrap();
    }
}
