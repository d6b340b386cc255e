use std::collections::{BTreeMap, BTreeSet};

use rigfit_core::{CategorySlug, Component, ComponentId, SpecValue, TemplateId};

/// A templated value as seen by rule evaluation.
#[derive(Clone, Copy, Debug)]
pub struct TemplatedValue<'a> {
    pub name: &'a str,
    pub value: &'a SpecValue,
}

/// Components fetched for one evaluation, indexed by id and by (component, template).
///
/// Built once per call so that pairwise evaluation never goes back to the store.
#[derive(Debug, Default)]
pub struct ComponentIndex {
    components: BTreeMap<ComponentId, Component>,
    by_template: BTreeMap<(ComponentId, TemplateId), String>,
}

impl ComponentIndex {
    pub fn new(components: impl IntoIterator<Item = Component>) -> Self {
        let mut index = Self::default();
        for c in components {
            index.insert(c);
        }
        index
    }

    pub fn insert(&mut self, component: Component) {
        for (name, value) in &component.specifications {
            if let Some(template) = &value.template_id {
                self.by_template
                    .insert((component.id.clone(), template.clone()), name.clone());
            }
        }
        self.components.insert(component.id.clone(), component);
    }

    pub fn get(&self, id: &ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.components.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Value `component` carries for `template`, if any.
    pub fn value(&self, component: &ComponentId, template: &TemplateId) -> Option<TemplatedValue<'_>> {
        let name = self.by_template.get(&(component.clone(), template.clone()))?;
        let value = self.components.get(component)?.specifications.get(name)?;
        Some(TemplatedValue { name, value })
    }

    /// Distinct unordered category pairs among the indexed components.
    pub fn category_pairs(&self) -> BTreeSet<(CategorySlug, CategorySlug)> {
        let components: Vec<&Component> = self.components.values().collect();
        let mut pairs = BTreeSet::new();
        for (i, a) in components.iter().enumerate() {
            for b in &components[i + 1..] {
                pairs.insert(category_pair(&a.category, &b.category));
            }
        }
        pairs
    }
}

/// Canonical (sorted) form of an unordered category pair.
pub fn category_pair(a: &CategorySlug, b: &CategorySlug) -> (CategorySlug, CategorySlug) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
