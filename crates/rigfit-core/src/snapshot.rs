use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CategorySlug, Component, ComponentId};

/// Immutable view of the components currently selected, one per category slot.
///
/// The UI owns and mutates the build; engines only ever receive a snapshot.
/// Deselecting a slot never re-validates the others.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
    slots: BTreeMap<CategorySlug, Component>,
}

impl Build {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        let mut build = Self::new();
        for c in components {
            build.select(c);
        }
        build
    }

    /// Put `component` in its category slot, returning whatever it replaced.
    pub fn select(&mut self, component: Component) -> Option<Component> {
        self.slots.insert(component.category.clone(), component)
    }

    pub fn with(mut self, component: Component) -> Self {
        self.select(component);
        self
    }

    pub fn deselect(&mut self, category: &CategorySlug) -> Option<Component> {
        self.slots.remove(category)
    }

    pub fn get(&self, category: &str) -> Option<&Component> {
        self.slots.get(&CategorySlug::new(category))
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.slots.values()
    }

    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.slots.values().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
