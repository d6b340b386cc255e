use std::sync::Arc;

use rigfit_core::{Build, CategorySlug, Component, ComponentId, Verdict};
use rigfit_heuristics::HeuristicEngine;
use rigfit_rules::{EngineError, RuleEngine};
use rigfit_storage::CatalogStore;
use tracing::warn;

/// Narrows a category's products to those that fit the current selection.
///
/// `quick` applies the single derived constraint of the heuristic engine; `exhaustive`
/// runs every declarative rule against every selected component. Both keep anything
/// they cannot decide.
pub struct CandidateFilter<S: ?Sized> {
    engine: Arc<RuleEngine<S>>,
    heuristics: HeuristicEngine,
}

impl<S: CatalogStore + ?Sized> CandidateFilter<S> {
    pub fn new(engine: Arc<RuleEngine<S>>, heuristics: HeuristicEngine) -> Self {
        Self { engine, heuristics }
    }

    pub fn heuristics(&self) -> &HeuristicEngine {
        &self.heuristics
    }

    pub async fn quick(&self, build: &Build, target: &CategorySlug) -> Result<Vec<Component>, EngineError> {
        let products = self.engine.fetch_products(target).await?;
        Ok(self.heuristics.filter_by_derived(&products, build, target.as_str()))
    }

    /// Components of the selection, loaded through the engine. A timed-out load under
    /// `TimeoutPolicy::AssumeCompatible` yields an empty build, which constrains nothing.
    pub async fn build_of(&self, selection: &[ComponentId]) -> Result<Build, EngineError> {
        match self.engine.fetch_components(selection).await? {
            Some(components) => Ok(Build::from_components(components)),
            None => {
                warn!(selected = selection.len(), "selection load timed out, filtering without it");
                Ok(Build::new())
            }
        }
    }

    pub async fn exhaustive(&self, selection: &[ComponentId], target: &CategorySlug) -> Result<Vec<ComponentId>, EngineError> {
        self.engine.get_compatible_components(selection, target).await
    }

    /// Heuristic verdict for placing `candidate` into the selected build.
    pub async fn fit(&self, selection: &[ComponentId], candidate: &ComponentId) -> Result<Verdict, EngineError> {
        let build = self.build_of(selection).await?;
        let candidate = self.engine.fetch_component(candidate).await?;
        Ok(self.heuristics.is_compatible(&build, &candidate))
    }
}
