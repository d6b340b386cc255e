use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use rigfit_core::{
    BuildValidation, CategorySlug, CompatibilityResult, CompatibilityRule, Component, ComponentId, IncompatiblePair,
};
use rigfit_storage::{CatalogStore, StoreError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::evaluate::evaluate_pair;
use crate::fingerprint::ruleset_fingerprint;
use crate::index::{category_pair, ComponentIndex};
use crate::options::{EngineOptions, TimeoutPolicy};

type CategoryPair = (CategorySlug, CategorySlug);

/// Rules fetched per unordered category pair. `None` marks a pair whose fetch timed out
/// under `TimeoutPolicy::AssumeCompatible`.
#[derive(Debug, Default)]
struct RuleTable {
    pairs: BTreeMap<CategoryPair, Option<Vec<CompatibilityRule>>>,
}

impl RuleTable {
    fn for_pair(&self, a: &CategorySlug, b: &CategorySlug) -> Option<&[CompatibilityRule]> {
        self.pairs.get(&category_pair(a, b))?.as_deref()
    }

    fn consulted(&self) -> impl Iterator<Item = &CompatibilityRule> {
        self.pairs.values().flatten().flatten()
    }
}

/// Declarative rule engine over a catalog store.
///
/// Every store call, including the public `fetch_*` reads, goes through one semaphore,
/// so `max_concurrency` bounds the fetches in flight across all concurrent calls on the
/// same engine. Each fetch is subject to `fetch_timeout`.
pub struct RuleEngine<S: ?Sized> {
    store: Arc<S>,
    options: EngineOptions,
    limiter: Arc<Semaphore>,
}

impl<S: CatalogStore + ?Sized> RuleEngine<S> {
    pub fn new(store: Arc<S>, options: EngineOptions) -> Self {
        let limiter = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        Self { store, options, limiter }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    async fn fetch<T, F>(&self, what: &str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| StoreError::backend("fetch limiter closed"))?;
        match tokio::time::timeout(self.options.fetch_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(what = %what, error = %e, "catalog fetch failed");
                Err(e.into())
            }
            Err(_) => Err(EngineError::Timeout {
                what: what.to_string(),
                after_ms: self.options.fetch_timeout.as_millis() as u64,
            }),
        }
    }

    /// Like `fetch`, but a timeout becomes `None` under `TimeoutPolicy::AssumeCompatible`.
    async fn fetch_or_assume<T, F>(&self, what: &str, fut: F) -> Result<Option<T>, EngineError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.fetch(what, fut).await {
            Ok(value) => Ok(Some(value)),
            Err(EngineError::Timeout { what, after_ms }) if self.options.on_timeout == TimeoutPolicy::AssumeCompatible => {
                warn!(what = %what, after_ms, "catalog fetch timed out, assuming compatible");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Products of `target`. A timeout is an error whatever the policy, since there is
    /// nothing to assume compatible.
    pub async fn fetch_products(&self, target: &CategorySlug) -> Result<Vec<Component>, EngineError> {
        let what = format!("products in {target}");
        self.fetch(&what, self.store.fetch_products_by_category(target)).await
    }

    pub async fn fetch_component(&self, id: &ComponentId) -> Result<Component, EngineError> {
        self.fetch("component", self.store.fetch_component(id))
            .await?
            .ok_or_else(|| EngineError::ComponentNotFound(id.clone()))
    }

    /// Batch-fetch `ids`, failing on the first id the catalog does not know.
    ///
    /// `None` means the fetch timed out under `TimeoutPolicy::AssumeCompatible`.
    pub async fn fetch_components(&self, ids: &[ComponentId]) -> Result<Option<Vec<Component>>, EngineError> {
        let Some(found) = self.fetch_or_assume("components", self.store.fetch_components(ids)).await? else {
            return Ok(None);
        };
        let known: BTreeSet<&ComponentId> = found.iter().map(|c| &c.id).collect();
        if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(EngineError::ComponentNotFound(missing.clone()));
        }
        Ok(Some(found))
    }

    /// Fetch rules for every pair concurrently, bounded by the limiter.
    async fn rules_for_pairs(&self, pairs: BTreeSet<CategoryPair>) -> Result<RuleTable, EngineError> {
        let mut pending = FuturesUnordered::new();
        for (a, b) in pairs {
            pending.push(async move {
                let what = format!("rules between {a} and {b}");
                let rules = self.fetch_or_assume(&what, self.store.fetch_rules_between(&a, &b)).await;
                ((a, b), rules)
            });
        }

        let mut table = RuleTable::default();
        while let Some((pair, rules)) = pending.next().await {
            table.pairs.insert(pair, rules?);
        }
        Ok(table)
    }

    /// Check two components against every rule between their categories, in rule order.
    pub async fn check_component_compatibility(
        &self,
        a: &ComponentId,
        b: &ComponentId,
    ) -> Result<CompatibilityResult, EngineError> {
        if a == b {
            return Ok(CompatibilityResult::compatible());
        }
        let (first, second) = tokio::join!(
            self.fetch_or_assume("first component", self.store.fetch_component(a)),
            self.fetch_or_assume("second component", self.store.fetch_component(b)),
        );
        let (Some(first), Some(second)) = (first?, second?) else {
            return Ok(CompatibilityResult::compatible());
        };
        let first = first.ok_or_else(|| EngineError::ComponentNotFound(a.clone()))?;
        let second = second.ok_or_else(|| EngineError::ComponentNotFound(b.clone()))?;

        let what = format!("rules between {} and {}", first.category, second.category);
        let Some(rules) = self
            .fetch_or_assume(&what, self.store.fetch_rules_between(&first.category, &second.category))
            .await?
        else {
            return Ok(CompatibilityResult::compatible());
        };

        let index = ComponentIndex::new([first.clone(), second.clone()]);
        Ok(evaluate_pair(&rules, &first, &second, &index, &self.options))
    }

    /// Ids of the `target` products compatible with every selected component.
    ///
    /// Specifications and rules are fetched once up front; candidates are then evaluated
    /// in memory. With nothing selected every product qualifies.
    pub async fn get_compatible_components(
        &self,
        selection: &[ComponentId],
        target: &CategorySlug,
    ) -> Result<Vec<ComponentId>, EngineError> {
        let candidates = self.fetch_products(target).await?;
        if selection.is_empty() {
            return Ok(candidates.into_iter().map(|c| c.id).collect());
        }
        let Some(selected) = self.fetch_components(selection).await? else {
            return Ok(candidates.into_iter().map(|c| c.id).collect());
        };

        let pairs = candidates
            .iter()
            .flat_map(|c| selected.iter().map(|s| category_pair(&c.category, &s.category)))
            .collect();
        let table = self.rules_for_pairs(pairs).await?;
        let index = ComponentIndex::new(selected.iter().chain(candidates.iter()).cloned());

        let compatible: Vec<ComponentId> = candidates
            .iter()
            .filter(|candidate| {
                selected.iter().filter(|s| s.id != candidate.id).all(|s| {
                    table
                        .for_pair(&candidate.category, &s.category)
                        .map_or(true, |rules| evaluate_pair(rules, candidate, s, &index, &self.options).is_compatible)
                })
            })
            .map(|c| c.id.clone())
            .collect();
        debug!(
            category = %target,
            candidates = candidates.len(),
            compatible = compatible.len(),
            "compatible components"
        );
        Ok(compatible)
    }

    /// Check every unordered pair of the build and report all failing pairs.
    pub async fn validate_configuration(&self, ids: &[ComponentId]) -> Result<BuildValidation, EngineError> {
        let mut seen = BTreeSet::new();
        let unique: Vec<ComponentId> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        if unique.len() < 2 {
            return Ok(BuildValidation::from_pairs(vec![], Some(ruleset_fingerprint([]))));
        }
        let Some(components) = self.fetch_components(&unique).await? else {
            return Ok(BuildValidation::from_pairs(vec![], None));
        };

        let index = ComponentIndex::new(components.iter().cloned());
        let table = self.rules_for_pairs(index.category_pairs()).await?;

        let mut failures = Vec::new();
        for (i, a) in components.iter().enumerate() {
            for b in &components[i + 1..] {
                let Some(rules) = table.for_pair(&a.category, &b.category) else {
                    continue;
                };
                let result = evaluate_pair(rules, a, b, &index, &self.options);
                if !result.is_compatible {
                    failures.push(IncompatiblePair {
                        component1_id: a.id.clone(),
                        component2_id: b.id.clone(),
                        reason: result.reason.unwrap_or_default(),
                    });
                }
            }
        }
        debug!(components = components.len(), failures = failures.len(), "validated configuration");
        Ok(BuildValidation::from_pairs(failures, Some(ruleset_fingerprint(table.consulted()))))
    }
}
