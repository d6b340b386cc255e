use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rigfit_core::{BuildValidation, CategorySlug, CompatibilityResult, ComponentId, Verdict};
use rigfit_heuristics::HeuristicEngine;
use rigfit_rules::RuleEngine;
use rigfit_storage::{CatalogStats, CatalogStore};
use rigfit_storage_sqlite::SqliteCatalog;

use crate::candidates::CandidateFilter;
use crate::catalog::{import_catalog, load_catalog, ImportSummary};
use crate::validator::ConfigurationValidator;
use crate::Config;

/// Everything the CLI needs, wired from `<root>/.rigfit/rigfit.toml`.
pub struct CompatibilityService {
    pub root: PathBuf,
    pub cfg: Config,
    pub store: Arc<SqliteCatalog>,
    engine: Arc<RuleEngine<SqliteCatalog>>,
    validator: ConfigurationValidator<SqliteCatalog>,
    filter: CandidateFilter<SqliteCatalog>,
}

impl CompatibilityService {
    pub fn open(root: PathBuf) -> Result<Self> {
        let cfg_path = Config::config_path(&root);
        let cfg = if cfg_path.exists() {
            Config::load_from(&cfg_path)?
        } else {
            let cfg = Config::default();
            cfg.save_to(&cfg_path)?;
            cfg
        };
        let store = Arc::new(SqliteCatalog::open(&cfg.db_path(&root))?);
        Ok(Self::with_store(root, cfg, store))
    }

    pub fn with_store(root: PathBuf, cfg: Config, store: Arc<SqliteCatalog>) -> Self {
        let engine = Arc::new(RuleEngine::new(Arc::clone(&store), cfg.engine_options()));
        let validator = ConfigurationValidator::new(Arc::clone(&engine));
        let filter = CandidateFilter::new(Arc::clone(&engine), HeuristicEngine::new(cfg.heuristics.absence));
        Self { root, cfg, store, engine, validator, filter }
    }

    /// Create `.rigfit/`, a default config and an empty catalog if they do not exist.
    pub fn init(root: &Path) -> Result<()> {
        let cfg_path = Config::config_path(root);
        let cfg = if cfg_path.exists() {
            Config::load_from(&cfg_path)?
        } else {
            let cfg = Config::default();
            cfg.save_to(&cfg_path)?;
            cfg
        };
        SqliteCatalog::open(&cfg.db_path(root))?;
        Ok(())
    }

    pub async fn import(&self, path: &Path) -> Result<ImportSummary> {
        let catalog = load_catalog(path)?;
        import_catalog(self.store.as_ref(), catalog).await
    }

    pub async fn check(&self, a: &ComponentId, b: &ComponentId) -> Result<CompatibilityResult> {
        Ok(self.engine.check_component_compatibility(a, b).await?)
    }

    pub async fn validate(&self, ids: &[ComponentId]) -> BuildValidation {
        self.validator.validate(ids).await
    }

    /// Compatible products in `category`. `quick` uses the derived heuristic filter.
    pub async fn candidates(
        &self,
        category: &CategorySlug,
        selected: &[ComponentId],
        quick: bool,
    ) -> Result<Vec<ComponentId>> {
        if quick {
            let build = self.filter.build_of(selected).await?;
            let products = self.filter.quick(&build, category).await?;
            Ok(products.into_iter().map(|c| c.id).collect())
        } else {
            Ok(self.filter.exhaustive(selected, category).await?)
        }
    }

    /// Heuristic verdict for `candidate` against the selected build.
    pub async fn fit(&self, candidate: &ComponentId, selected: &[ComponentId]) -> Result<Verdict> {
        Ok(self.filter.fit(selected, candidate).await?)
    }

    pub async fn status(&self) -> Result<CatalogStats> {
        Ok(self.store.stats().await?)
    }
}
