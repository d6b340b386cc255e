use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rigfit_core::AbsencePolicy;
use rigfit_rules::{CustomRulePolicy, EngineOptions, TimeoutPolicy};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Relative paths resolve against the root; `~` is expanded.
    pub db_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { db_path: ".rigfit/catalog.db".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrency: usize,
    pub fetch_timeout_ms: u64,
    pub on_timeout: TimeoutPolicy,
    pub custom_rules: CustomRulePolicy,
    pub absence: AbsencePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = EngineOptions::default();
        Self {
            max_concurrency: defaults.max_concurrency,
            fetch_timeout_ms: defaults.fetch_timeout.as_millis() as u64,
            on_timeout: defaults.on_timeout,
            custom_rules: defaults.custom_rules,
            absence: defaults.absence,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    pub absence: AbsencePolicy,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self { absence: AbsencePolicy::Permissive }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| "parse rigfit.toml")?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".rigfit").join("rigfit.toml")
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&self.catalog.db_path).to_string());
        if expanded.is_absolute() {
            expanded
        } else {
            root.join(expanded)
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_concurrency: self.engine.max_concurrency,
            fetch_timeout: Duration::from_millis(self.engine.fetch_timeout_ms),
            on_timeout: self.engine.on_timeout,
            custom_rules: self.engine.custom_rules,
            absence: self.engine.absence,
        }
    }
}
