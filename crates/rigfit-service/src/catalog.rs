use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rigfit_core::{CategorySlug, CompatibilityRule, Component, ComponentId, SpecValue, SpecificationTemplate};
use rigfit_storage::CatalogWriter;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Catalog file: templates, components with a flat name -> value mapping, and rules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub templates: Vec<SpecificationTemplate>,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    #[serde(default)]
    pub rules: Vec<CompatibilityRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub category: CategorySlug,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub templates: usize,
    pub components: usize,
    pub rules: usize,
}

/// Read a catalog file. `.json` is parsed as JSON, anything else as YAML.
pub fn load_catalog(path: &Path) -> Result<CatalogFile> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read catalog: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let catalog: CatalogFile = if is_json {
        serde_json::from_str(&s).with_context(|| "parse catalog json")?
    } else {
        serde_yaml::from_str(&s).with_context(|| "parse catalog yaml")?
    };
    Ok(catalog)
}

/// Resolve a record's values against the templates of its category.
///
/// Values named after a template are checked against it and tagged with its id; the
/// rest stay untyped text.
pub fn resolve_component(record: ComponentRecord, templates: &[SpecificationTemplate]) -> Result<Component> {
    let mut component = Component::new(record.id, record.category);
    component.name = record.name;
    for (name, raw) in record.specifications {
        let template = templates
            .iter()
            .find(|t| t.category == component.category && t.name.eq_ignore_ascii_case(name.trim()));
        let value = match template {
            Some(t) => {
                t.check_value(&raw)
                    .map_err(|e| anyhow!("component {}: {e}", component.id))?;
                SpecValue::templated(t, raw)
            }
            None => SpecValue::untyped(raw),
        };
        component.insert_spec(&name, value);
    }
    Ok(component)
}

/// Write `catalog` into `store`: templates first, then components, then rules.
pub async fn import_catalog<W>(store: &W, catalog: CatalogFile) -> Result<ImportSummary>
where
    W: CatalogWriter + ?Sized,
{
    let mut summary = ImportSummary::default();
    for template in &catalog.templates {
        store
            .upsert_template(template.clone())
            .await
            .with_context(|| format!("import template {}", template.id))?;
        summary.templates += 1;
    }

    let known = store.fetch_templates(None).await?;
    for record in catalog.components {
        let component = resolve_component(record, &known)?;
        let id = component.id.clone();
        store
            .upsert_component(component)
            .await
            .with_context(|| format!("import component {id}"))?;
        summary.components += 1;
    }

    for rule in catalog.rules {
        let id = rule.id.clone();
        store.upsert_rule(rule).await.with_context(|| format!("import rule {id}"))?;
        summary.rules += 1;
    }

    info!(
        templates = summary.templates,
        components = summary.components,
        rules = summary.rules,
        "catalog imported"
    );
    Ok(summary)
}
