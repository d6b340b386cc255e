use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rigfit_core::{
    CategorySlug, CompatibilityRule, Component, ComponentId, DataType, RuleId, SpecValue, SpecificationTemplate,
    TemplateId, TypedValue,
};
use rigfit_storage::{check_rule_templates, CatalogStats, CatalogStore, CatalogWriter, StoreError};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

enum ComponentFilter {
    Ids(Vec<String>),
    Category(String),
}

impl SqliteCatalog {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let conn = Connection::open(db_path).with_context(|| format!("open sqlite db {}", db_path.display()))?;
        let catalog = Self::init(conn)?;
        debug!(db = %db_path.display(), "opened sqlite catalog");
        Ok(catalog)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("open in-memory sqlite db")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::backend(format!("sqlite task failed: {e}")))?;
        joined.map_err(into_store_error)
    }
}

/// Recover typed store errors raised inside blocking closures.
fn into_store_error(e: anyhow::Error) -> StoreError {
    match e.downcast::<StoreError>() {
        Ok(store) => store,
        Err(other) => StoreError::Backend(other),
    }
}

fn parse_col<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_col(idx: usize, s: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn template_from_row(r: &Row<'_>) -> rusqlite::Result<SpecificationTemplate> {
    Ok(SpecificationTemplate {
        id: TemplateId::from_str(r.get::<_, String>(0)?),
        category: CategorySlug::new(r.get::<_, String>(1)?),
        name: r.get(2)?,
        data_type: parse_col(3, &r.get::<_, String>(3)?)?,
        enum_values: json_col(4, &r.get::<_, String>(4)?)?,
        min_value: r.get(5)?,
        max_value: r.get(6)?,
        is_compatibility_key: r.get::<_, i64>(7)? != 0,
    })
}

fn rule_from_row(r: &Row<'_>) -> rusqlite::Result<CompatibilityRule> {
    Ok(CompatibilityRule {
        id: RuleId::from_str(r.get::<_, String>(0)?),
        primary_category: CategorySlug::new(r.get::<_, String>(1)?),
        secondary_category: CategorySlug::new(r.get::<_, String>(2)?),
        primary_template: TemplateId::from_str(r.get::<_, String>(3)?),
        secondary_template: TemplateId::from_str(r.get::<_, String>(4)?),
        rule_type: parse_col(5, &r.get::<_, String>(5)?)?,
        compatible_values: json_col(6, &r.get::<_, String>(6)?)?,
        min_value: r.get(7)?,
        max_value: r.get(8)?,
    })
}

const TEMPLATE_COLS: &str =
    "id, category, name, data_type, enum_values_json, min_value, max_value, is_compatibility_key";
const RULE_COLS: &str = "id, primary_category, secondary_category, primary_template, secondary_template, rule_type, compatible_values_json, min_value, max_value";

fn load_template(conn: &Connection, id: &str) -> Result<Option<SpecificationTemplate>> {
    let sql = format!("SELECT {TEMPLATE_COLS} FROM templates WHERE id=?1");
    Ok(conn.query_row(&sql, params![id], template_from_row).optional()?)
}

/// Load components and their specifications, resolving typed values from template data types.
fn load_components(conn: &Connection, filter: ComponentFilter) -> Result<Vec<Component>> {
    let (clause, args) = match filter {
        ComponentFilter::Ids(ids) => {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            let marks = (1..=ids.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
            (format!("c.id IN ({marks})"), ids)
        }
        ComponentFilter::Category(category) => ("c.category = ?1".to_string(), vec![category]),
    };

    let mut components: BTreeMap<String, Component> = BTreeMap::new();
    {
        let sql = format!("SELECT c.id, c.category, c.name FROM components c WHERE {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |r| {
            let mut c = Component::new(
                ComponentId::from_str(r.get::<_, String>(0)?),
                CategorySlug::new(r.get::<_, String>(1)?),
            );
            c.name = r.get(2)?;
            Ok(c)
        })?;
        for row in rows {
            let c = row?;
            components.insert(c.id.0.clone(), c);
        }
    }

    {
        let sql = format!(
            "SELECT s.component_id, s.name, s.raw, s.template_id, t.data_type
             FROM component_specs s
             JOIN components c ON c.id = s.component_id
             LEFT JOIN templates t ON t.id = s.template_id
             WHERE {clause}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |r| {
            let raw: String = r.get(2)?;
            let template_id: Option<String> = r.get(3)?;
            let data_type: Option<String> = r.get(4)?;
            let typed = match data_type {
                Some(dt) => parse_col::<DataType>(4, &dt)?.resolve(&raw),
                None => TypedValue::Text(raw.trim().to_string()),
            };
            let value = SpecValue {
                raw,
                typed,
                template_id: template_id.map(TemplateId::from_str),
            };
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, value))
        })?;
        for row in rows {
            let (component_id, name, value) = row?;
            if let Some(c) = components.get_mut(&component_id) {
                c.insert_spec(&name, value);
            }
        }
    }

    Ok(components.into_values().collect())
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn fetch_component(&self, id: &ComponentId) -> Result<Option<Component>, StoreError> {
        let id = id.0.clone();
        self.with_conn(move |conn| Ok(load_components(conn, ComponentFilter::Ids(vec![id]))?.into_iter().next()))
            .await
    }

    async fn fetch_components(&self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        let wanted: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let order = wanted.clone();
        let loaded = self
            .with_conn(move |conn| load_components(conn, ComponentFilter::Ids(wanted)))
            .await?;
        // keep caller order
        let mut by_id: BTreeMap<String, Component> = loaded.into_iter().map(|c| (c.id.0.clone(), c)).collect();
        Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn fetch_products_by_category(&self, category: &CategorySlug) -> Result<Vec<Component>, StoreError> {
        let category = category.as_str().to_string();
        self.with_conn(move |conn| load_components(conn, ComponentFilter::Category(category)))
            .await
    }

    async fn fetch_rules_between(
        &self,
        a: &CategorySlug,
        b: &CategorySlug,
    ) -> Result<Vec<CompatibilityRule>, StoreError> {
        let (a, b) = (a.as_str().to_string(), b.as_str().to_string());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {RULE_COLS} FROM rules
                 WHERE (primary_category=?1 AND secondary_category=?2)
                    OR (primary_category=?2 AND secondary_category=?1)
                 ORDER BY ordinal"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![a, b], rule_from_row)?;
            let mut rules = vec![];
            for row in rows {
                rules.push(row?);
            }
            Ok(rules)
        })
        .await
    }

    async fn fetch_templates(&self, category: Option<&CategorySlug>) -> Result<Vec<SpecificationTemplate>, StoreError> {
        let category = category.map(|c| c.as_str().to_string());
        self.with_conn(move |conn| {
            let mut templates = vec![];
            match category {
                Some(cat) => {
                    let sql = format!("SELECT {TEMPLATE_COLS} FROM templates WHERE category=?1 ORDER BY id");
                    let mut stmt = conn.prepare(&sql)?;
                    for row in stmt.query_map(params![cat], template_from_row)? {
                        templates.push(row?);
                    }
                }
                None => {
                    let sql = format!("SELECT {TEMPLATE_COLS} FROM templates ORDER BY id");
                    let mut stmt = conn.prepare(&sql)?;
                    for row in stmt.query_map([], template_from_row)? {
                        templates.push(row?);
                    }
                }
            }
            Ok(templates)
        })
        .await
    }

    async fn stats(&self) -> Result<CatalogStats, StoreError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<usize> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(1) FROM {table}"), [], |r| r.get(0))?;
                Ok(n as usize)
            };
            Ok(CatalogStats {
                templates: count("templates")?,
                components: count("components")?,
                rules: count("rules")?,
            })
        })
        .await
    }
}

#[async_trait]
impl CatalogWriter for SqliteCatalog {
    async fn upsert_template(&self, template: SpecificationTemplate) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if let Some(existing) = load_template(&tx, template.id.as_str())? {
                let referencing: i64 = tx.query_row(
                    "SELECT COUNT(1) FROM rules WHERE primary_template=?1 OR secondary_template=?1",
                    params![template.id.as_str()],
                    |r| r.get(0),
                )?;
                if referencing > 0 && existing.redefines(&template) {
                    return Err(StoreError::TemplateInUse {
                        template: template.id.to_string(),
                        rules: referencing as usize,
                    }
                    .into());
                }
            }
            tx.execute(
                "INSERT INTO templates(id, category, name, data_type, enum_values_json, min_value, max_value, is_compatibility_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   category=excluded.category, name=excluded.name, data_type=excluded.data_type,
                   enum_values_json=excluded.enum_values_json, min_value=excluded.min_value,
                   max_value=excluded.max_value, is_compatibility_key=excluded.is_compatibility_key",
                params![
                    template.id.as_str(),
                    template.category.as_str(),
                    template.name,
                    template.data_type.as_str(),
                    serde_json::to_string(&template.enum_values)?,
                    template.min_value,
                    template.max_value,
                    template.is_compatibility_key as i64
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_component(&self, component: Component) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO components(id, category, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET category=excluded.category, name=excluded.name",
                params![component.id.as_str(), component.category.as_str(), component.name],
            )?;
            tx.execute("DELETE FROM component_specs WHERE component_id=?1", params![component.id.as_str()])?;
            for (name, value) in &component.specifications {
                tx.execute(
                    "INSERT INTO component_specs(component_id, name, raw, template_id) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        component.id.as_str(),
                        name,
                        value.raw,
                        value.template_id.as_ref().map(|t| t.as_str())
                    ],
                )
                .with_context(|| format!("insert specification {name} of {}", component.id))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_rule(&self, rule: CompatibilityRule) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let known = [
                load_template(&tx, rule.primary_template.as_str())?,
                load_template(&tx, rule.secondary_template.as_str())?,
            ];
            check_rule_templates(&rule, |id| known.iter().flatten().find(|t| &t.id == id).cloned())?;

            let existing: Option<i64> = tx
                .query_row("SELECT ordinal FROM rules WHERE id=?1", params![rule.id.as_str()], |r| r.get(0))
                .optional()?;
            let ordinal = match existing {
                Some(o) => o,
                None => tx.query_row("SELECT COALESCE(MAX(ordinal), 0) + 1 FROM rules", [], |r| r.get(0))?,
            };
            tx.execute(
                "INSERT OR REPLACE INTO rules(id, ordinal, primary_category, secondary_category, primary_template, secondary_template, rule_type, compatible_values_json, min_value, max_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    rule.id.as_str(),
                    ordinal,
                    rule.primary_category.as_str(),
                    rule.secondary_category.as_str(),
                    rule.primary_template.as_str(),
                    rule.secondary_template.as_str(),
                    rule.rule_type.as_str(),
                    serde_json::to_string(&rule.compatible_values)?,
                    rule.min_value,
                    rule.max_value
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
