use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::accessor::{parse_bool, parse_number};
use crate::error::CoreError;
use crate::{ids::*, model::*};

/// Value of a specification after resolution against its declared type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parsed", rename_all = "snake_case")]
pub enum TypedValue {
    Number(f64),
    Boolean(bool),
    Enum(String),
    Text(String),
}

impl TypedValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Display form used in messages and allow-list comparisons.
    pub fn display(&self) -> String {
        match self {
            TypedValue::Number(n) => format_number(*n),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Enum(s) | TypedValue::Text(s) => s.clone(),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl DataType {
    /// Resolve `raw` into a typed value. Numbers and booleans that do not parse stay text.
    pub fn resolve(&self, raw: &str) -> TypedValue {
        let trimmed = raw.trim();
        match self {
            DataType::Number => parse_number(Some(trimmed))
                .map(TypedValue::Number)
                .unwrap_or_else(|| TypedValue::Text(trimmed.to_string())),
            DataType::Boolean => parse_bool(Some(trimmed))
                .map(TypedValue::Boolean)
                .unwrap_or_else(|| TypedValue::Text(trimmed.to_string())),
            DataType::Enum | DataType::Socket | DataType::MemoryType | DataType::FormFactor => {
                TypedValue::Enum(trimmed.to_string())
            }
            DataType::Text => TypedValue::Text(trimmed.to_string()),
        }
    }
}

/// A specification value, kept both as authored and as resolved at load time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecValue {
    pub raw: String,
    pub typed: TypedValue,
    /// Template the value was authored against, when the catalog is template-driven.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

impl SpecValue {
    pub fn untyped(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let typed = TypedValue::Text(raw.trim().to_string());
        Self { raw, typed, template_id: None }
    }

    pub fn templated(template: &SpecificationTemplate, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            typed: template.data_type.resolve(&raw),
            raw,
            template_id: Some(template.id.clone()),
        }
    }
}

/// A purchasable part.
///
/// Specification names are stored lowercase and are unique per component. A missing
/// key means "unknown".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub category: CategorySlug,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub specifications: BTreeMap<String, SpecValue>,
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

fn lowercase_keys<'de, D>(deserializer: D) -> Result<BTreeMap<String, SpecValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, SpecValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (normalize_key(&k), v)).collect())
}

impl Component {
    pub fn new(id: ComponentId, category: CategorySlug) -> Self {
        Self {
            id,
            category,
            name: None,
            specifications: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_spec(mut self, key: &str, raw: impl Into<String>) -> Self {
        self.insert_spec(key, SpecValue::untyped(raw));
        self
    }

    pub fn with_templated_spec(mut self, template: &SpecificationTemplate, raw: impl Into<String>) -> Self {
        self.insert_spec(&template.name, SpecValue::templated(template, raw));
        self
    }

    pub fn insert_spec(&mut self, key: &str, value: SpecValue) {
        self.specifications.insert(normalize_key(key), value);
    }

    pub fn spec(&self, key: &str) -> Option<&str> {
        self.specifications
            .get(&normalize_key(key))
            .map(|v| v.raw.as_str())
    }

    /// Specification authored against `template`, with its name.
    pub fn spec_for_template(&self, template: &TemplateId) -> Option<(&str, &SpecValue)> {
        self.specifications
            .iter()
            .find(|(_, v)| v.template_id.as_ref() == Some(template))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Named, typed specification defined for a category by an administrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecificationTemplate {
    pub id: TemplateId,
    pub category: CategorySlug,
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub is_compatibility_key: bool,
}

impl SpecificationTemplate {
    /// Resolve `raw` and check it against the template's enum set and numeric bounds.
    pub fn check_value(&self, raw: &str) -> Result<TypedValue, CoreError> {
        let typed = self.data_type.resolve(raw);
        let reject = |reason: String| CoreError::ValueRejected {
            template: self.name.clone(),
            value: raw.to_string(),
            reason,
        };

        match (&typed, self.data_type) {
            (TypedValue::Text(_), DataType::Number) => {
                return Err(reject("expected a number".to_string()));
            }
            (TypedValue::Text(_), DataType::Boolean) => {
                return Err(reject("expected a boolean".to_string()));
            }
            _ => {}
        }

        if self.data_type.is_enumerated() && !self.enum_values.is_empty() {
            let v = typed.display();
            if !self.enum_values.iter().any(|e| e.trim().eq_ignore_ascii_case(&v)) {
                return Err(reject(format!("expected one of [{}]", self.enum_values.join(", "))));
            }
        }

        if let Some(n) = typed.as_number() {
            if let Some(min) = self.min_value {
                if n < min {
                    return Err(reject(format!("below minimum {}", format_number(min))));
                }
            }
            if let Some(max) = self.max_value {
                if n > max {
                    return Err(reject(format!("above maximum {}", format_number(max))));
                }
            }
        }

        Ok(typed)
    }

    /// True when `other` would change how existing values are interpreted.
    pub fn redefines(&self, other: &SpecificationTemplate) -> bool {
        self.name != other.name || self.category != other.category || self.data_type != other.data_type
    }
}

/// Declarative relationship between specifications of two categories.
///
/// Lookup by category pair is unordered. The primary and secondary roles are assigned
/// by category identity when a pair of components is evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub id: RuleId,
    pub primary_category: CategorySlug,
    pub secondary_category: CategorySlug,
    pub primary_template: TemplateId,
    pub secondary_template: TemplateId,
    pub rule_type: RuleType,
    #[serde(default)]
    pub compatible_values: Vec<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl CompatibilityRule {
    pub fn connects(&self, a: &CategorySlug, b: &CategorySlug) -> bool {
        (&self.primary_category == a && &self.secondary_category == b)
            || (&self.primary_category == b && &self.secondary_category == a)
    }

    pub fn template_ids(&self) -> [&TemplateId; 2] {
        [&self.primary_template, &self.secondary_template]
    }
}
