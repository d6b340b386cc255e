use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// `Error` blocks a build; `Warn` is advisory only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Error,
}

/// Machine-readable conflict codes produced by the heuristic rule set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    SocketMismatch,
    RamType,
    CaseFormFactor,
    PsuWattage,
    MissingSpec,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::SocketMismatch => "socket_mismatch",
            ReasonCode::RamType => "ram_type",
            ReasonCode::CaseFormFactor => "case_form_factor",
            ReasonCode::PsuWattage => "psu_wattage",
            ReasonCode::MissingSpec => "missing_spec",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an engine concludes when a rule's inputs are missing.
///
/// `Permissive` treats missing data as "cannot determine" and raises nothing.
/// `Strict` turns it into a blocking incompatibility.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    Permissive,
    Strict,
}

/// Declared type of a specification template.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Enum,
    Socket,
    MemoryType,
    FormFactor,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Enum => "enum",
            DataType::Socket => "socket",
            DataType::MemoryType => "memory_type",
            DataType::FormFactor => "form_factor",
        }
    }

    /// Enumerated kinds: values come from a closed vocabulary.
    pub fn is_enumerated(&self) -> bool {
        matches!(
            self,
            DataType::Enum | DataType::Socket | DataType::MemoryType | DataType::FormFactor
        )
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" => Ok(DataType::Text),
            "number" => Ok(DataType::Number),
            "boolean" => Ok(DataType::Boolean),
            "enum" => Ok(DataType::Enum),
            "socket" => Ok(DataType::Socket),
            "memory_type" => Ok(DataType::MemoryType),
            "form_factor" => Ok(DataType::FormFactor),
            other => Err(CoreError::UnknownDataType(other.to_string())),
        }
    }
}

/// Semantics of a declarative compatibility rule.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ExactMatch,
    CompatibleValues,
    RangeCheck,
    Custom,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::ExactMatch => "exact_match",
            RuleType::CompatibleValues => "compatible_values",
            RuleType::RangeCheck => "range_check",
            RuleType::Custom => "custom",
        }
    }
}

impl FromStr for RuleType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact_match" => Ok(RuleType::ExactMatch),
            "compatible_values" => Ok(RuleType::CompatibleValues),
            "range_check" => Ok(RuleType::RangeCheck),
            "custom" => Ok(RuleType::Custom),
            other => Err(CoreError::UnknownRuleType(other.to_string())),
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
