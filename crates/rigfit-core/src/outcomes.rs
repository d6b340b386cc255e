use serde::{Deserialize, Serialize};

use crate::{ids::*, model::*};

/// A single conflict raised for a pair of components.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub code: ReasonCode,
    pub message: String,
    pub severity: Severity,
}

impl Reason {
    pub fn error(code: ReasonCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), severity: Severity::Error }
    }

    pub fn warn(code: ReasonCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), severity: Severity::Warn }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Heuristic verdict for a candidate. `ok` holds iff no reason has `Error` severity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub ok: bool,
    pub reasons: Vec<Reason>,
}

impl Verdict {
    pub fn from_reasons(reasons: Vec<Reason>) -> Self {
        let ok = !reasons.iter().any(Reason::is_blocking);
        Self { ok, reasons }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Reason> {
        self.reasons.iter().filter(|r| !r.is_blocking())
    }
}

/// Single-pair outcome of the declarative engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub is_compatible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CompatibilityResult {
    pub fn compatible() -> Self {
        Self { is_compatible: true, reason: None }
    }

    pub fn incompatible(reason: impl Into<String>) -> Self {
        Self { is_compatible: false, reason: Some(reason.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompatiblePair {
    pub component1_id: ComponentId,
    pub component2_id: ComponentId,
    pub reason: String,
}

/// Whole-build outcome. Every failing pair is listed; nothing short-circuits across pairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildValidation {
    pub is_compatible: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incompatible_components: Vec<IncompatiblePair>,
    /// SHA-256 of the rules consulted; lets callers spot validations that predate a rule change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_fingerprint: Option<String>,
}

impl BuildValidation {
    pub fn from_pairs(pairs: Vec<IncompatiblePair>, ruleset_fingerprint: Option<String>) -> Self {
        Self {
            is_compatible: pairs.is_empty(),
            incompatible_components: pairs,
            ruleset_fingerprint,
        }
    }
}
