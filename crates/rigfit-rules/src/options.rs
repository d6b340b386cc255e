use std::time::Duration;

use rigfit_core::AbsencePolicy;
use serde::{Deserialize, Serialize};

/// What a `custom` rule does until custom logic exists.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomRulePolicy {
    /// Logged and skipped.
    #[default]
    Pass,
    /// Fails the pair.
    Block,
}

/// What a timed-out store fetch means for the verdict.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// "Cannot determine", so the affected checks pass.
    #[default]
    AssumeCompatible,
    /// Surface `EngineError::Timeout`, which is retryable.
    Fail,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    pub max_concurrency: usize,
    pub fetch_timeout: Duration,
    pub on_timeout: TimeoutPolicy,
    pub custom_rules: CustomRulePolicy,
    pub absence: AbsencePolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            fetch_timeout: Duration::from_millis(2000),
            on_timeout: TimeoutPolicy::AssumeCompatible,
            custom_rules: CustomRulePolicy::Pass,
            absence: AbsencePolicy::Strict,
        }
    }
}
