use rigfit_core::{get_spec_any, list_includes, parse_number, AbsencePolicy, Build, Component, Reason, Verdict};
use tracing::debug;

use crate::rule::{default_rules, HeuristicRule};
use crate::slots::*;

/// Zero-configuration compatibility checks over the fixed rule table.
pub struct HeuristicEngine {
    rules: Vec<Box<dyn HeuristicRule>>,
    absence: AbsencePolicy,
}

impl Default for HeuristicEngine {
    fn default() -> Self {
        Self::new(AbsencePolicy::Permissive)
    }
}

impl HeuristicEngine {
    pub fn new(absence: AbsencePolicy) -> Self {
        Self { rules: default_rules(), absence }
    }

    pub fn absence(&self) -> AbsencePolicy {
        self.absence
    }

    /// Evaluate `candidate` against every occupied slot other than its own.
    pub fn is_compatible(&self, build: &Build, candidate: &Component) -> Verdict {
        let mut reasons = Vec::new();
        for occupant in build.components() {
            if occupant.category == candidate.category || occupant.id == candidate.id {
                continue;
            }
            for rule in self.rules.iter().filter(|r| r.applies(&candidate.category, &occupant.category)) {
                reasons.extend(rule.eval(candidate, occupant, self.absence));
            }
        }
        let verdict = Verdict::from_reasons(reasons);
        debug!(
            candidate = %candidate.id,
            ok = verdict.ok,
            reasons = verdict.reasons.len(),
            "heuristic check"
        );
        verdict
    }

    /// Narrow `products` for `target` using the single most relevant upstream constraint.
    ///
    /// Anything that cannot be decided is kept.
    pub fn filter_by_derived(&self, products: &[Component], build: &Build, target: &str) -> Vec<Component> {
        filter_by_derived(products, build, target)
    }
}

/// `HeuristicEngine::default().is_compatible(..)`.
pub fn is_compatible(build: &Build, candidate: &Component) -> Verdict {
    HeuristicEngine::default().is_compatible(build, candidate)
}

fn same_token(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn keep_matching(products: &[Component], wanted: Option<&str>, keys: &[&str]) -> Vec<Component> {
    products
        .iter()
        .filter(|p| match (wanted, get_spec_any(Some(*p), keys)) {
            (Some(w), Some(v)) => same_token(w, v),
            _ => true,
        })
        .cloned()
        .collect()
}

/// Fast narrowing pass: socket for CPUs and motherboards, memory type for RAM, form
/// factor for cases, wattage for PSUs. Other categories pass through untouched.
pub fn filter_by_derived(products: &[Component], build: &Build, target: &str) -> Vec<Component> {
    let target = target.trim().to_ascii_lowercase();
    let filtered = match target.as_str() {
        MOTHERBOARD => keep_matching(products, get_spec_any(build.get(CPU), SOCKET), SOCKET),
        CPU => keep_matching(products, get_spec_any(build.get(MOTHERBOARD), SOCKET), SOCKET),
        RAM => keep_matching(products, get_spec_any(build.get(MOTHERBOARD), BOARD_MEMORY_TYPE), RAM_TYPE),
        CASE => {
            let form_factor = get_spec_any(build.get(MOTHERBOARD), BOARD_FORM_FACTOR);
            products
                .iter()
                .filter(|p| list_includes(get_spec_any(Some(*p), CASE_BOARD_SUPPORT), form_factor) != Some(false))
                .cloned()
                .collect()
        }
        PSU => match parse_number(get_spec_any(build.get(GPU), GPU_POWER)) {
            Some(power) => {
                let required = required_psu_wattage(power);
                products
                    .iter()
                    .filter(|p| parse_number(get_spec_any(Some(*p), PSU_WATTAGE)).map_or(true, |w| w >= required))
                    .cloned()
                    .collect()
            }
            None => products.to_vec(),
        },
        _ => products.to_vec(),
    };
    debug!(category = %target, before = products.len(), after = filtered.len(), "derived filter");
    filtered
}

/// Messages of `reasons`, in order, for display.
pub fn explain_conflicts(reasons: &[Reason]) -> Vec<String> {
    reasons.iter().map(|r| r.message.clone()).collect()
}
