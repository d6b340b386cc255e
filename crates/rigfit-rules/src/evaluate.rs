use rigfit_core::{
    format_number, parse_number, AbsencePolicy, CompatibilityResult, CompatibilityRule, Component, RuleType,
    TypedValue,
};
use tracing::{debug, warn};

use crate::index::{ComponentIndex, TemplatedValue};
use crate::options::{CustomRulePolicy, EngineOptions};

pub const MISSING_SPEC_REASON: &str = "missing required specification for compatibility check";
pub const CUSTOM_BLOCKED_REASON: &str = "custom compatibility rules are not supported";

fn same_token(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn values_equal(a: &TypedValue, b: &TypedValue) -> bool {
    match (a, b) {
        (TypedValue::Number(x), TypedValue::Number(y)) => x == y,
        (TypedValue::Boolean(x), TypedValue::Boolean(y)) => x == y,
        _ => same_token(&a.display(), &b.display()),
    }
}

fn numeric(v: &TemplatedValue<'_>) -> Option<f64> {
    v.value.typed.as_number().or_else(|| parse_number(Some(v.value.raw.as_str())))
}

fn describe_range(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{} to {}", format_number(lo), format_number(hi)),
        (Some(lo), None) => format!("at least {}", format_number(lo)),
        (None, Some(hi)) => format!("at most {}", format_number(hi)),
        (None, None) => "any number".to_string(),
    }
}

/// Assign primary and secondary roles by category identity.
fn roles<'a>(rule: &CompatibilityRule, a: &'a Component, b: &'a Component) -> (&'a Component, &'a Component) {
    if a.category == rule.primary_category {
        (a, b)
    } else {
        (b, a)
    }
}

/// Why `a` and `b` fail `rule`, or `None` when the rule passes.
///
/// Both components must be present in `index`.
pub fn evaluate_rule(
    rule: &CompatibilityRule,
    a: &Component,
    b: &Component,
    index: &ComponentIndex,
    options: &EngineOptions,
) -> Option<String> {
    if rule.rule_type == RuleType::Custom {
        return match options.custom_rules {
            CustomRulePolicy::Pass => {
                warn!(rule = %rule.id, "custom compatibility rule is not implemented, passing");
                None
            }
            CustomRulePolicy::Block => Some(CUSTOM_BLOCKED_REASON.to_string()),
        };
    }

    let (primary, secondary) = roles(rule, a, b);
    let (p, s) = match (
        index.value(&primary.id, &rule.primary_template),
        index.value(&secondary.id, &rule.secondary_template),
    ) {
        (Some(p), Some(s)) => (p, s),
        _ => {
            return match options.absence {
                AbsencePolicy::Strict => Some(MISSING_SPEC_REASON.to_string()),
                AbsencePolicy::Permissive => None,
            }
        }
    };

    match rule.rule_type {
        RuleType::ExactMatch => {
            if values_equal(&p.value.typed, &s.value.typed) {
                None
            } else {
                Some(format!(
                    "{} {} {} does not match {} {} {}",
                    primary.label(),
                    p.name,
                    p.value.typed.display(),
                    secondary.label(),
                    s.name,
                    s.value.typed.display()
                ))
            }
        }
        RuleType::CompatibleValues => {
            let value = s.value.typed.display();
            if rule.compatible_values.iter().any(|allowed| same_token(allowed, &value)) {
                None
            } else {
                Some(format!(
                    "{} {} {} is not one of the compatible values [{}]",
                    secondary.label(),
                    s.name,
                    value,
                    rule.compatible_values.join(", ")
                ))
            }
        }
        RuleType::RangeCheck => {
            let range = describe_range(rule.min_value, rule.max_value);
            match numeric(&s) {
                Some(n) if rule.min_value.map_or(true, |lo| n >= lo) && rule.max_value.map_or(true, |hi| n <= hi) => {
                    None
                }
                Some(n) => Some(format!(
                    "{} {} {} is outside the allowed range ({range})",
                    secondary.label(),
                    s.name,
                    format_number(n)
                )),
                None => Some(format!(
                    "{} {} {:?} is not a number (expected {range})",
                    secondary.label(),
                    s.name,
                    s.value.raw
                )),
            }
        }
        RuleType::Custom => None,
    }
}

/// Evaluate `rules` in order, stopping at the first failure.
pub fn evaluate_pair(
    rules: &[CompatibilityRule],
    a: &Component,
    b: &Component,
    index: &ComponentIndex,
    options: &EngineOptions,
) -> CompatibilityResult {
    for rule in rules.iter().filter(|r| r.connects(&a.category, &b.category)) {
        if let Some(reason) = evaluate_rule(rule, a, b, index, options) {
            debug!(a = %a.id, b = %b.id, rule = %rule.id, %reason, "pair incompatible");
            return CompatibilityResult::incompatible(reason);
        }
    }
    debug!(a = %a.id, b = %b.id, rules = rules.len(), "pair compatible");
    CompatibilityResult::compatible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigfit_core::{CategorySlug, ComponentId, DataType, RuleId, SpecificationTemplate, TemplateId};

    fn template(id: &str, category: &str, name: &str, data_type: DataType) -> SpecificationTemplate {
        SpecificationTemplate {
            id: TemplateId::from_str(id),
            category: CategorySlug::new(category),
            name: name.into(),
            data_type,
            enum_values: vec![],
            min_value: None,
            max_value: None,
            is_compatibility_key: true,
        }
    }

    fn rule(rule_type: RuleType, p: &SpecificationTemplate, s: &SpecificationTemplate) -> CompatibilityRule {
        CompatibilityRule {
            id: RuleId::from_str("r1"),
            primary_category: p.category.clone(),
            secondary_category: s.category.clone(),
            primary_template: p.id.clone(),
            secondary_template: s.id.clone(),
            rule_type,
            compatible_values: vec![],
            min_value: None,
            max_value: None,
        }
    }

    fn sockets() -> (SpecificationTemplate, SpecificationTemplate) {
        (
            template("t-cpu", "cpu", "socket", DataType::Socket),
            template("t-mb", "motherboard", "socket", DataType::Socket),
        )
    }

    fn check(rule: &CompatibilityRule, a: &Component, b: &Component, options: &EngineOptions) -> CompatibilityResult {
        let index = ComponentIndex::new([a.clone(), b.clone()]);
        evaluate_pair(std::slice::from_ref(rule), a, b, &index, options)
    }

    #[test]
    fn exact_match_names_both_values() {
        let (tc, tm) = sockets();
        let r = rule(RuleType::ExactMatch, &tc, &tm);
        let cpu = Component::new(ComponentId::from_str("cpu"), "cpu".into())
            .with_name("Ryzen 7")
            .with_templated_spec(&tc, "AM5");
        let board = Component::new(ComponentId::from_str("mb"), "motherboard".into())
            .with_name("Z790")
            .with_templated_spec(&tm, "LGA1700");

        let result = check(&r, &board, &cpu, &EngineOptions::default());
        assert!(!result.is_compatible);
        let reason = result.reason.unwrap();
        assert!(reason.contains("AM5") && reason.contains("LGA1700"), "{reason}");
        assert!(reason.starts_with("Ryzen 7"), "primary side comes first: {reason}");

        let same = board.clone().with_templated_spec(&tm, "am5");
        assert!(check(&r, &cpu, &same, &EngineOptions::default()).is_compatible);
    }

    #[test]
    fn exact_match_compares_numbers_numerically() {
        let p = template("t-len", "gpu", "length", DataType::Number);
        let s = template("t-clear", "case", "gpu_clearance", DataType::Number);
        let r = rule(RuleType::ExactMatch, &p, &s);
        let gpu = Component::new(ComponentId::from_str("g"), "gpu".into()).with_templated_spec(&p, "300mm");
        let case = Component::new(ComponentId::from_str("c"), "case".into()).with_templated_spec(&s, "300.0");
        assert!(check(&r, &gpu, &case, &EngineOptions::default()).is_compatible);
    }

    #[test]
    fn compatible_values_checks_secondary_against_allow_list() {
        let p = template("t-mb-mem", "motherboard", "memory_type", DataType::MemoryType);
        let s = template("t-ram-type", "ram", "type", DataType::MemoryType);
        let mut r = rule(RuleType::CompatibleValues, &p, &s);
        r.compatible_values = vec!["DDR5".into(), "DDR5-ECC".into()];
        let board = Component::new(ComponentId::from_str("mb"), "motherboard".into()).with_templated_spec(&p, "DDR5");

        let ddr5 = Component::new(ComponentId::from_str("r5"), "ram".into()).with_templated_spec(&s, "ddr5");
        assert!(check(&r, &board, &ddr5, &EngineOptions::default()).is_compatible);

        let ddr4 = Component::new(ComponentId::from_str("r4"), "ram".into()).with_templated_spec(&s, "DDR4");
        let result = check(&r, &ddr4, &board, &EngineOptions::default());
        assert!(result.reason.unwrap().contains("DDR4"));
    }

    #[test]
    fn range_check_bounds_are_inclusive() {
        let p = template("t-gpu-len", "gpu", "length", DataType::Number);
        let s = template("t-case-len", "case", "max_gpu_length", DataType::Number);
        let mut r = rule(RuleType::RangeCheck, &p, &s);
        r.min_value = Some(100.0);
        r.max_value = Some(200.0);
        let gpu = Component::new(ComponentId::from_str("gpu"), "gpu".into()).with_templated_spec(&p, "150");

        for (value, ok) in [("100", true), ("200", true), ("99", false), ("201", false), ("n/a", false)] {
            let case = Component::new(ComponentId::from_str("case"), "case".into()).with_templated_spec(&s, value);
            assert_eq!(check(&r, &gpu, &case, &EngineOptions::default()).is_compatible, ok, "{value}");
        }
    }

    #[test]
    fn range_check_with_open_bound() {
        let p = template("t-gpu", "gpu", "power", DataType::Number);
        let s = template("t-psu", "psu", "wattage", DataType::Number);
        let mut r = rule(RuleType::RangeCheck, &p, &s);
        r.min_value = Some(550.0);
        let gpu = Component::new(ComponentId::from_str("gpu"), "gpu".into()).with_templated_spec(&p, "220");
        let psu = Component::new(ComponentId::from_str("psu"), "psu".into()).with_templated_spec(&s, "1200W");
        assert!(check(&r, &gpu, &psu, &EngineOptions::default()).is_compatible);
    }

    #[test]
    fn missing_spec_follows_absence_policy() {
        let (tc, tm) = sockets();
        let r = rule(RuleType::ExactMatch, &tc, &tm);
        let cpu = Component::new(ComponentId::from_str("cpu"), "cpu".into()).with_templated_spec(&tc, "AM5");
        let board = Component::new(ComponentId::from_str("mb"), "motherboard".into()).with_spec("socket", "AM5");

        let strict = check(&r, &cpu, &board, &EngineOptions::default());
        assert_eq!(strict.reason.as_deref(), Some(MISSING_SPEC_REASON));

        let permissive = EngineOptions { absence: AbsencePolicy::Permissive, ..EngineOptions::default() };
        assert!(check(&r, &cpu, &board, &permissive).is_compatible);
    }

    #[test]
    fn custom_rules_follow_policy() {
        let (tc, tm) = sockets();
        let r = rule(RuleType::Custom, &tc, &tm);
        let cpu = Component::new(ComponentId::from_str("cpu"), "cpu".into());
        let board = Component::new(ComponentId::from_str("mb"), "motherboard".into());
        assert!(check(&r, &cpu, &board, &EngineOptions::default()).is_compatible);

        let block = EngineOptions { custom_rules: CustomRulePolicy::Block, ..EngineOptions::default() };
        assert_eq!(check(&r, &cpu, &board, &block).reason.as_deref(), Some(CUSTOM_BLOCKED_REASON));
    }

    #[test]
    fn first_failing_rule_wins() {
        let (tc, tm) = sockets();
        let mut first = rule(RuleType::Custom, &tc, &tm);
        first.id = RuleId::from_str("first");
        let mut second = rule(RuleType::ExactMatch, &tc, &tm);
        second.id = RuleId::from_str("second");
        let cpu = Component::new(ComponentId::from_str("cpu"), "cpu".into()).with_templated_spec(&tc, "AM5");
        let board =
            Component::new(ComponentId::from_str("mb"), "motherboard".into()).with_templated_spec(&tm, "AM4");
        let index = ComponentIndex::new([cpu.clone(), board.clone()]);
        let block = EngineOptions { custom_rules: CustomRulePolicy::Block, ..EngineOptions::default() };
        let result = evaluate_pair(&[first, second], &cpu, &board, &index, &block);
        assert_eq!(result.reason.as_deref(), Some(CUSTOM_BLOCKED_REASON));
    }
}
