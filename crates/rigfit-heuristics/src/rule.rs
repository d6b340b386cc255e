use rigfit_core::{get_spec_any, list_includes, parse_number, AbsencePolicy, CategorySlug, Component, Reason, ReasonCode, Severity};

use crate::slots::*;

/// One entry of the fixed cross-category rule table.
///
/// `eval` receives the candidate first and the occupant of another slot second, and
/// must produce the same verdict whichever of the two categories the candidate has.
pub trait HeuristicRule: Send + Sync {
    fn id(&self) -> &str;
    fn categories(&self) -> (&'static str, &'static str);
    fn eval(&self, candidate: &Component, occupant: &Component, absence: AbsencePolicy) -> Vec<Reason>;

    fn applies(&self, a: &CategorySlug, b: &CategorySlug) -> bool {
        let (x, y) = self.categories();
        (a.as_str() == x && b.as_str() == y) || (a.as_str() == y && b.as_str() == x)
    }
}

/// The full table: socket, memory type, case form factor and PSU headroom.
pub fn default_rules() -> Vec<Box<dyn HeuristicRule>> {
    vec![
        Box::new(SocketRule),
        Box::new(MemoryTypeRule),
        Box::new(FormFactorRule),
        Box::new(PsuWattageRule),
    ]
}

fn same_token(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn on_missing(absence: AbsencePolicy, severity: Severity, what: &str) -> Vec<Reason> {
    match absence {
        AbsencePolicy::Permissive => vec![],
        AbsencePolicy::Strict => vec![Reason {
            code: ReasonCode::MissingSpec,
            message: format!("cannot verify {what}: specification missing"),
            severity,
        }],
    }
}

/// Orders a pair as `(first, second)` by category, whichever side is the candidate.
fn orient<'a>(
    candidate: &'a Component,
    occupant: &'a Component,
    first: &str,
    second: &str,
) -> Option<(&'a Component, &'a Component)> {
    match candidate.category.as_str() {
        c if c == first && occupant.category.as_str() == second => Some((candidate, occupant)),
        c if c == second && occupant.category.as_str() == first => Some((occupant, candidate)),
        _ => None,
    }
}

/// CPU and motherboard must expose the same `socket`.
pub struct SocketRule;

impl HeuristicRule for SocketRule {
    fn id(&self) -> &str {
        "socket_match"
    }

    fn categories(&self) -> (&'static str, &'static str) {
        (CPU, MOTHERBOARD)
    }

    fn eval(&self, candidate: &Component, occupant: &Component, absence: AbsencePolicy) -> Vec<Reason> {
        let Some((cpu, board)) = orient(candidate, occupant, CPU, MOTHERBOARD) else {
            return vec![];
        };
        match (get_spec_any(Some(cpu), SOCKET), get_spec_any(Some(board), SOCKET)) {
            (Some(cpu_socket), Some(board_socket)) if !same_token(cpu_socket, board_socket) => {
                vec![Reason::error(
                    ReasonCode::SocketMismatch,
                    format!("CPU socket {cpu_socket} does not match motherboard socket {board_socket}"),
                )]
            }
            (Some(_), Some(_)) => vec![],
            _ => on_missing(absence, Severity::Error, "CPU socket"),
        }
    }
}

/// Motherboard memory type (`memory_type`, else `ram_type`) must equal the RAM `type`.
pub struct MemoryTypeRule;

impl HeuristicRule for MemoryTypeRule {
    fn id(&self) -> &str {
        "memory_type_match"
    }

    fn categories(&self) -> (&'static str, &'static str) {
        (MOTHERBOARD, RAM)
    }

    fn eval(&self, candidate: &Component, occupant: &Component, absence: AbsencePolicy) -> Vec<Reason> {
        let Some((board, ram)) = orient(candidate, occupant, MOTHERBOARD, RAM) else {
            return vec![];
        };
        match (get_spec_any(Some(board), BOARD_MEMORY_TYPE), get_spec_any(Some(ram), RAM_TYPE)) {
            (Some(board_type), Some(ram_type)) if !same_token(board_type, ram_type) => {
                vec![Reason::error(
                    ReasonCode::RamType,
                    format!("motherboard supports {board_type} memory but RAM is {ram_type}"),
                )]
            }
            (Some(_), Some(_)) => vec![],
            _ => on_missing(absence, Severity::Error, "memory type"),
        }
    }
}

/// The case's supported form factor list must include the motherboard's `form_factor`.
pub struct FormFactorRule;

impl HeuristicRule for FormFactorRule {
    fn id(&self) -> &str {
        "case_form_factor"
    }

    fn categories(&self) -> (&'static str, &'static str) {
        (CASE, MOTHERBOARD)
    }

    fn eval(&self, candidate: &Component, occupant: &Component, absence: AbsencePolicy) -> Vec<Reason> {
        let Some((case, board)) = orient(candidate, occupant, CASE, MOTHERBOARD) else {
            return vec![];
        };
        let form_factor = get_spec_any(Some(board), BOARD_FORM_FACTOR);
        match list_includes(get_spec_any(Some(case), CASE_BOARD_SUPPORT), form_factor) {
            Some(false) => vec![Reason::error(
                ReasonCode::CaseFormFactor,
                format!("case does not support {} motherboards", form_factor.unwrap_or_default().trim()),
            )],
            Some(true) => vec![],
            None => on_missing(absence, Severity::Error, "case form factor support"),
        }
    }
}

/// PSU `wattage` should cover 1.5x the GPU draw. Advisory only.
pub struct PsuWattageRule;

impl HeuristicRule for PsuWattageRule {
    fn id(&self) -> &str {
        "psu_wattage_headroom"
    }

    fn categories(&self) -> (&'static str, &'static str) {
        (PSU, GPU)
    }

    fn eval(&self, candidate: &Component, occupant: &Component, absence: AbsencePolicy) -> Vec<Reason> {
        let Some((psu, gpu)) = orient(candidate, occupant, PSU, GPU) else {
            return vec![];
        };
        let gpu_power = parse_number(get_spec_any(Some(gpu), GPU_POWER));
        let wattage = parse_number(get_spec_any(Some(psu), PSU_WATTAGE));
        match (gpu_power, wattage) {
            (Some(power), Some(watts)) => {
                let required = required_psu_wattage(power);
                if watts < required {
                    vec![Reason::warn(
                        ReasonCode::PsuWattage,
                        format!(
                            "PSU wattage {}W is below the recommended {}W for this GPU",
                            rigfit_core::format_number(watts),
                            rigfit_core::format_number(required)
                        ),
                    )]
                } else {
                    vec![]
                }
            }
            _ => on_missing(absence, Severity::Warn, "PSU wattage headroom"),
        }
    }
}
