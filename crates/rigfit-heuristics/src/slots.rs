//! Category slugs and specification names the fixed rule table reads.

pub const CPU: &str = "cpu";
pub const MOTHERBOARD: &str = "motherboard";
pub const RAM: &str = "ram";
pub const GPU: &str = "gpu";
pub const PSU: &str = "psu";
pub const CASE: &str = "case";

pub const SOCKET: &[&str] = &["socket"];
pub const BOARD_MEMORY_TYPE: &[&str] = &["memory_type", "ram_type"];
pub const RAM_TYPE: &[&str] = &["type"];
pub const BOARD_FORM_FACTOR: &[&str] = &["form_factor"];
pub const CASE_BOARD_SUPPORT: &[&str] = &["motherboard_support", "supported_mobo_form_factors"];
pub const GPU_POWER: &[&str] = &["power_consumption", "power_draw", "power_draw_w"];
pub const PSU_WATTAGE: &[&str] = &["wattage"];

/// Headroom multiplier applied to GPU draw when sizing a PSU.
pub const PSU_HEADROOM: f64 = 1.5;

/// Recommended PSU wattage for a GPU drawing `gpu_power` watts.
pub fn required_psu_wattage(gpu_power: f64) -> f64 {
    (gpu_power * PSU_HEADROOM).ceil()
}
