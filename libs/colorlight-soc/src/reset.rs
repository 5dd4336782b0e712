use std::fmt;

use serde::Serialize;

/// Board resource wired to the reset button. The button pulls the line low.
pub const RESET_BUTTON_RESOURCE: &str = "cpu_reset_n";

/// Soft reset request raised by the SoC controller.
pub const SOFT_RESET_SIGNAL: &str = "ctrl_reset";

/// The single reset condition fed to every PLL and every clock domain.
///
/// All domains hold a copy of the same handle, so they leave reset together
/// regardless of which source asserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetHandle {
    asserted: bool,
}

impl ResetHandle {
    /// `hardware_reset_button` is the level seen on the (active-low) button pin,
    /// `global_reset_request` is the (active-high) soft request.
    pub fn combine(global_reset_request: bool, hardware_reset_button: bool) -> ResetHandle {
        ResetHandle { asserted: !hardware_reset_button || global_reset_request }
    }

    /// Button released and no soft request pending.
    pub fn released() -> ResetHandle { ResetHandle::combine(false, true) }

    pub fn is_asserted(&self) -> bool { self.asserted }
}

impl Default for ResetHandle {
    fn default() -> ResetHandle { ResetHandle::released() }
}

impl fmt::Display for ResetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "~{} | {} ({})",
            RESET_BUTTON_RESOURCE,
            SOFT_RESET_SIGNAL,
            if self.asserted { "asserted" } else { "released" }
        )
    }
}
