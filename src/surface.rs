//! UI surface the session reports to: two controls and a text region.

/// Enabled flags for the start and stop controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    pub const IDLE: Self = Self { start_enabled: true, stop_enabled: false };
    pub const ACTIVE: Self = Self { start_enabled: false, stop_enabled: true };
}

pub trait Surface {
    fn set_controls(&mut self, controls: Controls);

    /// Replace the status/result text.
    fn show(&mut self, message: &str);
}
