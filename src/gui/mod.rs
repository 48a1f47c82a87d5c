//! The terminal control panel.

mod control_panel;

pub use control_panel::run_control_panel;
