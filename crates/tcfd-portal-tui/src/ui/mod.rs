//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, status bar and overlays (help, login, sign-up, quit)
//! - `input`: keyboard event handling
//! - `styles`: colors and text styling
//! - `tabs`: per-tab content (financial, standards, report, materiality)

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
