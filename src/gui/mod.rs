//! nvoc GUI Module
//!
//! egui front-end over [`crate::panel::ControlPanel`]. All state transitions
//! live in the panel; this module only draws and forwards clicks.

pub mod app;

pub use app::{NvOcApp, run};
