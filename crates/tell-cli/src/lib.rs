//! tell CLI library - configuration, logging, and rendering for the `tell`
//! binary. Separated from main.rs so they can be unit tested.

pub mod config;
pub mod logging;
pub mod render;
