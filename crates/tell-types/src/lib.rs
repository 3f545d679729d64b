//! Shared types for the tell command generator.

mod history;
mod message;
mod response;

pub use history::*;
pub use message::*;
pub use response::*;
