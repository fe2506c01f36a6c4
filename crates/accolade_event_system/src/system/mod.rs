/// Event system module - broken down into manageable components
mod core;
mod emitters;
mod handlers;
mod stats;

pub use core::EventSystem;
pub use emitters::{EmitHandle, EmitReport};
pub use stats::EventSystemStats;
