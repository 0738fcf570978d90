//! Simulation scenarios.

pub mod addr;
pub mod dad;
pub mod nud;
pub mod resolve;
