//! Stateless business calculations

pub mod expense;
pub mod payroll;
pub mod revenue;

pub use expense::*;
pub use payroll::*;
pub use revenue::*;
