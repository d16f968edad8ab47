//! Row models and DTOs, one module per table.

pub mod creation;
pub mod password_reset;
pub mod session;
pub mod user;
