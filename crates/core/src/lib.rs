//! Domain types and pure logic for Photo Poet.
//!
//! Nothing in this crate performs I/O. Store, blob, and model boundaries
//! live in their own crates and exchange the types defined here.

pub mod attempt;
pub mod creation;
pub mod data_uri;
pub mod error;
pub mod history;
pub mod identity;
pub mod naming;
pub mod pdf;
pub mod share;
pub mod style;
pub mod types;
