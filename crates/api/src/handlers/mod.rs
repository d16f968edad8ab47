pub mod auth;
pub mod creations;
pub mod generation;
pub mod shared;
