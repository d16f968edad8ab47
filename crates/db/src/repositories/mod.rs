//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod creation_repo;
pub mod password_reset_repo;
pub mod session_repo;
pub mod user_repo;

pub use creation_repo::CreationRepo;
pub use password_reset_repo::PasswordResetRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
