//! Value Object Module

pub mod email;
pub mod role;
pub mod user_code;

pub use email::Email;
pub use role::{Role, RoleHierarchy};
pub use user_code::UserCode;
