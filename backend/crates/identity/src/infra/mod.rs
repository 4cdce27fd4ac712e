//! Infrastructure Layer
//!
//! Persistence implementations of the repository traits.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityRepository;
