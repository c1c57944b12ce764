//! CrudService: verb dispatch over resources and relationships, on top of a `Store`.

mod crud;
mod include;
mod recovery;
mod repo;
pub use crud::{CrudService, Outcome, Payload, Request};
pub use recovery::create_or_restore;
pub use repo::Repository;
