//! HTTP handlers for the mounted entity routes.

pub mod entity;
pub use entity::*;
