//! Infrastructure layer
//!
//! Wire DTOs, transport bindings and the in-memory collaborator stores.

pub mod dto;
pub mod repository;
pub mod transport;
