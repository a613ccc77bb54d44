//! Core domain for anonymous-token plan persistence.
//!
//! A plan is an opaque, schema-validated JSON document addressed by the hash of a
//! bearer token held only by the client. This crate owns the token codec, the plan
//! validator, the family configuration and the session service; storage backends
//! implement [`plans::PlanRepositoryTrait`].

pub mod errors;
pub mod plans;
pub mod tokens;

pub use errors::{DatabaseError, Error, Result};
