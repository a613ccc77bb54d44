//! SQLite persistence for plan session families.

mod model;
mod repository;

pub use model::PlanSessionDB;
pub use repository::PlanRepository;
