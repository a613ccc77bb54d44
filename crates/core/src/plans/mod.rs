//! Plan documents, families and the session service built on top of them.

mod plans_constants;
mod plans_model;
mod plans_service;
mod plans_traits;
pub mod reconcile;
pub mod validation;

pub use plans_constants::*;
pub use plans_model::*;
pub use plans_service::*;
pub use plans_traits::*;
pub use reconcile::{reconcile, LocalPlanCache, ReconcileAction, ServerPlanSnapshot};
pub use validation::{
    validate_plan_bytes, validate_plan_value, PlanValidationError, MAX_PLAN_BYTES,
};
