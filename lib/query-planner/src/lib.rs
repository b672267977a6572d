pub mod ast;
pub mod config;
pub mod planner;
pub mod schema;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::PlannerConfig;
pub use planner::{
    build_plan,
    error::PlannerError,
    plan_nodes::{OperationExecutionNode, OperationPlan, OperationRequirement},
    Planner,
};
pub use schema::CompositeSchema;
pub use utils::cancellation::{CancellationError, CancellationToken};
