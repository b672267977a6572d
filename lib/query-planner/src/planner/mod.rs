use std::sync::Arc;

use graphql_parser::query;
use tracing::{debug, instrument};

use assembler::assemble;
use cache::PlanCache;
use error::PlannerError;
use plan_nodes::OperationPlan;
use search::search;

use crate::{
    ast::{normalization::normalize_operation, operation::NormalizedOperation},
    config::PlannerConfig,
    schema::CompositeSchema,
    utils::cancellation::CancellationToken,
};

pub mod assembler;
pub mod cache;
pub mod error;
pub mod plan_nodes;
pub mod requirements;
pub mod search;

pub struct Planner {
    schema: Arc<CompositeSchema>,
    config: PlannerConfig,
    cache: PlanCache,
}

impl Planner {
    pub fn new(schema: Arc<CompositeSchema>, config: PlannerConfig) -> Self {
        Planner {
            cache: PlanCache::new(config.cache_capacity),
            schema,
            config,
        }
    }

    pub fn new_from_sdl(sdl: &str, config: PlannerConfig) -> Result<Self, PlannerError> {
        let schema = CompositeSchema::new_from_sdl(sdl)?;

        Ok(Self::new(Arc::new(schema), config))
    }

    pub fn schema(&self) -> &Arc<CompositeSchema> {
        &self.schema
    }

    /// Plans `operation_name` (or the only operation) of `document` within the configured
    /// timeout.
    pub fn plan(
        &self,
        document: &query::Document<'static, String>,
        operation_name: Option<&str>,
    ) -> Result<Arc<OperationPlan>, PlannerError> {
        let cancellation_token = CancellationToken::with_timeout(self.config.timeout);
        self.plan_with_cancellation(document, operation_name, &cancellation_token)
    }

    pub fn plan_with_cancellation(
        &self,
        document: &query::Document<'static, String>,
        operation_name: Option<&str>,
        cancellation_token: &CancellationToken,
    ) -> Result<Arc<OperationPlan>, PlannerError> {
        let operation = normalize_operation(&self.schema, document, operation_name)?;
        self.plan_from_normalized_operation(&operation, cancellation_token)
    }

    pub fn plan_from_normalized_operation(
        &self,
        operation: &NormalizedOperation,
        cancellation_token: &CancellationToken,
    ) -> Result<Arc<OperationPlan>, PlannerError> {
        self.cache.get_or_plan(operation.hash(), || {
            build_plan(&self.schema, operation, cancellation_token)
        })
    }
}

/// Plans `operation` without consulting any cache.
#[instrument(level = "trace", skip_all, fields(operation_kind = %operation.operation_kind))]
pub fn build_plan(
    schema: &CompositeSchema,
    operation: &NormalizedOperation,
    cancellation_token: &CancellationToken,
) -> Result<OperationPlan, PlannerError> {
    let outcome = search(schema, operation, cancellation_token)?;
    let plan = assemble(operation, &outcome)?;

    debug!(
        nodes = plan.nodes.len(),
        search_nodes = outcome.nodes.len(),
        "built operation plan"
    );

    Ok(plan)
}
