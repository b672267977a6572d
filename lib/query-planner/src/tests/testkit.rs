use std::env;
use std::path::PathBuf;
use std::sync::Once;

use graphql_parser::query;
use lazy_static::lazy_static;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    ast::normalization::normalize_operation,
    planner::{build_plan, error::PlannerError, plan_nodes::OperationPlan},
    schema::CompositeSchema,
    utils::cancellation::CancellationToken,
};

fn init_test_logger_internal() {
    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_bracketed_fields(true)
        .with_deferred_spans(false)
        .with_wraparound(25)
        .with_indent_lines(true)
        .with_timer(tracing_tree::time::Uptime::default())
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_targets(false);

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(EnvFilter::from_default_env())
        .init();
}

lazy_static! {
    static ref TRACING_INIT: Once = Once::new();
}

pub fn init_logger() {
    TRACING_INIT.call_once(|| {
        init_test_logger_internal();
    });
}

pub fn read_composite_schema(fixture_path: &str) -> CompositeSchema {
    let schema_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(fixture_path);
    let schema_sdl = std::fs::read_to_string(schema_path).expect("Unable to read input file");

    CompositeSchema::new_from_sdl(&schema_sdl).expect("failed to build composite schema")
}

pub fn build_operation_plan(
    fixture_path: &str,
    document: query::Document<'static, String>,
) -> Result<OperationPlan, PlannerError> {
    let schema = read_composite_schema(fixture_path);
    let operation = normalize_operation(&schema, &document, None)?;

    build_plan(&schema, &operation, &CancellationToken::new())
}
