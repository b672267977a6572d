use crate::{
    tests::testkit::{build_operation_plan, init_logger},
    utils::parsing::parse_operation,
};
use std::error::Error;

#[test]
fn lookup_key_shadowed_by_an_alias() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            id: name
            inStock
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/requirement-collisions.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { productBySlug(slug: "1") { id: name __fusion_req_1: id } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: __fusion_req_1: id
        dependencies:
          - id: 1
    "#);

    Ok(())
}

#[test]
fn lookup_key_next_to_a_conditional_field() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query ($s: Boolean!) {
          productBySlug(slug: "1") {
            id @skip(if: $s)
            inStock
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/requirement-collisions.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query($s: Boolean!) { productBySlug(slug: "1") { id @skip(if: $s) __fusion_req_1: id } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: __fusion_req_1: id
        dependencies:
          - id: 1
    "#);

    Ok(())
}

#[test]
fn requirement_next_to_the_same_field_with_arguments() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            tax
            price(currency: "EUR")
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/requirement-collisions.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { productBySlug(slug: "1") { id __fusion_req_1: price price(currency: "EUR") } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!, $__fusion_2_price: Float!) { productById(id: $__fusion_2_id) { tax(price: $__fusion_2_price) } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: id
          - name: __fusion_2_price
            selectionSet: productBySlug
            selectionMap: __fusion_req_1: price
        dependencies:
          - id: 1
    "#);

    Ok(())
}

#[test]
fn nested_requirement_shares_the_selected_parent() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            dimensions {
              width: height
            }
            shippingCost
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/requirement-collisions.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { productBySlug(slug: "1") { dimensions { __fusion_req_1: width height width: height } id } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!, $__fusion_2_dimensions: DimensionsInput) { productById(id: $__fusion_2_id) { shippingCost(dimensions: $__fusion_2_dimensions) } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: id
          - name: __fusion_2_dimensions
            selectionSet: productBySlug
            selectionMap: dimensions { __fusion_req_1: width height }
        dependencies:
          - id: 1
    "#);

    Ok(())
}
