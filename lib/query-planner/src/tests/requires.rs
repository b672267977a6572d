use crate::{
    tests::testkit::{build_operation_plan, init_logger},
    utils::parsing::parse_operation,
};
use std::error::Error;

#[test]
fn requirements_become_lookup_variables() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            name
            estimatedDelivery(postCode: "12345")
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/products.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { productBySlug(slug: "1") { name id weight price } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!, $__fusion_2_weight: Int!, $__fusion_2_price: Float!) { productById(id: $__fusion_2_id) { estimatedDelivery(postCode: "12345", weight: $__fusion_2_weight, price: $__fusion_2_price) } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: id
          - name: __fusion_2_weight
            selectionSet: productBySlug
            selectionMap: weight
          - name: __fusion_2_price
            selectionSet: productBySlug
            selectionMap: price
        dependencies:
          - id: 1
    "#);

    Ok(())
}

#[test]
fn user_variables_come_before_requirements() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query Delivery($slug: String!, $code: String) {
          productBySlug(slug: $slug) {
            name
            estimatedDelivery(postCode: $code)
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/products.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query($slug: String!) { productBySlug(slug: $slug) { name id weight price } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($code: String, $__fusion_2_id: ID!, $__fusion_2_weight: Int!, $__fusion_2_price: Float!) { productById(id: $__fusion_2_id) { estimatedDelivery(postCode: $code, weight: $__fusion_2_weight, price: $__fusion_2_price) } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: id
          - name: __fusion_2_weight
            selectionSet: productBySlug
            selectionMap: weight
          - name: __fusion_2_price
            selectionSet: productBySlug
            selectionMap: price
        dependencies:
          - id: 1
    "#);

    Ok(())
}

#[test]
fn field_with_requirements_gets_its_own_node() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            inStock
            estimatedDelivery(postCode: "1")
          }
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/products.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { productBySlug(slug: "1") { id weight price } }
      - id: 2
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }
        requirements:
          - name: __fusion_2_id
            selectionSet: productBySlug
            selectionMap: id
        dependencies:
          - id: 1
      - id: 3
        schema: SHIPPING
        path: productBySlug
        operation: >-
          query($__fusion_3_id: ID!, $__fusion_3_weight: Int!, $__fusion_3_price: Float!) { productById(id: $__fusion_3_id) { estimatedDelivery(postCode: "1", weight: $__fusion_3_weight, price: $__fusion_3_price) } }
        requirements:
          - name: __fusion_3_id
            selectionSet: productBySlug
            selectionMap: id
          - name: __fusion_3_weight
            selectionSet: productBySlug
            selectionMap: weight
          - name: __fusion_3_price
            selectionSet: productBySlug
            selectionMap: price
        dependencies:
          - id: 1
    "#);

    Ok(())
}
