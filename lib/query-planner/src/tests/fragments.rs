use crate::{
    tests::testkit::{build_operation_plan, init_logger},
    utils::parsing::parse_operation,
};
use std::error::Error;

#[test]
fn fragment_spreads_plan_like_inline_selections() -> Result<(), Box<dyn Error>> {
    init_logger();
    let with_fragment = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            ...ProductFields
          }
        }

        fragment ProductFields on Product {
          name
          estimatedDelivery(postCode: "12345")
        }"#,
    )?;
    let inline = parse_operation(
        r#"
        query {
          productBySlug(slug: "1") {
            name
            estimatedDelivery(postCode: "12345")
          }
        }"#,
    )?;

    let fragment_plan = build_operation_plan("fixture/tests/products.graphql", with_fragment)?;
    let inline_plan = build_operation_plan("fixture/tests/products.graphql", inline)?;

    assert_eq!(fragment_plan, inline_plan);

    Ok(())
}

#[test]
fn nested_fragments_are_merged() -> Result<(), Box<dyn Error>> {
    init_logger();
    let document = parse_operation(
        r#"
        query {
          topProducts {
            ...Listing
            ...Stock
          }
        }

        fragment Listing on Product {
          name
          ...Stock
        }

        fragment Stock on Product {
          inStock
        }"#,
    )?;
    let plan = build_operation_plan("fixture/tests/products.graphql", document)?;

    insta::assert_snapshot!(format!("{}", plan), @r#"
    nodes:
      - id: 1
        schema: PRODUCTS
        operation: >-
          query { topProducts { name id } }
      - id: 2
        schema: SHIPPING
        path: topProducts
        operation: >-
          query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }
        requirements:
          - name: __fusion_2_id
            selectionSet: topProducts
            selectionMap: id
        dependencies:
          - id: 1
    "#);

    Ok(())
}
