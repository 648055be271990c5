//! Tuple synthesis and unpack assignments.

mod common;

use common::*;
use rye_ast::{ExprNode, Item, Loc, StmtNode, UnpackTarget, VariableNode};

#[test]
fn unpack_assignment_goes_through_a_tuple_temporary() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(StmtNode::Unpack {
        loc: Loc::none(),
        targets: vec![
            UnpackTarget::Declare(VariableNode {
                loc: Loc::none(),
                name: "a".to_string(),
                ty: t("Int"),
                init: None,
            }),
            UnpackTarget::Declare(VariableNode {
                loc: Loc::none(),
                name: "b".to_string(),
                ty: t("Int"),
                init: None,
            }),
        ],
        value: ExprNode::Tuple {
            loc: Loc::none(),
            elems: vec![int(1), int(2)],
        },
    })])?;

    // The synthesized Tuple2<Int, Int> carries the pair.
    assert!(ir.contains("%class.Tuple2$Int$Int = type"));
    assert!(ir.contains("@main.Tuple2$Int$Int.initializer.Int.Int"));
    assert!(ir.contains("@Tuple2$Int$Int.$ctor"));
    Ok(())
}

#[test]
fn tuple_fields_unpack_in_order() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        Item::Statement(local("a", t("Int"), int(0))),
        Item::Statement(local("b", t("Int"), int(0))),
        Item::Statement(StmtNode::Unpack {
            loc: Loc::none(),
            targets: vec![
                UnpackTarget::Target(var("a")),
                UnpackTarget::Target(var("b")),
            ],
            value: ExprNode::Tuple {
                loc: Loc::none(),
                elems: vec![int(1), int(2)],
            },
        }),
    ])?;

    // Field 1 is read before field 2 (object field indices 1 and 2).
    let first = ir
        .find("getelementptr %class.Tuple2$Int$Int")
        .expect("no tuple field access");
    let tail = &ir[first..];
    let f1 = tail.find("i32 0, i32 1").expect("field _1 never read");
    let f2 = tail.find("i32 0, i32 2").expect("field _2 never read");
    assert!(f1 < f2, "fields unpack out of order");
    Ok(())
}
