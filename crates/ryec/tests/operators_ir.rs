//! Operator lowering: binary and unary operators become method calls,
//! `in` inverts onto the container.

mod common;

use common::*;
use rye_ast::{ExprNode, Item, Loc};

#[test]
fn user_defined_add_dispatches_to_the_operator_method() -> anyhow::Result<()> {
    let my_num = class(
        t("MyNum"),
        Vec::new(),
        vec![method_member(function(
            "_add_",
            vec![param("other", t("MyNum"))],
            Some(t("MyNum")),
            vec![ret(var("other"))],
        ))],
    );
    let ir = compile_items(vec![
        my_num,
        Item::Statement(local("a", t("MyNum"), call("MyNum", Vec::new()))),
        Item::Statement(local("b", t("MyNum"), call("MyNum", Vec::new()))),
        Item::Statement(local("c", t("MyNum"), binary("+", var("a"), var("b")))),
    ])?;

    assert!(
        ir.contains("define %class.MyNum* @main.MyNum._add_.MyNum("),
        "_add_ method not emitted"
    );
    // Dispatch goes through the descriptor table.
    assert!(
        ir.contains("@MyNum.vtable"),
        "no descriptor for the receiver class"
    );
    assert!(
        ir.contains("@main.MyNum._add_.MyNum to i8*"),
        "_add_ not present in the dispatch table"
    );
    Ok(())
}

#[test]
fn in_operator_calls_contains_on_the_container() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(local(
        "found",
        t("Bool"),
        binary(
            "in",
            int(3),
            ExprNode::Array {
                loc: Loc::none(),
                elems: vec![int(1), int(2), int(3)],
            },
        ),
    ))])?;

    // [1,2,3]._contains_(3): the array is the receiver.
    assert!(
        ir.contains("@core.Array$Int._contains_.Int"),
        "no _contains_ dispatch on Array<Int>: {}",
        ir
    );
    assert!(ir.contains("%class.Array$Int = type { i8**, i64, [0 x %class.Int*] }"));
    Ok(())
}

#[test]
fn unary_minus_lowers_to_neg() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(local(
        "n",
        t("Int"),
        ExprNode::Unary {
            loc: Loc::none(),
            op: "-".to_string(),
            operand: Box::new(int(7)),
        },
    ))])?;

    assert!(
        ir.contains("@core.Int._neg_"),
        "unary minus does not use _neg_"
    );
    Ok(())
}

#[test]
fn comparison_operators_yield_bools() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(local(
        "p",
        t("Bool"),
        binary("<=", int(1), int(2)),
    ))])?;

    assert!(ir.contains("@core.Int._leq_.Int"), "no _leq_ dispatch");
    Ok(())
}
