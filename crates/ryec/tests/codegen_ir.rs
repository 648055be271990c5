//! IR-shape tests for statements, literals, and the boxed-core
//! initializer rule.

mod common;

use common::*;
use rye_ast::{ExprNode, Item, Loc, StmtNode, VariableNode};

#[test]
fn while_loop_emits_condition_block_end_labels() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        Item::Statement(local("i", t("Int"), int(0))),
        Item::Statement(StmtNode::While {
            loc: Loc::none(),
            cond: binary("<", var("i"), int(3)),
            body: vec![StmtNode::CompoundAssign {
                loc: Loc::none(),
                target: var("i"),
                op: "+".to_string(),
                value: int(1),
            }],
        }),
    ])?;

    assert!(ir.contains("while0.condition:"), "missing condition label");
    assert!(ir.contains("while0.block:"), "missing block label");
    assert!(ir.contains("while0.end:"), "missing end label");
    Ok(())
}

#[test]
fn break_and_skip_jump_to_stable_labels() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(StmtNode::While {
        loc: Loc::none(),
        cond: boolean(true),
        body: vec![
            StmtNode::If {
                loc: Loc::none(),
                cond: boolean(false),
                then_body: vec![StmtNode::Skip { loc: Loc::none() }],
                elifs: Vec::new(),
                else_body: Vec::new(),
            },
            StmtNode::Break { loc: Loc::none() },
        ],
    })])?;

    assert!(
        ir.contains("br label %while0.end"),
        "break does not target the loop end"
    );
    assert!(
        ir.contains("br label %while0.condition"),
        "skip does not target the loop condition"
    );
    Ok(())
}

#[test]
fn conditional_expression_joins_with_phi() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(local(
        "x",
        t("Int"),
        ExprNode::IfExpr {
            loc: Loc::none(),
            cond: Box::new(boolean(true)),
            then_expr: Box::new(int(1)),
            else_expr: Box::new(int(2)),
        },
    ))])?;

    assert!(ir.contains("ifexpr0.true:"));
    assert!(ir.contains("ifexpr0.false:"));
    assert!(ir.contains("ifexpr0.end:"));
    assert!(ir.contains("phi %class.Int*"), "no phi join: {}", ir);
    Ok(())
}

#[test]
fn literals_box_into_core_classes() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        Item::Statement(local("i", t("Int"), int(42))),
        Item::Statement(local("s", t("String"), string("hi"))),
    ])?;

    assert!(ir.contains("%class.Int = type { i8**, i64 }"));
    assert!(ir.contains("%class.String = type { i8**, i8* }"));
    assert!(ir.contains("c\"hi\\00\""), "string constant missing");
    assert!(ir.contains("call i8* @rye_alloc"), "boxing never allocates");
    Ok(())
}

#[test]
fn boxed_core_initializer_is_identity_on_the_argument() -> anyhow::Result<()> {
    // Int(x) pushes the already-boxed argument; no initializer call is
    // emitted for the treated-special core classes.
    let ir = compile_items(vec![Item::Statement(call_stmt(call(
        "print",
        vec![call("Int", vec![int(5)])],
    )))])?;

    assert!(
        !ir.contains("@core.Int.initializer.Int"),
        "Int(x) must not call the Int initializer"
    );
    assert!(ir.contains("call void @core.print.Int"));
    Ok(())
}

#[test]
fn module_level_variables_become_globals() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Variable(VariableNode {
        loc: Loc::none(),
        name: "counter".to_string(),
        ty: t("Int"),
        init: Some(int(0)),
    })])?;

    assert!(
        ir.contains("@main.counter = global %class.Int* null"),
        "global declaration missing: {}",
        ir
    );
    assert!(ir.contains("store %class.Int*"), "global is never stored");
    Ok(())
}

#[test]
fn main_returns_integer_zero() -> anyhow::Result<()> {
    let ir = compile_items(Vec::new())?;
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 0"));
    Ok(())
}

#[test]
fn raise_without_handler_aborts() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(StmtNode::Raise {
        loc: Loc::none(),
        value: None,
    })])?;

    assert!(ir.contains("call void @rye_raise(i8* null)"));
    assert!(ir.contains("unreachable"));
    Ok(())
}

#[test]
fn try_opens_handler_and_end_labels() -> anyhow::Result<()> {
    let ir = compile_items(vec![Item::Statement(StmtNode::Try {
        loc: Loc::none(),
        error: param("e", t("Object")),
        try_body: vec![StmtNode::Raise {
            loc: Loc::none(),
            value: Some(call("Object", Vec::new())),
        }],
        handle_body: vec![call_stmt(call("print", vec![string("caught")]))],
    })])?;

    assert!(ir.contains("try0.handler:"), "handler label missing");
    assert!(ir.contains("try0.end:"), "end label missing");
    assert!(
        ir.contains("br label %try0.handler"),
        "raise inside try does not branch to the handler"
    );
    Ok(())
}

#[test]
fn cast_walks_the_descriptor_chain() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        class(t("A"), Vec::new(), Vec::new()),
        class(t("B"), vec![t("A")], Vec::new()),
        Item::Statement(local("a", t("A"), call("B", Vec::new()))),
        Item::Statement(local(
            "b",
            t("B"),
            ExprNode::As {
                loc: Loc::none(),
                value: Box::new(var("a")),
                ty: t("B"),
            },
        )),
    ])?;

    assert!(ir.contains("@B.vtable"), "target descriptor missing");
    assert!(ir.contains(".loop:"), "no chain walk loop");
    assert!(ir.contains("call void @rye_cast_failed()"));
    Ok(())
}

#[test]
fn is_expression_boxes_a_bool() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        class(t("A"), Vec::new(), Vec::new()),
        Item::Statement(local("a", t("A"), call("A", Vec::new()))),
        Item::Statement(local(
            "p",
            t("Bool"),
            ExprNode::Is {
                loc: Loc::none(),
                value: Box::new(var("a")),
                ty: t("A"),
            },
        )),
    ])?;

    assert!(ir.contains("is0.res"), "no result slot for the class test");
    assert!(
        ir.contains("%class.Bool = type { i8**, i1 }"),
        "result is not boxed as Bool"
    );
    Ok(())
}
