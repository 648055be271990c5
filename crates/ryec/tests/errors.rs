//! Fatal diagnostics: semantic invariants and resolution failures.

mod common;

use common::*;
use rye_ast::{Item, Loc, StmtNode};

#[test]
fn yield_outside_a_generator_is_rejected() {
    let err = compile_items(vec![Item::Statement(StmtNode::Yield {
        loc: Loc::new(3, 1),
        value: int(1),
    })])
    .expect_err("yield at the top level must fail");
    assert!(err.to_string().contains("yield outside"), "{}", err);
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let err = compile_items(vec![Item::Statement(StmtNode::Break { loc: Loc::new(1, 1) })])
        .expect_err("break at the top level must fail");
    assert!(err.to_string().contains("break outside"), "{}", err);
}

#[test]
fn unknown_identifiers_are_rejected() {
    let err = compile_items(vec![Item::Statement(call_stmt(call(
        "print",
        vec![var("zap")],
    )))])
    .expect_err("unknown identifier must fail");
    assert!(err.to_string().contains("unknown identifier"), "{}", err);
}

#[test]
fn undeclared_types_are_rejected() {
    let err = compile_items(vec![Item::Statement(local(
        "x",
        t("Zap"),
        int(1),
    ))])
    .expect_err("undeclared type must fail");
    assert!(err.to_string().contains("undeclared type"), "{}", err);
}

#[test]
fn value_return_in_a_procedure_is_rejected() {
    let err = compile_items(vec![Item::Function(function(
        "p",
        Vec::new(),
        None,
        vec![ret(int(1))],
    ))])
    .expect_err("value return in a procedure must fail");
    assert!(
        err.to_string().contains("return with a value"),
        "{}",
        err
    );
}

#[test]
fn assignment_type_mismatches_are_rejected() {
    let err = compile_items(vec![
        Item::Statement(local("x", t("Int"), int(1))),
        Item::Statement(assign(var("x"), string("nope"))),
    ])
    .expect_err("Int := String must fail");
    assert!(err.to_string().contains("type mismatch"), "{}", err);
}

#[test]
fn no_matching_overload_is_rejected() {
    let err = compile_items(vec![
        Item::Function(function("m", vec![param("x", t("Int"))], None, Vec::new())),
        Item::Statement(call_stmt(call("m", vec![string("s")]))),
    ])
    .expect_err("argument type with no viable overload must fail");
    assert!(err.to_string().contains("no matching overload"), "{}", err);
}
