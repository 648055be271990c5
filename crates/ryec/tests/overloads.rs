//! Overload resolution: initializer overloading by argument types and
//! best-match selection by summed inheritance distance.

mod common;

use common::*;
use rye_ast::Item;

fn ab_class() -> Item {
    class(
        t("Ab"),
        Vec::new(),
        vec![
            attribute("attr", t("String")),
            tag_initializer(Vec::new(), ":empty"),
            tag_initializer(vec![param("a", t("Int"))], ":i"),
            tag_initializer(vec![param("a", t("Float"))], ":f"),
            tag_initializer(vec![param("a", t("String"))], ":s"),
            tag_initializer(vec![param("a", t("Bool"))], ":b"),
            tag_initializer(vec![param("a", t("Int")), param("b", t("Int"))], ":ii"),
            tag_initializer(vec![param("a", t("Float")), param("b", t("Float"))], ":ff"),
            tag_initializer(
                vec![param("a", t("String")), param("b", t("String"))],
                ":ss",
            ),
            tag_initializer(vec![param("a", t("Bool")), param("b", t("Bool"))], ":bb"),
        ],
    )
}

#[test]
fn initializer_overloads_get_distinct_symbols_and_fire_in_order() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        ab_class(),
        Item::Statement(call_stmt(call("Ab", Vec::new()))),
        Item::Statement(call_stmt(call("Ab", vec![int(1)]))),
        Item::Statement(call_stmt(call("Ab", vec![float(1.5)]))),
        Item::Statement(call_stmt(call("Ab", vec![string("x")]))),
        Item::Statement(call_stmt(call("Ab", vec![boolean(true)]))),
        Item::Statement(call_stmt(call("Ab", vec![int(1), int(2)]))),
        Item::Statement(call_stmt(call("Ab", vec![float(1.0), float(2.0)]))),
        Item::Statement(call_stmt(call("Ab", vec![string("a"), string("b")]))),
        Item::Statement(call_stmt(call("Ab", vec![boolean(true), boolean(false)]))),
    ])?;

    for symbol in [
        "define void @main.Ab.initializer.Int(",
        "define void @main.Ab.initializer.Float(",
        "define void @main.Ab.initializer.String(",
        "define void @main.Ab.initializer.Bool(",
        "define void @main.Ab.initializer.Int.Int(",
        "define void @main.Ab.initializer.Float.Float(",
        "define void @main.Ab.initializer.String.String(",
        "define void @main.Ab.initializer.Bool.Bool(",
    ] {
        assert!(ir.contains(symbol), "overload symbol missing: {}", symbol);
    }

    // Construction order follows declaration order of the statements.
    let order = [
        "call void @main.Ab.initializer.Int(",
        "call void @main.Ab.initializer.Float(",
        "call void @main.Ab.initializer.String(",
        "call void @main.Ab.initializer.Bool(",
        "call void @main.Ab.initializer.Int.Int(",
    ];
    let mut last = 0;
    for needle in order {
        let at = ir[last..]
            .find(needle)
            .unwrap_or_else(|| panic!("call not found in order: {}", needle));
        last += at + needle.len();
    }

    // Every tag string lands in the constant region.
    for tag in [":empty", ":i", ":f", ":s", ":b", ":ii", ":ff", ":ss", ":bb"] {
        assert!(ir.contains(&format!("c\"{}\\00\"", tag)), "tag {} missing", tag);
    }
    Ok(())
}

#[test]
fn fresh_construction_runs_the_default_initializer_first() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        ab_class(),
        Item::Statement(call_stmt(call("Ab", vec![int(1)]))),
    ])?;

    let ctor = ir.find("call %class.Ab* @Ab.$ctor()").expect("no allocation");
    let default_init = ir
        .find("call void @main.Ab.initializer(")
        .expect("default initializer is not invoked");
    let chosen = ir
        .find("call void @main.Ab.initializer.Int(")
        .expect("chosen initializer is not invoked");
    assert!(
        ctor < default_init && default_init < chosen,
        "allocation, default initializer, chosen initializer must run in order"
    );
    Ok(())
}

#[test]
fn overload_selection_minimizes_type_distance() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        class(t("A"), Vec::new(), Vec::new()),
        class(t("B"), vec![t("A")], Vec::new()),
        class(t("C"), vec![t("B")], Vec::new()),
        Item::Function(function("m", vec![param("x", t("A"))], None, Vec::new())),
        Item::Function(function("m", vec![param("x", t("B"))], None, Vec::new())),
        Item::Statement(call_stmt(call("m", vec![call("B", Vec::new())]))),
        Item::Statement(call_stmt(call("m", vec![call("C", Vec::new())]))),
    ])?;

    // m(new B()) picks m(B) at distance 0; m(new C()) still picks m(B)
    // at distance 1 over m(A) at distance 2.
    assert_eq!(
        ir.matches("call void @main.m.B(").count(),
        2,
        "both calls must select m(B)"
    );
    assert!(
        !ir.contains("call void @main.m.A("),
        "m(A) must never be selected"
    );
    Ok(())
}

#[test]
fn ambiguous_overloads_are_a_resolution_error() {
    // B inherits from both A and A2; m(A) and m(A2) are equidistant.
    let result = compile_items(vec![
        class(t("A"), Vec::new(), Vec::new()),
        class(t("A2"), Vec::new(), Vec::new()),
        class(t("B"), vec![t("A"), t("A2")], Vec::new()),
        Item::Function(function("m", vec![param("x", t("A"))], None, Vec::new())),
        Item::Function(function("m", vec![param("x", t("A2"))], None, Vec::new())),
        Item::Statement(call_stmt(call("m", vec![call("B", Vec::new())]))),
    ]);

    let err = result.expect_err("equidistant overloads must not resolve");
    assert!(
        err.to_string().contains("ambiguous"),
        "unexpected error: {}",
        err
    );
}
