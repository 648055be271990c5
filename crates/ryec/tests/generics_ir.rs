//! Generic monomorphization: one constructor and symbol set per
//! variation, nothing for the template.

mod common;

use common::*;
use rye_ast::Item;

fn box_class() -> Item {
    class(
        tg("Box", vec![t("T")]),
        Vec::new(),
        vec![
            attribute("value", t("T")),
            method_member(function(
                "initializer",
                vec![param("value", t("T"))],
                None,
                vec![assign(self_attr("value"), var("value"))],
            )),
            method_member(function(
                "unwrap",
                Vec::new(),
                Some(t("T")),
                vec![ret(self_attr("value"))],
            )),
        ],
    )
}

#[test]
fn variations_emit_distinct_constructors_and_symbols() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        box_class(),
        Item::Statement(local(
            "a",
            tg("Box", vec![t("Int")]),
            call_generic("Box", vec![t("Int")], vec![int(1)]),
        )),
        Item::Statement(local(
            "b",
            tg("Box", vec![t("String")]),
            call_generic("Box", vec![t("String")], vec![string("s")]),
        )),
    ])?;

    assert!(ir.contains("define %class.Box$Int* @Box$Int.$ctor()"));
    assert!(ir.contains("define %class.Box$String* @Box$String.$ctor()"));
    assert!(ir.contains("define void @main.Box$Int.initializer.Int("));
    assert!(ir.contains("define void @main.Box$String.initializer.String("));

    // Layouts are distinct and substituted.
    assert!(ir.contains("%class.Box$Int = type { i8**, %class.Int* }"));
    assert!(ir.contains("%class.Box$String = type { i8**, %class.String* }"));

    // The template itself emits no symbols.
    assert!(!ir.contains("@Box.$ctor"), "generic template emitted code");
    Ok(())
}

#[test]
fn method_return_types_substitute_per_variation() -> anyhow::Result<()> {
    let ir = compile_items(vec![
        box_class(),
        Item::Statement(local(
            "a",
            tg("Box", vec![t("Int")]),
            call_generic("Box", vec![t("Int")], vec![int(1)]),
        )),
        Item::Statement(local("v", t("Int"), method_call(var("a"), "unwrap", Vec::new()))),
    ])?;

    assert!(
        ir.contains("define %class.Int* @main.Box$Int.unwrap("),
        "unwrap does not substitute its return type: {}",
        ir
    );
    Ok(())
}

#[test]
fn unused_generic_classes_emit_nothing() -> anyhow::Result<()> {
    let ir = compile_items(vec![box_class()])?;
    assert!(!ir.contains("Box$"), "unused template produced variations");
    Ok(())
}
