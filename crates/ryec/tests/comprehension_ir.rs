//! List comprehensions compile to synthesized generator classes.

mod common;

use common::*;
use rye_ast::{ComprehensionArm, ExprNode, Item, Loc, StmtNode};

fn squares_comprehension() -> Vec<Item> {
    // for y in [x*x for x in 0..3 if x != 1]: print(y)
    vec![Item::Statement(StmtNode::For {
        loc: Loc::none(),
        var: "y".to_string(),
        iterable: ExprNode::Comprehension {
            loc: Loc::none(),
            elem_type: t("Int"),
            element: Box::new(binary("*", var("x"), var("x"))),
            generators: vec![ComprehensionArm {
                var: "x".to_string(),
                source: ExprNode::Range {
                    loc: Loc::none(),
                    lo: Box::new(int(0)),
                    hi: Box::new(int(3)),
                },
                filter: Some(binary("!=", var("x"), int(1))),
            }],
        },
        body: vec![call_stmt(call("print", vec![var("y")]))],
    })]
}

#[test]
fn comprehension_instantiates_its_generator_class() -> anyhow::Result<()> {
    let ir = compile_items(squares_comprehension())?;

    assert!(
        ir.contains("@$Comprehension"),
        "no comprehension factory constructed: {}",
        ir
    );
    assert!(
        ir.contains(".getIterator"),
        "comprehension factory has no getIterator"
    );
    assert!(ir.contains("indirectbr i8*"), "no generator state machine");
    Ok(())
}

#[test]
fn comprehension_filter_and_element_use_operator_methods() -> anyhow::Result<()> {
    let ir = compile_items(squares_comprehension())?;

    // x != 1 and x*x lower onto the Int operator methods.
    assert!(ir.contains("@core.Int._neq_.Int"), "filter does not use _neq_");
    assert!(ir.contains("@core.Int._mul_.Int"), "element does not use _mul_");
    // The range sugar constructs a Range.
    assert!(ir.contains("@Range.$ctor"), "range literal never constructed");
    Ok(())
}

#[test]
fn comprehension_yields_through_the_maybe_protocol() -> anyhow::Result<()> {
    let ir = compile_items(squares_comprehension())?;
    assert!(ir.contains("@std.Just$Int.initializer.Int"));
    assert!(ir.contains("@Nothing$Int.$ctor"));
    Ok(())
}
