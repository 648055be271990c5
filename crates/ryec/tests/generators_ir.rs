//! Generator state machines: the indirect-branch header, yield resume
//! labels, and the factory/iterator pair.

mod common;

use common::*;
use rye_ast::{GeneratorNode, Item, Loc, StmtNode};

fn counter_generator() -> Item {
    Item::Generator(GeneratorNode {
        loc: Loc::none(),
        name: "Counter".to_string(),
        elem_type: t("Int"),
        params: Vec::new(),
        default_params: Vec::new(),
        body: vec![
            StmtNode::Yield {
                loc: Loc::none(),
                value: int(1),
            },
            StmtNode::Yield {
                loc: Loc::none(),
                value: int(2),
            },
            StmtNode::Yield {
                loc: Loc::none(),
                value: int(3),
            },
        ],
    })
}

fn drive_counter() -> Vec<Item> {
    vec![
        counter_generator(),
        Item::Statement(StmtNode::For {
            loc: Loc::none(),
            var: "x".to_string(),
            iterable: call("Counter", Vec::new()),
            body: vec![call_stmt(call("print", vec![var("x")]))],
        }),
    ]
}

#[test]
fn get_next_dispatches_through_an_indirect_branch() -> anyhow::Result<()> {
    let ir = compile_items(drive_counter())?;

    let header = ir
        .lines()
        .find(|l| l.contains("indirectbr i8*"))
        .expect("no indirectbr header");
    // One resume target per yield, plus the start label.
    assert!(header.contains("label %startGenerator"));
    assert!(header.contains("label %yield0"));
    assert!(header.contains("label %yield1"));
    assert!(header.contains("label %yield2"));
    assert!(!header.contains("label %yield3"));

    assert!(ir.contains("startGenerator:"));
    assert!(ir.contains("yield0:"));
    assert!(ir.contains("yield1:"));
    assert!(ir.contains("yield2:"));
    Ok(())
}

#[test]
fn yields_store_their_resume_label_before_returning() -> anyhow::Result<()> {
    let ir = compile_items(drive_counter())?;

    // Each yield arms the jump pointer with the next resume label.
    assert!(
        ir.contains("store i8* blockaddress(@main.$GenIterator"),
        "no blockaddress store: {}",
        ir
    );
    for label in ["%yield0", "%yield1", "%yield2"] {
        assert!(
            ir.contains(&format!(", {})", label)),
            "no blockaddress for {}",
            label
        );
    }
    Ok(())
}

#[test]
fn initializer_arms_the_start_label() -> anyhow::Result<()> {
    let ir = compile_items(drive_counter())?;
    assert!(
        ir.contains(", %startGenerator)"),
        "iterator initializer does not arm startGenerator"
    );
    Ok(())
}

#[test]
fn generator_yields_just_and_finishes_with_nothing() -> anyhow::Result<()> {
    let ir = compile_items(drive_counter())?;

    // yield e returns Just<Int>(e); falling off the end returns
    // Nothing<Int>().
    assert!(ir.contains("@std.Just$Int.initializer.Int"));
    assert!(ir.contains("call %class.Nothing$Int* @Nothing$Int.$ctor()"));
    Ok(())
}

#[test]
fn factory_class_carries_get_iterator() -> anyhow::Result<()> {
    let ir = compile_items(drive_counter())?;
    assert!(
        ir.contains("@main.Counter.getIterator"),
        "factory getIterator missing"
    );
    assert!(
        ir.contains("call %class.Counter* @Counter.$ctor()"),
        "factory is never constructed"
    );
    Ok(())
}

#[test]
fn generator_locals_live_in_the_iterator_payload() -> anyhow::Result<()> {
    // A generator with a local: the local is hoisted into the iterator
    // record, so getNext reads it through self rather than an alloca.
    let ir = compile_items(vec![
        Item::Generator(GeneratorNode {
            loc: Loc::none(),
            name: "Squares".to_string(),
            elem_type: t("Int"),
            params: vec![param("limit", t("Int"))],
            default_params: Vec::new(),
            body: vec![StmtNode::For {
                loc: Loc::none(),
                var: "i".to_string(),
                iterable: rye_ast::ExprNode::Range {
                    loc: Loc::none(),
                    lo: Box::new(int(0)),
                    hi: Box::new(var("limit")),
                },
                body: vec![StmtNode::Yield {
                    loc: Loc::none(),
                    value: binary("*", var("i"), var("i")),
                }],
            }],
        }),
        Item::Statement(StmtNode::For {
            loc: Loc::none(),
            var: "x".to_string(),
            iterable: call("Squares", vec![int(4)]),
            body: vec![call_stmt(call("print", vec![var("x")]))],
        }),
    ])?;

    // The iterator struct carries the jump pointer, the parameter, and
    // the hoisted loop machinery.
    let iter_struct = ir
        .lines()
        .find(|l| l.starts_with("%class.$GenIterator") && l.contains("= type"))
        .expect("iterator struct missing");
    let fields = iter_struct.matches("%class.").count();
    assert!(
        fields >= 4,
        "iterator payload too small for hoisted locals: {}",
        iter_struct
    );
    Ok(())
}
