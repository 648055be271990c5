//! Builder-level tests: the desugarings produce the documented AST
//! shapes.

mod common;

use common::*;
use rye_ast::{ComprehensionArm, ExprNode, Item, Loc, Module, StmtNode};
use ryec::ast::{ExprKind, Program, StmtKind};
use ryec::builder::{AstBuilder, TmpIdents, TupleRegistry};

fn build(items: Vec<Item>) -> Program {
    let mut program = Program::new();
    let mut tmp = TmpIdents::new();
    let mut tuples = TupleRegistry::new();
    let module = Module {
        name: "main".to_string(),
        native: false,
        imports: Vec::new(),
        items,
    };
    {
        let mut builder = AstBuilder::new(&mut program, "main.rye", &mut tmp, &mut tuples);
        builder.build_module(&module).expect("build failed");
    }
    program
}

#[test]
fn for_in_lowers_to_iterator_while_loop() {
    let program = build(vec![Item::Statement(StmtNode::For {
        loc: Loc::none(),
        var: "x".to_string(),
        iterable: call("Range", vec![int(0), int(3)]),
        body: vec![call_stmt(call("print", vec![var("x")]))],
    })]);

    // The loop is a `while true` whose body fetches getNext, tests
    // hasValue, and breaks in the else arm.
    let while_stmt = program
        .stmts
        .iter()
        .find_map(|s| match &s.kind {
            StmtKind::While { condition, body } => Some((*condition, *body)),
            _ => None,
        })
        .expect("no while loop synthesized");
    let (condition, body) = while_stmt;
    assert!(matches!(
        program.expr(condition).kind,
        ExprKind::BoolLiteral(true)
    ));

    let body_stmts = &program.block(body).statements;
    assert_eq!(body_stmts.len(), 2, "getNext assignment plus conditional");
    assert!(matches!(
        program.stmt(body_stmts[0]).kind,
        StmtKind::Assignment { .. }
    ));
    let (then_block, else_block) = match &program.stmt(body_stmts[1]).kind {
        StmtKind::Conditional {
            then_block,
            else_block,
            ..
        } => (*then_block, *else_block),
        other => panic!("expected conditional, got {:?}", other),
    };
    // v := ($maybe as Just<T>).getValue() is prepended to the body.
    let first_then = program.block(then_block).statements[0];
    assert!(matches!(
        program.stmt(first_then).kind,
        StmtKind::Assignment { .. }
    ));
    let else_stmts = &program.block(else_block).statements;
    assert!(matches!(
        program.stmt(else_stmts[0]).kind,
        StmtKind::Break { .. }
    ));
}

#[test]
fn compound_assignment_lowers_to_operator_call() {
    let program = build(vec![
        Item::Statement(local("a", t("Int"), int(1))),
        Item::Statement(StmtNode::CompoundAssign {
            loc: Loc::none(),
            target: var("a"),
            op: "+".to_string(),
            value: int(2),
        }),
    ]);

    // a += 2 becomes a := a._add_(2)
    let found = program.stmts.iter().any(|s| {
        if let StmtKind::Assignment { right, .. } = &s.kind {
            if let ExprKind::Member { right, .. } = &program.expr(*right).kind {
                if let ExprKind::Call { name, .. } = &program.expr(*right).kind {
                    return name.name == "_add_";
                }
            }
        }
        false
    });
    assert!(found, "no _add_ member call synthesized");
}

#[test]
fn in_operator_inverts_receiver() {
    let program = build(vec![Item::Statement(local(
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
    ))]);

    // `3 in xs` becomes xs._contains_(3): the container is the receiver.
    let found = program.exprs.iter().any(|e| {
        if let ExprKind::Member { left, right } = &e.kind {
            let receiver_is_array =
                matches!(program.expr(*left).kind, ExprKind::ArrayLiteral(_));
            if let ExprKind::Call { name, args, .. } = &program.expr(*right).kind {
                return receiver_is_array
                    && name.name == "_contains_"
                    && args.len() == 1
                    && matches!(program.expr(args[0]).kind, ExprKind::IntLiteral(3));
            }
        }
        false
    });
    assert!(found, "in-operator was not inverted onto the container");
}

#[test]
fn generator_declaration_synthesizes_iterator_class() {
    let program = build(vec![Item::Generator(rye_ast::GeneratorNode {
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
    })]);

    let iterator = program
        .decls
        .iter()
        .find_map(|d| match d {
            ryec::ast::Declaration::Class(c) if c.is_generator => Some(c),
            _ => None,
        })
        .expect("no iterator class synthesized");

    // getNext carries the three yields, in order.
    let get_next = program
        .block(iterator.block)
        .declarations
        .iter()
        .find_map(|d| match program.decl(*d) {
            ryec::ast::Declaration::Function(f) if f.identifier.name == "getNext" => Some(f),
            _ => None,
        })
        .expect("iterator has no getNext");
    assert_eq!(get_next.yields.len(), 3);
    for (i, y) in get_next.yields.iter().enumerate() {
        match &program.stmt(*y).kind {
            StmtKind::Yield { index, value } => {
                assert_eq!(*index as usize, i);
                // yield e is return Just<T>(e)
                match &program.expr(*value).kind {
                    ExprKind::Call { name, .. } => assert_eq!(name.name, "Just"),
                    other => panic!("yield value is not a Just call: {:?}", other),
                }
            }
            other => panic!("expected yield, got {:?}", other),
        }
    }
}

#[test]
fn comprehension_synthesizes_generator_and_instantiates_it() {
    let program = build(vec![Item::Statement(StmtNode::For {
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
    })]);

    let comprehension_class = program
        .decls
        .iter()
        .find_map(|d| match d {
            ryec::ast::Declaration::Class(c)
                if c.identifier.name.starts_with("$Comprehension") =>
            {
                Some(c.identifier.name.clone())
            }
            _ => None,
        })
        .expect("no comprehension factory class");

    // The expression's value is a fresh instance of that class.
    let instantiated = program.exprs.iter().any(|e| match &e.kind {
        ExprKind::Call { name, args, .. } => name.name == comprehension_class && args.is_empty(),
        _ => false,
    });
    assert!(instantiated, "comprehension class is never instantiated");
}

#[test]
fn default_arguments_synthesize_prefix_overloads() {
    let program = build(vec![Item::Function(rye_ast::FunctionNode {
        loc: Loc::none(),
        name: "pad".to_string(),
        params: vec![param("text", t("String"))],
        default_params: vec![rye_ast::DefaultParamNode {
            param: param("width", t("Int")),
            value: int(8),
        }],
        return_type: Some(t("String")),
        is_abstract: false,
        body: vec![ret(var("text"))],
    })]);

    let overloads: Vec<usize> = program
        .decls
        .iter()
        .filter_map(|d| match d {
            ryec::ast::Declaration::Function(f) if f.identifier.name == "pad" => {
                Some(f.parameters.len())
            }
            _ => None,
        })
        .collect();
    assert!(
        overloads.contains(&1) && overloads.contains(&2),
        "expected the one-argument thunk and the maximal overload, got {:?}",
        overloads
    );
}

#[test]
fn procedures_get_a_trailing_return() {
    let program = build(vec![Item::Function(function(
        "note",
        Vec::new(),
        None,
        vec![call_stmt(call("print", vec![string("hi")]))],
    ))]);

    let body = program
        .decls
        .iter()
        .find_map(|d| match d {
            ryec::ast::Declaration::Function(f) if f.identifier.name == "note" => Some(f.body),
            _ => None,
        })
        .expect("function missing");
    let last = *program.block(body).statements.last().expect("empty body");
    assert!(matches!(
        program.stmt(last).kind,
        StmtKind::Return { value: None }
    ));
}

#[test]
fn lambda_synthesizes_wrapper_object() {
    let program = build(vec![Item::Statement(call_stmt(call(
        "print",
        vec![member(
            ExprNode::Lambda {
                loc: Loc::none(),
                params: vec![param("x", t("Int"))],
                body: Box::new(binary("+", var("x"), int(1))),
            },
            call("_apply_", vec![int(3)]),
        )],
    )))]);

    let wrapper = program.decls.iter().any(|d| match d {
        ryec::ast::Declaration::Class(c) => c.is_function_wrapper,
        _ => false,
    });
    assert!(wrapper, "no wrapper class synthesized for the lambda");

    // The lambda expression evaluates to an access of the wrapper
    // object.
    let object_access = program.exprs.iter().any(|e| match &e.kind {
        ExprKind::Variable { name, .. } => name.name.starts_with("$fnobj"),
        _ => false,
    });
    assert!(object_access, "lambda value is not the wrapper object");
}
