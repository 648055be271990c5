//! Synthesized core modules.
//!
//! The compiler prepends two modules to every compilation: `core`, a
//! native module declaring the boxed primitives, their operator methods,
//! and the print surface (all external symbols provided by the runtime),
//! and `std`, ordinary Rye code for the Maybe protocol, iterators, and
//! ranges, built here as parse trees.

use rye_ast::{
    Access, ClassNode, ExprNode, FunctionNode, Item, Loc, MemberNode, Module, ParamNode, StmtNode,
    TypeNode,
};

fn t(name: &str) -> TypeNode {
    TypeNode::named(name)
}

fn tg(name: &str, args: Vec<TypeNode>) -> TypeNode {
    TypeNode::generic(name, args)
}

fn param(name: &str, ty: TypeNode) -> ParamNode {
    ParamNode {
        loc: Loc::none(),
        name: name.to_string(),
        ty,
    }
}

fn function(
    name: &str,
    params: Vec<ParamNode>,
    return_type: Option<TypeNode>,
    body: Vec<StmtNode>,
) -> FunctionNode {
    FunctionNode {
        loc: Loc::none(),
        name: name.to_string(),
        params,
        default_params: Vec::new(),
        return_type,
        is_abstract: false,
        body,
    }
}

fn abstract_function(
    name: &str,
    params: Vec<ParamNode>,
    return_type: Option<TypeNode>,
) -> FunctionNode {
    let mut f = function(name, params, return_type, Vec::new());
    f.is_abstract = true;
    f
}

fn member(item: Item) -> MemberNode {
    MemberNode {
        access: Some(Access::Public),
        item,
    }
}

fn class(name: TypeNode, super_types: Vec<TypeNode>, members: Vec<MemberNode>) -> ClassNode {
    ClassNode {
        loc: Loc::none(),
        name,
        super_types,
        is_abstract: false,
        members,
    }
}

fn abstract_class(
    name: TypeNode,
    super_types: Vec<TypeNode>,
    members: Vec<MemberNode>,
) -> ClassNode {
    let mut c = class(name, super_types, members);
    c.is_abstract = true;
    c
}

fn self_attr(name: &str) -> ExprNode {
    ExprNode::Member {
        loc: Loc::none(),
        target: Box::new(ExprNode::SelfExpr { loc: Loc::none() }),
        member: Box::new(ExprNode::Var {
            loc: Loc::none(),
            name: name.to_string(),
        }),
    }
}

fn var(name: &str) -> ExprNode {
    ExprNode::Var {
        loc: Loc::none(),
        name: name.to_string(),
    }
}

fn ret(value: ExprNode) -> StmtNode {
    StmtNode::Return {
        loc: Loc::none(),
        value: Some(value),
    }
}

/// A value class with a unary operator surface: the method set shared by
/// the numeric boxed primitives.
fn numeric_class(name: &str) -> ClassNode {
    let ty = || t(name);
    let arith = ["_add_", "_sub_", "_mul_", "_div_", "_mod_", "_pow_"];
    let compare = ["_eq_", "_neq_", "_lt_", "_gt_", "_leq_", "_geq_"];
    let mut members = vec![member(Item::Function(function(
        "initializer",
        vec![param("value", ty())],
        None,
        Vec::new(),
    )))];
    for op in arith {
        members.push(member(Item::Function(function(
            op,
            vec![param("other", ty())],
            Some(ty()),
            Vec::new(),
        ))));
    }
    members.push(member(Item::Function(function(
        "_neg_",
        Vec::new(),
        Some(ty()),
        Vec::new(),
    ))));
    for op in compare {
        members.push(member(Item::Function(function(
            op,
            vec![param("other", ty())],
            Some(t("Bool")),
            Vec::new(),
        ))));
    }
    members.push(member(Item::Function(function(
        "toString",
        Vec::new(),
        Some(t("String")),
        Vec::new(),
    ))));
    class(ty(), Vec::new(), members)
}

fn bool_class() -> ClassNode {
    let ty = || t("Bool");
    let binary = ["_and_", "_or_", "_xor_", "_eq_", "_neq_"];
    let mut members = vec![member(Item::Function(function(
        "initializer",
        vec![param("value", ty())],
        None,
        Vec::new(),
    )))];
    for op in binary {
        let rt = ty();
        members.push(member(Item::Function(function(
            op,
            vec![param("other", ty())],
            Some(rt),
            Vec::new(),
        ))));
    }
    members.push(member(Item::Function(function(
        "_not_",
        Vec::new(),
        Some(ty()),
        Vec::new(),
    ))));
    class(ty(), Vec::new(), members)
}

fn char_class() -> ClassNode {
    let ty = || t("Char");
    class(
        ty(),
        Vec::new(),
        vec![
            member(Item::Function(function(
                "initializer",
                vec![param("value", ty())],
                None,
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_eq_",
                vec![param("other", ty())],
                Some(t("Bool")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_neq_",
                vec![param("other", ty())],
                Some(t("Bool")),
                Vec::new(),
            ))),
        ],
    )
}

fn string_class() -> ClassNode {
    let ty = || t("String");
    class(
        ty(),
        Vec::new(),
        vec![
            member(Item::Function(function(
                "initializer",
                vec![param("value", ty())],
                None,
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_add_",
                vec![param("other", ty())],
                Some(ty()),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_eq_",
                vec![param("other", ty())],
                Some(t("Bool")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_neq_",
                vec![param("other", ty())],
                Some(t("Bool")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "length",
                Vec::new(),
                Some(t("Int")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_contains_",
                vec![param("value", t("Char"))],
                Some(t("Bool")),
                Vec::new(),
            ))),
        ],
    )
}

fn array_class() -> ClassNode {
    class(
        tg("Array", vec![t("T")]),
        Vec::new(),
        vec![
            member(Item::Function(function(
                "initializer",
                vec![param("values", tg("Array", vec![t("T")]))],
                None,
                Vec::new(),
            ))),
            member(Item::Function(function(
                "get",
                vec![param("index", t("Int"))],
                Some(t("T")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "set",
                vec![param("index", t("Int")), param("value", t("T"))],
                None,
                Vec::new(),
            ))),
            member(Item::Function(function(
                "size",
                Vec::new(),
                Some(t("Int")),
                Vec::new(),
            ))),
            member(Item::Function(function(
                "_contains_",
                vec![param("value", t("T"))],
                Some(t("Bool")),
                Vec::new(),
            ))),
        ],
    )
}

/// The native `core` module.
pub fn core_module() -> Module {
    let mut items = vec![
        Item::Class(class(t("Object"), Vec::new(), Vec::new())),
        Item::Class(class(t("Void"), Vec::new(), Vec::new())),
        Item::Class(numeric_class("Int")),
        Item::Class(numeric_class("Float")),
        Item::Class(bool_class()),
        Item::Class(char_class()),
        Item::Class(string_class()),
        Item::Class(array_class()),
    ];
    for ty in ["Int", "Float", "String", "Bool", "Char"] {
        items.push(Item::Function(function(
            "print",
            vec![param("value", t(ty))],
            None,
            Vec::new(),
        )));
    }
    Module {
        name: "core".to_string(),
        native: true,
        imports: Vec::new(),
        items,
    }
}

/// The `std` module: the Maybe protocol, iterators, ranges.
pub fn std_module() -> Module {
    let maybe = abstract_class(
        tg("Maybe", vec![t("T")]),
        Vec::new(),
        vec![
            member(Item::Function(abstract_function(
                "hasValue",
                Vec::new(),
                Some(t("Bool")),
            ))),
            member(Item::Function(abstract_function(
                "getValue",
                Vec::new(),
                Some(t("T")),
            ))),
        ],
    );

    let just = class(
        tg("Just", vec![t("T")]),
        vec![tg("Maybe", vec![t("T")])],
        vec![
            member(Item::Variable(rye_ast::VariableNode {
                loc: Loc::none(),
                name: "value".to_string(),
                ty: t("T"),
                init: None,
            })),
            member(Item::Function(function(
                "initializer",
                vec![param("value", t("T"))],
                None,
                vec![StmtNode::Assign {
                    loc: Loc::none(),
                    target: self_attr("value"),
                    value: var("value"),
                }],
            ))),
            member(Item::Function(function(
                "hasValue",
                Vec::new(),
                Some(t("Bool")),
                vec![ret(ExprNode::Bool {
                    loc: Loc::none(),
                    value: true,
                })],
            ))),
            member(Item::Function(function(
                "getValue",
                Vec::new(),
                Some(t("T")),
                vec![ret(self_attr("value"))],
            ))),
        ],
    );

    let nothing = class(
        tg("Nothing", vec![t("T")]),
        vec![tg("Maybe", vec![t("T")])],
        vec![
            member(Item::Function(function(
                "hasValue",
                Vec::new(),
                Some(t("Bool")),
                vec![ret(ExprNode::Bool {
                    loc: Loc::none(),
                    value: false,
                })],
            ))),
            // Taking a value out of Nothing is a runtime error.
            member(Item::Function(function(
                "getValue",
                Vec::new(),
                Some(t("T")),
                vec![StmtNode::Raise {
                    loc: Loc::none(),
                    value: None,
                }],
            ))),
        ],
    );

    let iterator = abstract_class(
        tg("Iterator", vec![t("T")]),
        Vec::new(),
        vec![member(Item::Function(abstract_function(
            "getNext",
            Vec::new(),
            Some(tg("Maybe", vec![t("T")])),
        )))],
    );

    let function_class = abstract_class(
        tg("Function", vec![t("A"), t("B")]),
        Vec::new(),
        vec![member(Item::Function(abstract_function(
            "_apply_",
            vec![param("argument", t("A"))],
            Some(t("B")),
        )))],
    );

    let range = class(
        t("Range"),
        Vec::new(),
        vec![
            member(Item::Variable(rye_ast::VariableNode {
                loc: Loc::none(),
                name: "first".to_string(),
                ty: t("Int"),
                init: None,
            })),
            member(Item::Variable(rye_ast::VariableNode {
                loc: Loc::none(),
                name: "last".to_string(),
                ty: t("Int"),
                init: None,
            })),
            member(Item::Function(function(
                "initializer",
                vec![param("first", t("Int")), param("last", t("Int"))],
                None,
                vec![
                    StmtNode::Assign {
                        loc: Loc::none(),
                        target: self_attr("first"),
                        value: var("first"),
                    },
                    StmtNode::Assign {
                        loc: Loc::none(),
                        target: self_attr("last"),
                        value: var("last"),
                    },
                ],
            ))),
            member(Item::Function(function(
                "getIterator",
                Vec::new(),
                Some(t("RangeIterator")),
                vec![ret(ExprNode::Call {
                    loc: Loc::none(),
                    name: "RangeIterator".to_string(),
                    type_args: Vec::new(),
                    args: vec![self_attr("first"), self_attr("last")],
                })],
            ))),
        ],
    );

    let range_iterator = class(
        t("RangeIterator"),
        vec![tg("Iterator", vec![t("Int")])],
        vec![
            member(Item::Variable(rye_ast::VariableNode {
                loc: Loc::none(),
                name: "current".to_string(),
                ty: t("Int"),
                init: None,
            })),
            member(Item::Variable(rye_ast::VariableNode {
                loc: Loc::none(),
                name: "last".to_string(),
                ty: t("Int"),
                init: None,
            })),
            member(Item::Function(function(
                "initializer",
                vec![param("first", t("Int")), param("last", t("Int"))],
                None,
                vec![
                    StmtNode::Assign {
                        loc: Loc::none(),
                        target: self_attr("current"),
                        value: var("first"),
                    },
                    StmtNode::Assign {
                        loc: Loc::none(),
                        target: self_attr("last"),
                        value: var("last"),
                    },
                ],
            ))),
            member(Item::Function(function(
                "getNext",
                Vec::new(),
                Some(tg("Maybe", vec![t("Int")])),
                vec![StmtNode::If {
                    loc: Loc::none(),
                    cond: ExprNode::Binary {
                        loc: Loc::none(),
                        op: "<".to_string(),
                        left: Box::new(self_attr("current")),
                        right: Box::new(self_attr("last")),
                    },
                    then_body: vec![
                        StmtNode::Item(Box::new(Item::Variable(rye_ast::VariableNode {
                            loc: Loc::none(),
                            name: "value".to_string(),
                            ty: t("Int"),
                            init: Some(self_attr("current")),
                        }))),
                        StmtNode::Assign {
                            loc: Loc::none(),
                            target: self_attr("current"),
                            value: ExprNode::Binary {
                                loc: Loc::none(),
                                op: "+".to_string(),
                                left: Box::new(self_attr("current")),
                                right: Box::new(ExprNode::Int {
                                    loc: Loc::none(),
                                    value: 1,
                                }),
                            },
                        },
                        ret(ExprNode::Call {
                            loc: Loc::none(),
                            name: "Just".to_string(),
                            type_args: vec![t("Int")],
                            args: vec![var("value")],
                        }),
                    ],
                    elifs: Vec::new(),
                    else_body: vec![ret(ExprNode::Call {
                        loc: Loc::none(),
                        name: "Nothing".to_string(),
                        type_args: vec![t("Int")],
                        args: Vec::new(),
                    })],
                }],
            ))),
        ],
    );

    Module {
        name: "std".to_string(),
        native: false,
        imports: Vec::new(),
        items: vec![
            Item::Class(maybe),
            Item::Class(just),
            Item::Class(nothing),
            Item::Class(iterator),
            Item::Class(function_class),
            Item::Class(range),
            Item::Class(range_iterator),
        ],
    }
}

/// Both synthesized modules, in compilation order.
pub fn core_modules() -> Vec<Module> {
    vec![core_module(), std_module()]
}
