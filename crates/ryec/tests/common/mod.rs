//! Shared helpers for the ryec test suite.
//!
//! Tests construct parse trees programmatically (the parser is an
//! external collaborator) and compile them to IR text with diagnostics
//! suppressed, then assert on the generated document.

use rye_ast::*;

/// Compiles a single `main` module built from `items` and returns the
/// IR document.
#[allow(dead_code)]
pub fn compile_items(items: Vec<Item>) -> anyhow::Result<String> {
    let _guard = ryec::diagnostics::suppress();
    let module = Module {
        name: "main".to_string(),
        native: false,
        imports: Vec::new(),
        items,
    };
    ryec::compile_parse_trees(std::slice::from_ref(&module))
        .map_err(|d| anyhow::anyhow!("{}", d))
}

// ----- a tiny parse-tree building DSL -----

#[allow(dead_code)]
pub fn t(name: &str) -> TypeNode {
    TypeNode::named(name)
}

#[allow(dead_code)]
pub fn tg(name: &str, args: Vec<TypeNode>) -> TypeNode {
    TypeNode::generic(name, args)
}

#[allow(dead_code)]
pub fn int(value: i64) -> ExprNode {
    ExprNode::Int {
        loc: Loc::none(),
        value,
    }
}

#[allow(dead_code)]
pub fn float(value: f64) -> ExprNode {
    ExprNode::Float {
        loc: Loc::none(),
        value,
    }
}

#[allow(dead_code)]
pub fn boolean(value: bool) -> ExprNode {
    ExprNode::Bool {
        loc: Loc::none(),
        value,
    }
}

#[allow(dead_code)]
pub fn string(value: &str) -> ExprNode {
    ExprNode::Str {
        loc: Loc::none(),
        value: value.to_string(),
    }
}

#[allow(dead_code)]
pub fn var(name: &str) -> ExprNode {
    ExprNode::Var {
        loc: Loc::none(),
        name: name.to_string(),
    }
}

#[allow(dead_code)]
pub fn self_expr() -> ExprNode {
    ExprNode::SelfExpr { loc: Loc::none() }
}

#[allow(dead_code)]
pub fn self_attr(name: &str) -> ExprNode {
    member(self_expr(), var(name))
}

#[allow(dead_code)]
pub fn member(target: ExprNode, inner: ExprNode) -> ExprNode {
    ExprNode::Member {
        loc: Loc::none(),
        target: Box::new(target),
        member: Box::new(inner),
    }
}

#[allow(dead_code)]
pub fn call(name: &str, args: Vec<ExprNode>) -> ExprNode {
    ExprNode::Call {
        loc: Loc::none(),
        name: name.to_string(),
        type_args: Vec::new(),
        args,
    }
}

#[allow(dead_code)]
pub fn call_generic(name: &str, type_args: Vec<TypeNode>, args: Vec<ExprNode>) -> ExprNode {
    ExprNode::Call {
        loc: Loc::none(),
        name: name.to_string(),
        type_args,
        args,
    }
}

#[allow(dead_code)]
pub fn method_call(target: ExprNode, name: &str, args: Vec<ExprNode>) -> ExprNode {
    member(target, call(name, args))
}

#[allow(dead_code)]
pub fn binary(op: &str, left: ExprNode, right: ExprNode) -> ExprNode {
    ExprNode::Binary {
        loc: Loc::none(),
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[allow(dead_code)]
pub fn param(name: &str, ty: TypeNode) -> ParamNode {
    ParamNode {
        loc: Loc::none(),
        name: name.to_string(),
        ty,
    }
}

#[allow(dead_code)]
pub fn assign(target: ExprNode, value: ExprNode) -> StmtNode {
    StmtNode::Assign {
        loc: Loc::none(),
        target,
        value,
    }
}

#[allow(dead_code)]
pub fn ret(value: ExprNode) -> StmtNode {
    StmtNode::Return {
        loc: Loc::none(),
        value: Some(value),
    }
}

#[allow(dead_code)]
pub fn call_stmt(expr: ExprNode) -> StmtNode {
    StmtNode::Call {
        loc: Loc::none(),
        call: expr,
    }
}

#[allow(dead_code)]
pub fn local(name: &str, ty: TypeNode, init: ExprNode) -> StmtNode {
    StmtNode::Item(Box::new(Item::Variable(VariableNode {
        loc: Loc::none(),
        name: name.to_string(),
        ty,
        init: Some(init),
    })))
}

#[allow(dead_code)]
pub fn function(
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

#[allow(dead_code)]
pub fn method_member(f: FunctionNode) -> MemberNode {
    MemberNode {
        access: None,
        item: Item::Function(f),
    }
}

#[allow(dead_code)]
pub fn attribute(name: &str, ty: TypeNode) -> MemberNode {
    MemberNode {
        access: None,
        item: Item::Variable(VariableNode {
            loc: Loc::none(),
            name: name.to_string(),
            ty,
            init: None,
        }),
    }
}

#[allow(dead_code)]
pub fn class(name: TypeNode, super_types: Vec<TypeNode>, members: Vec<MemberNode>) -> Item {
    Item::Class(ClassNode {
        loc: Loc::none(),
        name,
        super_types,
        is_abstract: false,
        members,
    })
}

/// `initializer` storing one tag string into `attr`.
#[allow(dead_code)]
pub fn tag_initializer(params: Vec<ParamNode>, tag: &str) -> MemberNode {
    method_member(function(
        "initializer",
        params,
        None,
        vec![
            assign(self_attr("attr"), string(tag)),
            call_stmt(call("print", vec![string(tag)])),
        ],
    ))
}
