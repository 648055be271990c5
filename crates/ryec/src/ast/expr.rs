//! Expression nodes.
//!
//! Every expression carries its resolved type and an l-value flag, both
//! filled in by the resolver. During emission each expression pushes
//! exactly one value onto the evaluation stack.

use super::{DeclId, ExprId, Identifier, Position, Ty};

#[derive(Debug)]
pub struct Expression {
    pub position: Position,
    pub kind: ExprKind,
    /// Resolved type of the evaluated expression.
    pub ty: Option<Ty>,
    /// True when this expression denotes an assignable location.
    pub lvalue: bool,
}

impl Expression {
    pub fn new(position: Position, kind: ExprKind) -> Self {
        Expression {
            position,
            kind,
            ty: None,
            lvalue: false,
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    CharLiteral(char),
    StringLiteral(String),
    ArrayLiteral(Vec<ExprId>),
    Variable {
        name: Identifier,
        decl: Option<DeclId>,
    },
    /// `left.right`; `right` is a variable access or a function call.
    Member {
        left: ExprId,
        right: ExprId,
    },
    SelfExpr,
    /// `parent(T)`: `self` viewed as the supertype `T`.
    Parent {
        type_ident: Identifier,
        target: Option<Ty>,
    },
    Call {
        name: Identifier,
        args: Vec<ExprId>,
        /// Resolved callee.
        decl: Option<DeclId>,
    },
    Cast {
        value: ExprId,
        type_ident: Identifier,
        target: Option<Ty>,
    },
    Is {
        value: ExprId,
        type_ident: Identifier,
        target: Option<Ty>,
    },
    Conditional {
        condition: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    /// The null constant of the expression's class type; used by the
    /// synthesized returns of abstract functions.
    Zero,
}
