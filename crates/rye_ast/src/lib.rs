//! Rye parse-tree definitions
//!
//! This crate defines the parse tree for the Rye language. It serves as
//! the contract between the parser and the compiler core: the parser (an
//! external tool) produces these nodes, and `ryec` consumes them. All
//! types carry `serde` derives so a parse tree can be exchanged as a
//! document (`.ast.json`).

use serde::{Deserialize, Serialize};

/// A line/column location inside one source file. `(0, 0)` marks a
/// synthesized node with no surface counterpart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub line: u32,
    pub column: u32,
}

impl Loc {
    pub fn new(line: u32, column: u32) -> Self {
        Loc { line, column }
    }

    /// Location for synthesized nodes.
    pub fn none() -> Self {
        Loc::default()
    }
}

/// One source file worth of parse tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Native modules declare bodies but do not emit them; calls become
    /// external symbols.
    #[serde(default)]
    pub native: bool,
    #[serde(default)]
    pub imports: Vec<String>,
    pub items: Vec<Item>,
}

/// Top-level and class-member items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Class(ClassNode),
    Function(FunctionNode),
    Generator(GeneratorNode),
    Variable(VariableNode),
    Statement(StmtNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassNode {
    pub loc: Loc,
    /// Class name with its formal generic parameters, e.g. `Box<T>`.
    pub name: TypeNode,
    #[serde(default)]
    pub super_types: Vec<TypeNode>,
    #[serde(default)]
    pub is_abstract: bool,
    pub members: Vec<MemberNode>,
}

/// A class member with its optional access modifier. When no modifier
/// is given the member defaults to package visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberNode {
    #[serde(default)]
    pub access: Option<Access>,
    pub item: Item,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    pub loc: Loc,
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamNode>,
    #[serde(default)]
    pub default_params: Vec<DefaultParamNode>,
    /// Absent return type marks a procedure.
    #[serde(default)]
    pub return_type: Option<TypeNode>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub body: Vec<StmtNode>,
}

/// A generator declaration: `generator Evens -> Int (limit: Int): ...`.
/// The builder rewrites this into a factory class plus an iterator class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorNode {
    pub loc: Loc,
    pub name: String,
    pub elem_type: TypeNode,
    #[serde(default)]
    pub params: Vec<ParamNode>,
    #[serde(default)]
    pub default_params: Vec<DefaultParamNode>,
    pub body: Vec<StmtNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableNode {
    pub loc: Loc,
    pub name: String,
    pub ty: TypeNode,
    #[serde(default)]
    pub init: Option<ExprNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamNode {
    pub loc: Loc,
    pub name: String,
    pub ty: TypeNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultParamNode {
    pub param: ParamNode,
    pub value: ExprNode,
}

/// Type annotations. Arrow and tuple forms are surface sugar; the
/// builder lowers them onto the `Function`/`TupleN` class families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeNode {
    Named {
        loc: Loc,
        name: String,
        #[serde(default)]
        args: Vec<TypeNode>,
    },
    Tuple {
        loc: Loc,
        elems: Vec<TypeNode>,
    },
    Function {
        loc: Loc,
        params: Vec<TypeNode>,
        ret: Box<TypeNode>,
    },
}

impl TypeNode {
    pub fn named(name: &str) -> Self {
        TypeNode::Named {
            loc: Loc::none(),
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<TypeNode>) -> Self {
        TypeNode::Named {
            loc: Loc::none(),
            name: name.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtNode {
    Assign {
        loc: Loc,
        target: ExprNode,
        value: ExprNode,
    },
    /// `a ⊕= b`; `op` is the surface operator without the `=`.
    CompoundAssign {
        loc: Loc,
        target: ExprNode,
        op: String,
        value: ExprNode,
    },
    Unpack {
        loc: Loc,
        targets: Vec<UnpackTarget>,
        value: ExprNode,
    },
    If {
        loc: Loc,
        cond: ExprNode,
        then_body: Vec<StmtNode>,
        #[serde(default)]
        elifs: Vec<ElifNode>,
        #[serde(default)]
        else_body: Vec<StmtNode>,
    },
    While {
        loc: Loc,
        cond: ExprNode,
        body: Vec<StmtNode>,
    },
    For {
        loc: Loc,
        var: String,
        iterable: ExprNode,
        body: Vec<StmtNode>,
    },
    Break {
        loc: Loc,
    },
    Skip {
        loc: Loc,
    },
    Return {
        loc: Loc,
        #[serde(default)]
        value: Option<ExprNode>,
    },
    Yield {
        loc: Loc,
        value: ExprNode,
    },
    Raise {
        loc: Loc,
        #[serde(default)]
        value: Option<ExprNode>,
    },
    Try {
        loc: Loc,
        error: ParamNode,
        try_body: Vec<StmtNode>,
        handle_body: Vec<StmtNode>,
    },
    /// An expression used as a statement; must be a call.
    Call {
        loc: Loc,
        call: ExprNode,
    },
    /// A nested declaration inside a statement list.
    Item(Box<Item>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElifNode {
    pub cond: ExprNode,
    pub body: Vec<StmtNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UnpackTarget {
    /// `(Int a, b) := e` — declares a fresh variable.
    Declare(VariableNode),
    /// Assigns into an existing l-value.
    Target(ExprNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprNode {
    Int {
        loc: Loc,
        value: i64,
    },
    Float {
        loc: Loc,
        value: f64,
    },
    Bool {
        loc: Loc,
        value: bool,
    },
    Char {
        loc: Loc,
        value: char,
    },
    Str {
        loc: Loc,
        value: String,
    },
    Array {
        loc: Loc,
        elems: Vec<ExprNode>,
    },
    Tuple {
        loc: Loc,
        elems: Vec<ExprNode>,
    },
    /// `a..b`, sugar for `Range(a, b)`.
    Range {
        loc: Loc,
        lo: Box<ExprNode>,
        hi: Box<ExprNode>,
    },
    Var {
        loc: Loc,
        name: String,
    },
    SelfExpr {
        loc: Loc,
    },
    Parent {
        loc: Loc,
        ty: TypeNode,
    },
    Member {
        loc: Loc,
        target: Box<ExprNode>,
        member: Box<ExprNode>,
    },
    /// A call by name; constructor calls may carry generic arguments,
    /// e.g. `Just<Int>(3)`.
    Call {
        loc: Loc,
        name: String,
        #[serde(default)]
        type_args: Vec<TypeNode>,
        args: Vec<ExprNode>,
    },
    Binary {
        loc: Loc,
        op: String,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Unary {
        loc: Loc,
        op: String,
        operand: Box<ExprNode>,
    },
    IfExpr {
        loc: Loc,
        cond: Box<ExprNode>,
        then_expr: Box<ExprNode>,
        else_expr: Box<ExprNode>,
    },
    As {
        loc: Loc,
        value: Box<ExprNode>,
        ty: TypeNode,
    },
    Is {
        loc: Loc,
        value: Box<ExprNode>,
        ty: TypeNode,
    },
    Lambda {
        loc: Loc,
        params: Vec<ParamNode>,
        body: Box<ExprNode>,
    },
    Comprehension {
        loc: Loc,
        elem_type: TypeNode,
        element: Box<ExprNode>,
        generators: Vec<ComprehensionArm>,
    },
}

/// One `for v in source [if filter]` arm of a list comprehension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensionArm {
    pub var: String,
    pub source: ExprNode,
    #[serde(default)]
    pub filter: Option<ExprNode>,
}

impl ExprNode {
    /// The location of this expression, for diagnostics.
    pub fn loc(&self) -> Loc {
        match self {
            ExprNode::Int { loc, .. }
            | ExprNode::Float { loc, .. }
            | ExprNode::Bool { loc, .. }
            | ExprNode::Char { loc, .. }
            | ExprNode::Str { loc, .. }
            | ExprNode::Array { loc, .. }
            | ExprNode::Tuple { loc, .. }
            | ExprNode::Range { loc, .. }
            | ExprNode::Var { loc, .. }
            | ExprNode::SelfExpr { loc }
            | ExprNode::Parent { loc, .. }
            | ExprNode::Member { loc, .. }
            | ExprNode::Call { loc, .. }
            | ExprNode::Binary { loc, .. }
            | ExprNode::Unary { loc, .. }
            | ExprNode::IfExpr { loc, .. }
            | ExprNode::As { loc, .. }
            | ExprNode::Is { loc, .. }
            | ExprNode::Lambda { loc, .. }
            | ExprNode::Comprehension { loc, .. } => *loc,
        }
    }
}
