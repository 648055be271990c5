//! Canonical AST for the Rye compiler.
//!
//! The builder lowers the parse tree into this representation; the
//! resolver annotates it in place; code generation reads it. All nodes
//! live in typed arenas inside [`Program`] and refer to each other by
//! index — children are owned by the arena, and traversal context (the
//! enclosing class or function) is threaded through the walk instead of
//! parent pointers.

pub mod core;
pub mod decl;
pub mod expr;
pub mod stmt;

use std::fmt;

pub use self::core::CoreClasses;
pub use self::decl::{
    AccessModifier, ClassDecl, Declaration, FunctionDecl, FunctionKind, ModuleDecl, VariableDecl,
    VariableKind,
};
pub use self::expr::{ExprKind, Expression};
pub use self::stmt::{Statement, StmtKind};

/// A source position: file, line, column. Synthesized nodes carry an
/// empty position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Position {
            file: file.into(),
            line,
            column,
        }
    }

    /// The empty position used by synthesized nodes.
    pub fn none() -> Self {
        Position {
            file: String::new(),
            line: 0,
            column: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A symbolic name together with its generic-argument identifiers.
/// Two identifiers match iff name and argument lists match structurally.
/// Before resolution every identifier is *resolvable*: the resolver binds
/// it to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub args: Vec<Identifier>,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<Identifier>) -> Self {
        Identifier {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, a) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", a)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(DeclId);
arena_id!(BlockId);
arena_id!(StmtId);
arena_id!(ExprId);

/// A resolved type: a class applied to its generic arguments (empty for
/// non-generic classes), or a formal generic parameter of the class
/// `owner`. A class type whose arguments are all concrete corresponds to
/// a registered variation of the class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Class { decl: DeclId, args: Vec<Ty> },
    Generic { owner: DeclId, index: u32 },
}

impl Ty {
    pub fn class(decl: DeclId) -> Ty {
        Ty::Class {
            decl,
            args: Vec::new(),
        }
    }

    /// The class declaration behind this type, if it is one.
    pub fn decl(&self) -> Option<DeclId> {
        match self {
            Ty::Class { decl, .. } => Some(*decl),
            Ty::Generic { .. } => None,
        }
    }

    pub fn args(&self) -> &[Ty] {
        match self {
            Ty::Class { args, .. } => args,
            Ty::Generic { .. } => &[],
        }
    }
}

/// An ordered list of declarations followed by an ordered list of
/// statements. Blocks establish lexical scopes.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub position: Position,
    pub declarations: Vec<DeclId>,
    pub statements: Vec<StmtId>,
}

impl Block {
    pub fn new(position: Position) -> Self {
        Block {
            position,
            declarations: Vec::new(),
            statements: Vec::new(),
        }
    }
}

/// The whole-program arena. Built once per compilation; annotated by the
/// resolver (variations are appended during typing); read-only during
/// emission.
#[derive(Debug, Default)]
pub struct Program {
    pub decls: Vec<Declaration>,
    pub blocks: Vec<Block>,
    pub stmts: Vec<Statement>,
    pub exprs: Vec<Expression>,
    /// Module declarations in compilation order.
    pub modules: Vec<DeclId>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_decl(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn add_stmt(&mut self, stmt: Statement) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn add_expr(&mut self, expr: Expression) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Statement {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Statement {
        &mut self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expression {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expression {
        &mut self.exprs[id.index()]
    }

    // The typed accessors below assert the declaration kind. A mismatch
    // is an internal invariant violation, never a user error.

    pub fn class(&self, id: DeclId) -> &ClassDecl {
        match self.decl(id) {
            Declaration::Class(c) => c,
            other => panic!("declaration {:?} is not a class: {:?}", id, other.identifier()),
        }
    }

    pub fn class_mut(&mut self, id: DeclId) -> &mut ClassDecl {
        match self.decl_mut(id) {
            Declaration::Class(c) => c,
            other => panic!("declaration {:?} is not a class: {:?}", id, other.identifier()),
        }
    }

    pub fn function(&self, id: DeclId) -> &FunctionDecl {
        match self.decl(id) {
            Declaration::Function(f) => f,
            other => panic!("declaration {:?} is not a function: {:?}", id, other.identifier()),
        }
    }

    pub fn function_mut(&mut self, id: DeclId) -> &mut FunctionDecl {
        match self.decl_mut(id) {
            Declaration::Function(f) => f,
            other => panic!("declaration {:?} is not a function: {:?}", id, other.identifier()),
        }
    }

    pub fn variable(&self, id: DeclId) -> &VariableDecl {
        match self.decl(id) {
            Declaration::Variable(v) => v,
            other => panic!("declaration {:?} is not a variable: {:?}", id, other.identifier()),
        }
    }

    pub fn variable_mut(&mut self, id: DeclId) -> &mut VariableDecl {
        match self.decl_mut(id) {
            Declaration::Variable(v) => v,
            other => panic!("declaration {:?} is not a variable: {:?}", id, other.identifier()),
        }
    }

    pub fn module(&self, id: DeclId) -> &ModuleDecl {
        match self.decl(id) {
            Declaration::Module(m) => m,
            other => panic!("declaration {:?} is not a module: {:?}", id, other.identifier()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_matching_is_structural() {
        let a = Identifier::generic("Box", vec![Identifier::new("Int")]);
        let b = Identifier::generic("Box", vec![Identifier::new("Int")]);
        let c = Identifier::generic("Box", vec![Identifier::new("String")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "Box<Int>");
    }
}
