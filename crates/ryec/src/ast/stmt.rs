//! Statement nodes.

use super::{BlockId, DeclId, ExprId, Position, StmtId};

#[derive(Debug)]
pub struct Statement {
    pub position: Position,
    pub kind: StmtKind,
}

impl Statement {
    pub fn new(position: Position, kind: StmtKind) -> Self {
        Statement { position, kind }
    }
}

#[derive(Debug)]
pub enum StmtKind {
    Assignment {
        left: ExprId,
        right: ExprId,
    },
    /// `(a, b) := e` with a synthesized tuple temporary: the right-hand
    /// side is stored into `tmp`, then each target is assigned from one
    /// tuple field. The sub-assignments execute in order.
    Unpack {
        tmp: DeclId,
        tmp_assign: StmtId,
        field_assigns: Vec<StmtId>,
    },
    Conditional {
        condition: ExprId,
        then_block: BlockId,
        else_block: BlockId,
    },
    While {
        condition: ExprId,
        body: BlockId,
    },
    /// Jump to the enclosing loop's end. The loop link is resolved by
    /// the resolver.
    Break {
        loop_stmt: Option<StmtId>,
    },
    /// Jump to the enclosing loop's condition.
    Skip {
        loop_stmt: Option<StmtId>,
    },
    Return {
        value: Option<ExprId>,
    },
    /// A return that also records a resume label: `yield e` lowered to
    /// `return Just<T>(e)` carrying its zero-based ordinal.
    Yield {
        value: ExprId,
        index: u32,
    },
    Raise {
        value: Option<ExprId>,
    },
    Try {
        error: DeclId,
        try_block: BlockId,
        handle_block: BlockId,
    },
    /// A function call used as a statement.
    Call {
        call: ExprId,
    },
}
