//! Temporary-identifier minting and tuple-type synthesis.
//!
//! Both factories are shared across every module of one compilation so
//! synthesized names never collide; separate compilations get separate
//! factories and cannot cross-talk.

use std::collections::HashSet;

use crate::ast::{
    Block, BlockId, ClassDecl, Declaration, ExprKind, Expression, FunctionDecl,
    FunctionKind, Identifier, Position, Program, Statement, StmtKind, VariableDecl, VariableKind,
};

/// Mints unique synthesized identifiers (`$tmp0`, `$GenIterator1`, ...).
#[derive(Debug, Default)]
pub struct TmpIdents {
    counter: u32,
}

impl TmpIdents {
    pub fn new() -> Self {
        TmpIdents::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> Identifier {
        let n = self.counter;
        self.counter += 1;
        Identifier::new(format!("{}{}", prefix, n))
    }
}

/// Synthesizes `TupleN<T1..TN>` classes on first use. Each tuple class
/// has attributes `_1`..`_N` and an initializer storing them.
#[derive(Debug, Default)]
pub struct TupleRegistry {
    made: HashSet<usize>,
}

impl TupleRegistry {
    pub fn new() -> Self {
        TupleRegistry::default()
    }

    pub fn class_name(arity: usize) -> String {
        format!("Tuple{}", arity)
    }

    /// Walks a type identifier and synthesizes any tuple classes it
    /// mentions.
    pub fn check_type(&mut self, program: &mut Program, target: BlockId, ident: &Identifier) {
        if let Some(rest) = ident.name.strip_prefix("Tuple") {
            if let Ok(n) = rest.parse::<usize>() {
                self.ensure(program, target, n);
            }
        }
        for arg in &ident.args {
            self.check_type(program, target, arg);
        }
    }

    /// Makes sure the `TupleN` class exists, synthesizing it into
    /// `target` (a module top-level block) if needed.
    pub fn ensure(&mut self, program: &mut Program, target: BlockId, arity: usize) {
        if !self.made.insert(arity) {
            return;
        }

        let pos = Position::none();
        let type_params: Vec<Identifier> = (0..arity)
            .map(|i| Identifier::new(format!("T{}", i + 1)))
            .collect();

        let class_block = program.add_block(Block::new(pos.clone()));
        let mut class = ClassDecl::new(
            pos.clone(),
            Identifier::new(Self::class_name(arity)),
            class_block,
        );
        class.type_params = type_params.clone();
        let class_id = program.add_decl(Declaration::Class(class));

        // Attributes _1 .. _N, typed by the formal parameters.
        for (i, tp) in type_params.iter().enumerate() {
            let attr = VariableDecl::new(
                pos.clone(),
                Identifier::new(format!("_{}", i + 1)),
                tp.clone(),
                VariableKind::Attribute,
            );
            let attr_id = program.add_decl(Declaration::Variable(attr));
            program.block_mut(class_block).declarations.push(attr_id);
        }

        // initializer(v1: T1, ..): self._i := vi
        let mut params = Vec::with_capacity(arity);
        for (i, tp) in type_params.iter().enumerate() {
            let p = VariableDecl::new(
                pos.clone(),
                Identifier::new(format!("v{}", i + 1)),
                tp.clone(),
                VariableKind::Parameter,
            );
            params.push(program.add_decl(Declaration::Variable(p)));
        }
        let init_body = program.add_block(Block::new(pos.clone()));
        for i in 0..arity {
            let slf = program.add_expr(Expression::new(pos.clone(), ExprKind::SelfExpr));
            let attr_access = program.add_expr(Expression::new(
                pos.clone(),
                ExprKind::Variable {
                    name: Identifier::new(format!("_{}", i + 1)),
                    decl: None,
                },
            ));
            let member = program.add_expr(Expression::new(
                pos.clone(),
                ExprKind::Member {
                    left: slf,
                    right: attr_access,
                },
            ));
            let value = program.add_expr(Expression::new(
                pos.clone(),
                ExprKind::Variable {
                    name: Identifier::new(format!("v{}", i + 1)),
                    decl: None,
                },
            ));
            let assign = program.add_stmt(Statement::new(
                pos.clone(),
                StmtKind::Assignment {
                    left: member,
                    right: value,
                },
            ));
            program.block_mut(init_body).statements.push(assign);
        }
        let ret = program.add_stmt(Statement::new(pos.clone(), StmtKind::Return { value: None }));
        program.block_mut(init_body).statements.push(ret);

        let init = FunctionDecl::new(
            pos.clone(),
            Identifier::new("initializer"),
            params,
            init_body,
            FunctionKind::Initializer,
            None,
        );
        let init_id = program.add_decl(Declaration::Function(init));
        program.block_mut(class_block).declarations.push(init_id);

        program.block_mut(target).declarations.push(class_id);
    }
}
