//! AST builder: the desugaring front end.
//!
//! Walks the parse tree and produces the canonical AST, rewriting every
//! surface construct into the primitive subset: compound assignments
//! become operator-method calls, `for`-in loops become iterator while
//! loops, list comprehensions and generator declarations become
//! synthesized classes, lambdas become function-wrapper objects, and
//! default arguments become forwarding overloads.
//!
//! The builder keeps four context stacks: the current block (receiver of
//! synthesized declarations), the current generator return type, and the
//! current variable/function declaration contexts. All state lives on
//! the builder value; separate builders cannot cross-talk.

mod functions;
mod generators;
mod tuples;

pub use self::tuples::{TmpIdents, TupleRegistry};

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rye_ast as pt;

use crate::ast::{
    Block, BlockId, DeclId, Declaration, ExprId, ExprKind, Expression, FunctionKind, Identifier,
    ModuleDecl, Position, Program, Statement, StmtId, StmtKind, VariableDecl, VariableKind,
};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

/// Canonical operator-method names for binary operators.
pub static BINARY_OPERATOR_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("+", "_add_");
    m.insert("-", "_sub_");
    m.insert("*", "_mul_");
    m.insert("/", "_div_");
    m.insert("%", "_mod_");
    m.insert("^", "_pow_");
    m.insert("=", "_eq_");
    m.insert("!=", "_neq_");
    m.insert("<", "_lt_");
    m.insert(">", "_gt_");
    m.insert("<=", "_leq_");
    m.insert(">=", "_geq_");
    m.insert("in", "_contains_");
    m.insert("and", "_and_");
    m.insert("or", "_or_");
    m.insert("xor", "_xor_");
    m
});

/// Canonical operator-method names for unary operators.
pub static UNARY_OPERATOR_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("-", "_neg_");
    m.insert("not", "_not_");
    m
});

pub struct AstBuilder<'a> {
    pub(crate) program: &'a mut Program,
    file_name: String,
    pub(crate) current_blocks: Vec<BlockId>,
    /// Top entry is `Some(elem)` iff we are inside a generator body.
    pub(crate) generator_types: Vec<Option<Identifier>>,
    /// Yield statements of the innermost generator, in source order.
    pub(crate) yield_collectors: Vec<Vec<StmtId>>,
    pub(crate) variable_context: VariableKind,
    pub(crate) function_context: FunctionKind,
    pub(crate) tmp: &'a mut TmpIdents,
    pub(crate) tuples: &'a mut TupleRegistry,
    /// The module's top-level block; receives synthesized tuple classes.
    pub(crate) module_block: BlockId,
}

impl<'a> AstBuilder<'a> {
    pub fn new(
        program: &'a mut Program,
        file_name: impl Into<String>,
        tmp: &'a mut TmpIdents,
        tuples: &'a mut TupleRegistry,
    ) -> Self {
        AstBuilder {
            program,
            file_name: file_name.into(),
            current_blocks: Vec::new(),
            generator_types: vec![None],
            yield_collectors: Vec::new(),
            variable_context: VariableKind::Variable,
            function_context: FunctionKind::Unbound,
            tmp,
            tuples,
            module_block: BlockId(0),
        }
    }

    pub(crate) fn pos(&self, loc: pt::Loc) -> Position {
        if loc.line == 0 {
            Position::none()
        } else {
            Position::new(self.file_name.clone(), loc.line, loc.column)
        }
    }

    pub(crate) fn cur_block(&self) -> BlockId {
        *self
            .current_blocks
            .last()
            .expect("builder has no current block")
    }

    pub(crate) fn mk_expr(&mut self, position: Position, kind: ExprKind) -> ExprId {
        self.program.add_expr(Expression::new(position, kind))
    }

    pub(crate) fn mk_stmt(&mut self, position: Position, kind: StmtKind) -> StmtId {
        self.program.add_stmt(Statement::new(position, kind))
    }

    pub(crate) fn var_access(&mut self, position: Position, name: Identifier) -> ExprId {
        self.mk_expr(position, ExprKind::Variable { name, decl: None })
    }

    pub(crate) fn call(&mut self, position: Position, name: Identifier, args: Vec<ExprId>) -> ExprId {
        self.mk_expr(position, ExprKind::Call { name, args, decl: None })
    }

    pub(crate) fn member(&mut self, position: Position, left: ExprId, right: ExprId) -> ExprId {
        self.mk_expr(position, ExprKind::Member { left, right })
    }

    /// Builds one source module and registers it on the program.
    pub fn build_module(&mut self, node: &pt::Module) -> DiagnosticResult<DeclId> {
        let pos = Position::none();
        let block = self.program.add_block(Block::new(pos.clone()));
        self.module_block = block;
        self.current_blocks.push(block);

        for item in &node.items {
            self.variable_context = VariableKind::Variable;
            self.function_context = FunctionKind::Unbound;
            if let Some(stmt) = self.build_item(item)? {
                self.program.block_mut(block).statements.push(stmt);
            }
        }

        self.current_blocks.pop();

        let module = ModuleDecl {
            position: pos,
            identifier: Identifier::new(node.name.clone()),
            access: crate::ast::AccessModifier::Public,
            imports: node.imports.iter().map(|i| Identifier::new(i.clone())).collect(),
            block,
            native: node.native,
        };
        let id = self.program.add_decl(Declaration::Module(module));
        self.program.modules.push(id);
        Ok(id)
    }

    /// Builds one item. Declarations are appended to the current block;
    /// the returned statement (if any) is appended by the caller so that
    /// synthesized statements keep their relative order.
    pub(crate) fn build_item(&mut self, item: &pt::Item) -> DiagnosticResult<Option<StmtId>> {
        match item {
            pt::Item::Class(c) => {
                let decl = self.build_class(c)?;
                let block = self.cur_block();
                self.program.block_mut(block).declarations.push(decl);
                Ok(None)
            }
            pt::Item::Function(f) => {
                let decl = self.build_function(f)?;
                let block = self.cur_block();
                self.program.block_mut(block).declarations.push(decl);
                Ok(None)
            }
            pt::Item::Generator(g) => {
                let decl = self.build_generator(g)?;
                let block = self.cur_block();
                self.program.block_mut(block).declarations.push(decl);
                Ok(None)
            }
            pt::Item::Variable(v) => self.build_variable_item(v),
            pt::Item::Statement(s) => self.build_statement(s),
        }
    }

    /// An independent variable declaration; an initializer becomes a
    /// separate assignment statement.
    fn build_variable_item(&mut self, node: &pt::VariableNode) -> DiagnosticResult<Option<StmtId>> {
        let pos = self.pos(node.loc);
        let ty = self.convert_type(&node.ty);
        let decl = VariableDecl::new(
            pos.clone(),
            Identifier::new(node.name.clone()),
            ty,
            self.variable_context,
        );
        let decl_id = self.program.add_decl(Declaration::Variable(decl));
        let block = self.cur_block();
        self.program.block_mut(block).declarations.push(decl_id);

        match &node.init {
            Some(init) => {
                let value = self.build_expr(init)?;
                let access = self.var_access(pos.clone(), Identifier::new(node.name.clone()));
                Ok(Some(self.mk_stmt(
                    pos,
                    StmtKind::Assignment {
                        left: access,
                        right: value,
                    },
                )))
            }
            None => Ok(None),
        }
    }

    /// Converts a type annotation into a resolvable identifier, lowering
    /// the tuple and arrow sugar onto the `TupleN`/`Function` families.
    pub(crate) fn convert_type(&mut self, node: &pt::TypeNode) -> Identifier {
        let ident = match node {
            pt::TypeNode::Named { name, args, .. } => Identifier::generic(
                name.clone(),
                args.iter().map(|a| self.convert_type(a)).collect(),
            ),
            pt::TypeNode::Tuple { elems, .. } => Identifier::generic(
                TupleRegistry::class_name(elems.len()),
                elems.iter().map(|a| self.convert_type(a)).collect(),
            ),
            pt::TypeNode::Function { params, ret, .. } => {
                let mut args: Vec<Identifier> =
                    params.iter().map(|a| self.convert_type(a)).collect();
                args.push(self.convert_type(ret));
                Identifier::generic("Function", args)
            }
        };
        let target = self.module_block;
        self.tuples.check_type(self.program, target, &ident);
        ident
    }

    /// Builds a block out of a statement list, making it the current
    /// block for the duration.
    pub(crate) fn build_block(
        &mut self,
        position: Position,
        stmts: &[pt::StmtNode],
    ) -> DiagnosticResult<BlockId> {
        let block = self.program.add_block(Block::new(position));
        self.current_blocks.push(block);
        let result = self.add_statements(block, stmts);
        self.current_blocks.pop();
        result?;
        Ok(block)
    }

    fn add_statements(&mut self, block: BlockId, stmts: &[pt::StmtNode]) -> DiagnosticResult<()> {
        for stmt in stmts {
            self.variable_context = VariableKind::Variable;
            self.function_context = FunctionKind::Unbound;
            if let Some(id) = self.build_statement(stmt)? {
                self.program.block_mut(block).statements.push(id);
            }
        }
        Ok(())
    }

    pub(crate) fn build_statement(&mut self, node: &pt::StmtNode) -> DiagnosticResult<Option<StmtId>> {
        match node {
            pt::StmtNode::Assign { loc, target, value } => {
                let pos = self.pos(*loc);
                let left = self.build_expr(target)?;
                let right = self.build_expr(value)?;
                Ok(Some(self.mk_stmt(pos, StmtKind::Assignment { left, right })))
            }
            pt::StmtNode::CompoundAssign {
                loc,
                target,
                op,
                value,
            } => {
                let pos = self.pos(*loc);
                // `a ⊕= b` lowers to `a := a ⊕ b`.
                let combined = self.build_binary(pos.clone(), op, target, value)?;
                let left = self.build_expr(target)?;
                Ok(Some(self.mk_stmt(
                    pos,
                    StmtKind::Assignment {
                        left,
                        right: combined,
                    },
                )))
            }
            pt::StmtNode::Unpack {
                loc,
                targets,
                value,
            } => self.build_unpack(self.pos(*loc), targets, value).map(Some),
            pt::StmtNode::If {
                loc,
                cond,
                then_body,
                elifs,
                else_body,
            } => {
                let pos = self.pos(*loc);
                let condition = self.build_expr(cond)?;
                let then_block = self.build_block(pos.clone(), then_body)?;

                // elif arms nest as conditionals inside fresh else blocks,
                // innermost last.
                let mut else_block = self.build_block(pos.clone(), else_body)?;
                for elif in elifs.iter().rev() {
                    let arm_cond = self.build_expr(&elif.cond)?;
                    let arm_block = self.build_block(pos.clone(), &elif.body)?;
                    let wrapper = self.program.add_block(Block::new(pos.clone()));
                    let arm = self.mk_stmt(
                        pos.clone(),
                        StmtKind::Conditional {
                            condition: arm_cond,
                            then_block: arm_block,
                            else_block,
                        },
                    );
                    self.program.block_mut(wrapper).statements.push(arm);
                    else_block = wrapper;
                }

                Ok(Some(self.mk_stmt(
                    pos,
                    StmtKind::Conditional {
                        condition,
                        then_block,
                        else_block,
                    },
                )))
            }
            pt::StmtNode::While { loc, cond, body } => {
                let pos = self.pos(*loc);
                let condition = self.build_expr(cond)?;
                let body = self.build_block(pos.clone(), body)?;
                Ok(Some(self.mk_stmt(pos, StmtKind::While { condition, body })))
            }
            pt::StmtNode::For {
                loc,
                var,
                iterable,
                body,
            } => {
                let pos = self.pos(*loc);
                let iterable = self.build_expr(iterable)?;
                let get_iterator = {
                    let c = self.call(pos.clone(), Identifier::new("getIterator"), Vec::new());
                    self.member(pos.clone(), iterable, c)
                };
                let body = self.build_block(pos.clone(), body)?;
                Ok(Some(self.create_for_loop(
                    pos,
                    Identifier::new(var.clone()),
                    get_iterator,
                    body,
                )?))
            }
            pt::StmtNode::Break { loc } => {
                let pos = self.pos(*loc);
                Ok(Some(self.mk_stmt(pos, StmtKind::Break { loop_stmt: None })))
            }
            pt::StmtNode::Skip { loc } => {
                let pos = self.pos(*loc);
                Ok(Some(self.mk_stmt(pos, StmtKind::Skip { loop_stmt: None })))
            }
            pt::StmtNode::Return { loc, value } => {
                let pos = self.pos(*loc);
                // Inside a generator, `return` yields the end of the
                // sequence: `return Nothing<T>()`.
                if let Some(elem) = self.generator_types.last().cloned().flatten() {
                    let nothing = self.call(
                        pos.clone(),
                        Identifier::generic("Nothing", vec![elem]),
                        Vec::new(),
                    );
                    return Ok(Some(self.mk_stmt(
                        pos,
                        StmtKind::Return {
                            value: Some(nothing),
                        },
                    )));
                }
                let value = match value {
                    Some(v) => Some(self.build_expr(v)?),
                    None => None,
                };
                Ok(Some(self.mk_stmt(pos, StmtKind::Return { value })))
            }
            pt::StmtNode::Yield { loc, value } => {
                let pos = self.pos(*loc);
                if self.generator_types.last().cloned().flatten().is_none() {
                    return Err(Diagnostic::error_at(&pos, "yield outside of a generator"));
                }
                let value = self.build_expr(value)?;
                Ok(Some(self.create_yield(pos, value)))
            }
            pt::StmtNode::Raise { loc, value } => {
                let pos = self.pos(*loc);
                let value = match value {
                    Some(v) => Some(self.build_expr(v)?),
                    None => None,
                };
                Ok(Some(self.mk_stmt(pos, StmtKind::Raise { value })))
            }
            pt::StmtNode::Try {
                loc,
                error,
                try_body,
                handle_body,
            } => {
                let pos = self.pos(*loc);
                let err_ty = self.convert_type(&error.ty);
                let err_decl = VariableDecl::new(
                    self.pos(error.loc),
                    Identifier::new(error.name.clone()),
                    err_ty,
                    VariableKind::Variable,
                );
                let error = self.program.add_decl(Declaration::Variable(err_decl));
                let try_block = self.build_block(pos.clone(), try_body)?;
                let handle_block = self.build_block(pos.clone(), handle_body)?;
                Ok(Some(self.mk_stmt(
                    pos,
                    StmtKind::Try {
                        error,
                        try_block,
                        handle_block,
                    },
                )))
            }
            pt::StmtNode::Call { loc, call } => {
                let pos = self.pos(*loc);
                let expr = self.build_expr(call)?;
                if !self.is_call_like(expr) {
                    return Err(Diagnostic::error_at(
                        &pos,
                        "only calls may be used as statements",
                    ));
                }
                Ok(Some(self.mk_stmt(pos, StmtKind::Call { call: expr })))
            }
            pt::StmtNode::Item(item) => self.build_item(item),
        }
    }

    fn is_call_like(&self, expr: ExprId) -> bool {
        match &self.program.expr(expr).kind {
            ExprKind::Call { .. } => true,
            ExprKind::Member { right, .. } => self.is_call_like(*right),
            _ => false,
        }
    }

    /// `(a, b) := e`: store `e` into a synthesized tuple temporary, then
    /// assign each target from the matching tuple field.
    fn build_unpack(
        &mut self,
        pos: Position,
        targets: &[pt::UnpackTarget],
        value: &pt::ExprNode,
    ) -> DiagnosticResult<StmtId> {
        let arity = targets.len();
        let module_block = self.module_block;
        self.tuples.ensure(self.program, module_block, arity);

        let right = self.build_expr(value)?;
        let tmp_ident = self.tmp.fresh("$unpack");
        let tmp_decl = VariableDecl::inferred(
            pos.clone(),
            tmp_ident.clone(),
            VariableKind::Variable,
            right,
        );
        let tmp = self.program.add_decl(Declaration::Variable(tmp_decl));
        let block = self.cur_block();
        self.program.block_mut(block).declarations.push(tmp);

        let tmp_access = self.var_access(pos.clone(), tmp_ident.clone());
        let tmp_assign = self.mk_stmt(
            pos.clone(),
            StmtKind::Assignment {
                left: tmp_access,
                right,
            },
        );

        let mut field_assigns = Vec::with_capacity(arity);
        for (i, target) in targets.iter().enumerate() {
            let target_expr = match target {
                pt::UnpackTarget::Declare(v) => {
                    let ty = self.convert_type(&v.ty);
                    let decl = VariableDecl::new(
                        self.pos(v.loc),
                        Identifier::new(v.name.clone()),
                        ty,
                        self.variable_context,
                    );
                    let decl_id = self.program.add_decl(Declaration::Variable(decl));
                    self.program.block_mut(block).declarations.push(decl_id);
                    self.var_access(self.pos(v.loc), Identifier::new(v.name.clone()))
                }
                pt::UnpackTarget::Target(e) => self.build_expr(e)?,
            };
            let tuple_var = self.var_access(pos.clone(), tmp_ident.clone());
            let field = self.var_access(pos.clone(), Identifier::new(format!("_{}", i + 1)));
            let field_access = self.member(pos.clone(), tuple_var, field);
            field_assigns.push(self.mk_stmt(
                pos.clone(),
                StmtKind::Assignment {
                    left: target_expr,
                    right: field_access,
                },
            ));
        }

        Ok(self.mk_stmt(
            pos,
            StmtKind::Unpack {
                tmp,
                tmp_assign,
                field_assigns,
            },
        ))
    }

    /// The for-in rewrite:
    ///
    /// ```text
    /// $it := E.getIterator()
    /// while true:
    ///     $maybe := $it.getNext()
    ///     if $maybe.hasValue():
    ///         v := ($maybe as Just<T>).getValue()
    ///         <body>
    ///     else:
    ///         break
    /// ```
    pub(crate) fn create_for_loop(
        &mut self,
        pos: Position,
        index_var: Identifier,
        iterable_expr: ExprId,
        body: BlockId,
    ) -> DiagnosticResult<StmtId> {
        let block = self.cur_block();

        // $it := E.getIterator()
        let it_ident = self.tmp.fresh("$it");
        let it_decl = VariableDecl::inferred(
            pos.clone(),
            it_ident.clone(),
            VariableKind::Variable,
            iterable_expr,
        );
        let it_id = self.program.add_decl(Declaration::Variable(it_decl));
        self.program.block_mut(block).declarations.push(it_id);
        let it_access = self.var_access(pos.clone(), it_ident.clone());
        let it_assign = self.mk_stmt(
            pos.clone(),
            StmtKind::Assignment {
                left: it_access,
                right: iterable_expr,
            },
        );
        self.program.block_mut(block).statements.push(it_assign);

        // $maybe := $it.getNext()
        let while_block = self.program.add_block(Block::new(pos.clone()));
        let maybe_ident = self.tmp.fresh("$maybe");
        let get_next = {
            let it = self.var_access(pos.clone(), it_ident);
            let c = self.call(pos.clone(), Identifier::new("getNext"), Vec::new());
            self.member(pos.clone(), it, c)
        };
        let maybe_decl = VariableDecl::inferred(
            pos.clone(),
            maybe_ident.clone(),
            VariableKind::Variable,
            get_next,
        );
        let maybe_id = self.program.add_decl(Declaration::Variable(maybe_decl));
        self.program.block_mut(while_block).declarations.push(maybe_id);
        let maybe_access = self.var_access(pos.clone(), maybe_ident.clone());
        let maybe_assign = self.mk_stmt(
            pos.clone(),
            StmtKind::Assignment {
                left: maybe_access,
                right: get_next,
            },
        );
        self.program.block_mut(while_block).statements.push(maybe_assign);

        // if $maybe.hasValue(): v := ($maybe as Just<T>).getValue(); body
        let has_value = {
            let m = self.var_access(pos.clone(), maybe_ident.clone());
            let c = self.call(pos.clone(), Identifier::new("hasValue"), Vec::new());
            self.member(pos.clone(), m, c)
        };
        let get_value = {
            let m = self.var_access(pos.clone(), maybe_ident.clone());
            let cast = self.mk_expr(
                pos.clone(),
                ExprKind::Cast {
                    value: m,
                    type_ident: Identifier::generic("Just", vec![Identifier::new("$infer")]),
                    target: None,
                },
            );
            let c = self.call(pos.clone(), Identifier::new("getValue"), Vec::new());
            self.member(pos.clone(), cast, c)
        };
        let v_decl = VariableDecl::inferred(
            pos.clone(),
            index_var.clone(),
            VariableKind::Variable,
            get_value,
        );
        let v_id = self.program.add_decl(Declaration::Variable(v_decl));
        self.program.block_mut(body).declarations.push(v_id);
        let v_access = self.var_access(pos.clone(), index_var);
        let v_assign = self.mk_stmt(
            pos.clone(),
            StmtKind::Assignment {
                left: v_access,
                right: get_value,
            },
        );
        self.program.block_mut(body).statements.insert(0, v_assign);

        let else_block = self.program.add_block(Block::new(pos.clone()));
        let brk = self.mk_stmt(pos.clone(), StmtKind::Break { loop_stmt: None });
        self.program.block_mut(else_block).statements.push(brk);

        let ifstmt = self.mk_stmt(
            pos.clone(),
            StmtKind::Conditional {
                condition: has_value,
                then_block: body,
                else_block,
            },
        );
        self.program.block_mut(while_block).statements.push(ifstmt);

        let truth = self.mk_expr(pos.clone(), ExprKind::BoolLiteral(true));
        Ok(self.mk_stmt(
            pos,
            StmtKind::While {
                condition: truth,
                body: while_block,
            },
        ))
    }

    /// `yield e` lowers to `return Just<T>(e)` carrying its ordinal.
    pub(crate) fn create_yield(&mut self, pos: Position, value: ExprId) -> StmtId {
        let elem = self
            .generator_types
            .last()
            .cloned()
            .flatten()
            .expect("yield created outside generator context");
        let just = self.call(
            pos.clone(),
            Identifier::generic("Just", vec![elem]),
            vec![value],
        );
        let collector = self
            .yield_collectors
            .last_mut()
            .expect("yield collector missing");
        let index = collector.len() as u32;
        let stmt = self
            .program
            .add_stmt(Statement::new(pos, StmtKind::Yield { value: just, index }));
        self.yield_collectors
            .last_mut()
            .expect("yield collector missing")
            .push(stmt);
        stmt
    }

    pub(crate) fn build_expr(&mut self, node: &pt::ExprNode) -> DiagnosticResult<ExprId> {
        match node {
            pt::ExprNode::Int { loc, value } => {
                Ok(self.mk_expr(self.pos(*loc), ExprKind::IntLiteral(*value)))
            }
            pt::ExprNode::Float { loc, value } => {
                Ok(self.mk_expr(self.pos(*loc), ExprKind::FloatLiteral(*value)))
            }
            pt::ExprNode::Bool { loc, value } => {
                Ok(self.mk_expr(self.pos(*loc), ExprKind::BoolLiteral(*value)))
            }
            pt::ExprNode::Char { loc, value } => {
                Ok(self.mk_expr(self.pos(*loc), ExprKind::CharLiteral(*value)))
            }
            pt::ExprNode::Str { loc, value } => Ok(self.mk_expr(
                self.pos(*loc),
                ExprKind::StringLiteral(value.clone()),
            )),
            pt::ExprNode::Array { loc, elems } => {
                let pos = self.pos(*loc);
                let mut built = Vec::with_capacity(elems.len());
                for e in elems {
                    built.push(self.build_expr(e)?);
                }
                Ok(self.mk_expr(pos, ExprKind::ArrayLiteral(built)))
            }
            pt::ExprNode::Tuple { loc, elems } => {
                let pos = self.pos(*loc);
                let module_block = self.module_block;
                self.tuples.ensure(self.program, module_block, elems.len());
                let mut built = Vec::with_capacity(elems.len());
                for e in elems {
                    built.push(self.build_expr(e)?);
                }
                let name = Identifier::new(TupleRegistry::class_name(elems.len()));
                Ok(self.call(pos, name, built))
            }
            pt::ExprNode::Range { loc, lo, hi } => {
                let pos = self.pos(*loc);
                let lo = self.build_expr(lo)?;
                let hi = self.build_expr(hi)?;
                Ok(self.call(pos, Identifier::new("Range"), vec![lo, hi]))
            }
            pt::ExprNode::Var { loc, name } => {
                let pos = self.pos(*loc);
                Ok(self.var_access(pos, Identifier::new(name.clone())))
            }
            pt::ExprNode::SelfExpr { loc } => Ok(self.mk_expr(self.pos(*loc), ExprKind::SelfExpr)),
            pt::ExprNode::Parent { loc, ty } => {
                let pos = self.pos(*loc);
                let type_ident = self.convert_type(ty);
                Ok(self.mk_expr(
                    pos,
                    ExprKind::Parent {
                        type_ident,
                        target: None,
                    },
                ))
            }
            pt::ExprNode::Member {
                loc,
                target,
                member,
            } => {
                let pos = self.pos(*loc);
                let left = self.build_expr(target)?;
                let right = self.build_expr(member)?;
                Ok(self.member(pos, left, right))
            }
            pt::ExprNode::Call {
                loc,
                name,
                type_args,
                args,
            } => {
                let pos = self.pos(*loc);
                let ident = Identifier::generic(
                    name.clone(),
                    type_args.iter().map(|t| self.convert_type(t)).collect(),
                );
                let target = self.module_block;
                self.tuples.check_type(self.program, target, &ident);
                let mut built = Vec::with_capacity(args.len());
                for a in args {
                    built.push(self.build_expr(a)?);
                }
                Ok(self.call(pos, ident, built))
            }
            pt::ExprNode::Binary {
                loc,
                op,
                left,
                right,
            } => self.build_binary(self.pos(*loc), op, left, right),
            pt::ExprNode::Unary { loc, op, operand } => {
                let pos = self.pos(*loc);
                let method = UNARY_OPERATOR_MAPPING.get(op.as_str()).ok_or_else(|| {
                    Diagnostic::error_at(&pos, format!("unknown unary operator `{}`", op))
                })?;
                let operand = self.build_expr(operand)?;
                let call = self.call(pos.clone(), Identifier::new(*method), Vec::new());
                Ok(self.member(pos, operand, call))
            }
            pt::ExprNode::IfExpr {
                loc,
                cond,
                then_expr,
                else_expr,
            } => {
                let pos = self.pos(*loc);
                let condition = self.build_expr(cond)?;
                let then_expr = self.build_expr(then_expr)?;
                let else_expr = self.build_expr(else_expr)?;
                Ok(self.mk_expr(
                    pos,
                    ExprKind::Conditional {
                        condition,
                        then_expr,
                        else_expr,
                    },
                ))
            }
            pt::ExprNode::As { loc, value, ty } => {
                let pos = self.pos(*loc);
                let value = self.build_expr(value)?;
                let type_ident = self.convert_type(ty);
                Ok(self.mk_expr(
                    pos,
                    ExprKind::Cast {
                        value,
                        type_ident,
                        target: None,
                    },
                ))
            }
            pt::ExprNode::Is { loc, value, ty } => {
                let pos = self.pos(*loc);
                let value = self.build_expr(value)?;
                let type_ident = self.convert_type(ty);
                Ok(self.mk_expr(
                    pos,
                    ExprKind::Is {
                        value,
                        type_ident,
                        target: None,
                    },
                ))
            }
            pt::ExprNode::Lambda { loc, params, body } => {
                self.build_lambda(self.pos(*loc), params, body)
            }
            pt::ExprNode::Comprehension {
                loc,
                elem_type,
                element,
                generators,
            } => self.build_comprehension(self.pos(*loc), elem_type, element, generators),
        }
    }

    /// Binary operators become operator-method calls; `a in x` inverts
    /// into `x._contains_(a)`.
    fn build_binary(
        &mut self,
        pos: Position,
        op: &str,
        left: &pt::ExprNode,
        right: &pt::ExprNode,
    ) -> DiagnosticResult<ExprId> {
        let method = BINARY_OPERATOR_MAPPING.get(op).ok_or_else(|| {
            Diagnostic::error_at(&pos, format!("unknown binary operator `{}`", op))
        })?;
        let receiver = self.build_expr(left)?;
        if *method == "_contains_" {
            let container = self.build_expr(right)?;
            let call = self.call(pos.clone(), Identifier::new(*method), vec![receiver]);
            Ok(self.member(pos, container, call))
        } else {
            let argument = self.build_expr(right)?;
            let call = self.call(pos.clone(), Identifier::new(*method), vec![argument]);
            Ok(self.member(pos, receiver, call))
        }
    }
}
