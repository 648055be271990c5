//! Generator-class synthesis.
//!
//! A generator declaration (and every list comprehension) lowers into
//! two classes: a factory carrying the captured parameters, whose
//! `getIterator()` builds a fresh iterator, and the generator-iterator
//! class whose `getNext()` holds the original body with its yield
//! points. Locals of the body are hoisted into iterator attributes so
//! they survive suspensions; the first payload attribute is the
//! indirect-branch target `getNext` resumes through.

use rye_ast as pt;

use crate::ast::{
    Block, BlockId, ClassDecl, DeclId, Declaration, ExprKind, FunctionDecl, FunctionKind,
    Identifier, Position, StmtId, StmtKind, VariableDecl, VariableKind,
};
use crate::diagnostics::DiagnosticResult;

use super::AstBuilder;

impl<'a> AstBuilder<'a> {
    pub(crate) fn build_generator(&mut self, node: &pt::GeneratorNode) -> DiagnosticResult<DeclId> {
        let pos = self.pos(node.loc);
        let elem = self.convert_type(&node.elem_type);

        self.generator_types.push(Some(elem.clone()));
        self.yield_collectors.push(Vec::new());

        self.variable_context = VariableKind::Parameter;
        let mut params = Vec::with_capacity(node.params.len());
        for p in &node.params {
            params.push(self.build_param(p)?);
        }
        let mut default_params = Vec::with_capacity(node.default_params.len());
        let mut default_values = Vec::with_capacity(node.default_params.len());
        for dp in &node.default_params {
            default_params.push(self.build_param(&dp.param)?);
            default_values.push(self.build_expr(&dp.value)?);
        }

        let body = self.build_block(pos.clone(), &node.body);
        let yields = self.yield_collectors.pop().unwrap_or_default();
        self.generator_types.pop();
        let body = body?;

        self.create_generator_classes(
            pos,
            Identifier::new(node.name.clone()),
            elem,
            params,
            default_params,
            default_values,
            body,
            yields,
        )
    }

    /// Synthesizes the iterator class (added to the current block) and
    /// the factory class (returned to the caller).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_generator_classes(
        &mut self,
        pos: Position,
        class_ident: Identifier,
        elem: Identifier,
        params: Vec<DeclId>,
        default_params: Vec<DeclId>,
        default_values: Vec<crate::ast::ExprId>,
        body: BlockId,
        yields: Vec<StmtId>,
    ) -> DiagnosticResult<DeclId> {
        let all_params: Vec<DeclId> = params.iter().chain(&default_params).copied().collect();

        let iterator = self.generate_iterator_class(&pos, &all_params, body, &elem, yields)?;
        let cur = self.cur_block();
        self.program.block_mut(cur).declarations.push(iterator);
        let iterator_ident = self.program.class(iterator).identifier.clone();

        self.generate_generator_factory(
            &pos,
            class_ident,
            iterator_ident,
            &params,
            &default_params,
            &default_values,
        )
    }

    fn generate_iterator_class(
        &mut self,
        pos: &Position,
        all_params: &[DeclId],
        body: BlockId,
        elem: &Identifier,
        yields: Vec<StmtId>,
    ) -> DiagnosticResult<DeclId> {
        let none = Position::none();
        let class_block = self.program.add_block(Block::new(pos.clone()));

        // Payload attribute 0: the getNext resume target.
        let jump = VariableDecl::new(
            none.clone(),
            Identifier::new("$jump"),
            Identifier::new("Object"),
            VariableKind::Attribute,
        );
        let jump_id = self.program.add_decl(Declaration::Variable(jump));
        self.program.block_mut(class_block).declarations.push(jump_id);

        // Captured parameters.
        for p in all_params {
            let (p_ident, p_ty, p_pos) = {
                let v = self.program.variable(*p);
                (v.identifier.clone(), v.type_ident.clone(), v.position.clone())
            };
            let attr = VariableDecl::new(p_pos, p_ident, p_ty, VariableKind::Attribute);
            let attr_id = self.program.add_decl(Declaration::Variable(attr));
            self.program.block_mut(class_block).declarations.push(attr_id);
        }

        // Locals of the body survive suspensions as iterator attributes.
        self.hoist_generator_locals(body, class_block);

        // A body that falls off its end produces `Nothing<T>`. A trailing
        // yield does not end the body: execution resumes after it.
        let ends_with_plain_return = matches!(
            self.program.block(body).statements.last(),
            Some(last) if matches!(self.program.stmt(*last).kind, StmtKind::Return { .. })
        );
        if !ends_with_plain_return {
            let nothing = self.call(
                none.clone(),
                Identifier::generic("Nothing", vec![elem.clone()]),
                Vec::new(),
            );
            let ret = self.mk_stmt(
                none.clone(),
                StmtKind::Return {
                    value: Some(nothing),
                },
            );
            self.program.block_mut(body).statements.push(ret);
        }

        let mut get_next = FunctionDecl::new(
            pos.clone(),
            Identifier::new("getNext"),
            Vec::new(),
            body,
            FunctionKind::Method,
            Some(Identifier::generic("Maybe", vec![elem.clone()])),
        );
        get_next.yields = yields;
        let get_next_id = self.program.add_decl(Declaration::Function(get_next));
        self.program
            .block_mut(class_block)
            .declarations
            .push(get_next_id);

        let init = self.storing_initializer(pos, all_params)?;
        self.program.block_mut(class_block).declarations.push(init);

        let mut class = ClassDecl::new(pos.clone(), self.tmp.fresh("$GenIterator"), class_block);
        class.is_generator = true;
        class.super_idents = vec![Identifier::generic("Iterator", vec![elem.clone()])];
        Ok(self.program.add_decl(Declaration::Class(class)))
    }

    /// Moves every local variable declared in `body` (transitively
    /// through its statement blocks, but not into nested functions or
    /// classes) into the iterator's attribute list.
    fn hoist_generator_locals(&mut self, body: BlockId, class_block: BlockId) {
        let mut worklist = vec![body];
        while let Some(block) = worklist.pop() {
            let decls = std::mem::take(&mut self.program.block_mut(block).declarations);
            let mut kept = Vec::with_capacity(decls.len());
            for d in decls {
                let is_local = matches!(
                    self.program.decl(d),
                    Declaration::Variable(v) if v.kind == VariableKind::Variable
                );
                if is_local {
                    self.program.variable_mut(d).kind = VariableKind::Attribute;
                    self.program.block_mut(class_block).declarations.push(d);
                } else {
                    kept.push(d);
                }
            }
            self.program.block_mut(block).declarations = kept;

            for stmt in self.program.block(block).statements.clone() {
                match &self.program.stmt(stmt).kind {
                    StmtKind::Conditional {
                        then_block,
                        else_block,
                        ..
                    } => {
                        worklist.push(*then_block);
                        worklist.push(*else_block);
                    }
                    StmtKind::While { body, .. } => worklist.push(*body),
                    StmtKind::Try {
                        try_block,
                        handle_block,
                        ..
                    } => {
                        worklist.push(*try_block);
                        worklist.push(*handle_block);
                    }
                    _ => {}
                }
            }
        }
    }

    /// `initializer(p1, ..): self.p1 := p1; ...` with fresh parameter
    /// declarations mirroring `stored`.
    fn storing_initializer(
        &mut self,
        pos: &Position,
        stored: &[DeclId],
    ) -> DiagnosticResult<DeclId> {
        let none = Position::none();
        let mut init_params = Vec::with_capacity(stored.len());
        let body = self.program.add_block(Block::new(pos.clone()));
        for p in stored {
            let (p_ident, p_ty) = {
                let v = self.program.variable(*p);
                (v.identifier.clone(), v.type_ident.clone())
            };
            let param = VariableDecl::new(
                none.clone(),
                p_ident.clone(),
                p_ty,
                VariableKind::Parameter,
            );
            init_params.push(self.program.add_decl(Declaration::Variable(param)));

            let slf = self.mk_expr(none.clone(), ExprKind::SelfExpr);
            let attr = self.var_access(none.clone(), p_ident.clone());
            let target = self.member(none.clone(), slf, attr);
            let value = self.var_access(none.clone(), p_ident);
            let assign = self.mk_stmt(
                none.clone(),
                StmtKind::Assignment {
                    left: target,
                    right: value,
                },
            );
            self.program.block_mut(body).statements.push(assign);
        }
        let ret = self.mk_stmt(none.clone(), StmtKind::Return { value: None });
        self.program.block_mut(body).statements.push(ret);

        let init = FunctionDecl::new(
            pos.clone(),
            Identifier::new("initializer"),
            init_params,
            body,
            FunctionKind::Initializer,
            None,
        );
        Ok(self.program.add_decl(Declaration::Function(init)))
    }

    fn generate_generator_factory(
        &mut self,
        pos: &Position,
        class_ident: Identifier,
        iterator_ident: Identifier,
        params: &[DeclId],
        default_params: &[DeclId],
        default_values: &[crate::ast::ExprId],
    ) -> DiagnosticResult<DeclId> {
        let none = Position::none();
        let all_params: Vec<DeclId> = params.iter().chain(default_params).copied().collect();
        let class_block = self.program.add_block(Block::new(pos.clone()));

        let mut attr_idents = Vec::with_capacity(all_params.len());
        for p in &all_params {
            let (p_ident, p_ty, p_pos) = {
                let v = self.program.variable(*p);
                (v.identifier.clone(), v.type_ident.clone(), v.position.clone())
            };
            attr_idents.push(p_ident.clone());
            let attr = VariableDecl::new(p_pos, p_ident, p_ty, VariableKind::Attribute);
            let attr_id = self.program.add_decl(Declaration::Variable(attr));
            self.program.block_mut(class_block).declarations.push(attr_id);
        }

        // Initializer thunks for default parameters, then the maximal
        // initializer, built inside the class block so the default
        // machinery targets it.
        self.current_blocks.push(class_block);
        let thunks = self.build_default_functions(
            pos,
            &Identifier::new("initializer"),
            FunctionKind::Initializer,
            None,
            params,
            default_params,
            default_values,
        );
        self.current_blocks.pop();
        thunks?;

        let init = self.storing_initializer(pos, &all_params)?;
        self.program.block_mut(class_block).declarations.push(init);

        // getIterator() -> $GenIteratorN: fresh iterator over the stored
        // parameters.
        let mut args = Vec::with_capacity(attr_idents.len());
        for ident in &attr_idents {
            let slf = self.mk_expr(none.clone(), ExprKind::SelfExpr);
            let attr = self.var_access(none.clone(), ident.clone());
            args.push(self.member(none.clone(), slf, attr));
        }
        let make = self.call(none.clone(), iterator_ident.clone(), args);
        let get_iter_body = self.program.add_block(Block::new(pos.clone()));
        let ret = self.mk_stmt(none.clone(), StmtKind::Return { value: Some(make) });
        self.program.block_mut(get_iter_body).statements.push(ret);
        let get_iter = FunctionDecl::new(
            pos.clone(),
            Identifier::new("getIterator"),
            Vec::new(),
            get_iter_body,
            FunctionKind::Method,
            Some(iterator_ident),
        );
        let get_iter_id = self.program.add_decl(Declaration::Function(get_iter));
        self.program
            .block_mut(class_block)
            .declarations
            .push(get_iter_id);

        let class = ClassDecl::new(pos.clone(), class_ident, class_block);
        Ok(self.program.add_decl(Declaration::Class(class)))
    }

    /// A list comprehension synthesizes a parameterless generator whose
    /// body nests the for/if chain innermost-out around a single yield of
    /// the element expression; the expression's value is a fresh instance
    /// of the synthesized factory.
    pub(crate) fn build_comprehension(
        &mut self,
        pos: Position,
        elem_type: &pt::TypeNode,
        element: &pt::ExprNode,
        generators: &[pt::ComprehensionArm],
    ) -> DiagnosticResult<crate::ast::ExprId> {
        let elem = self.convert_type(elem_type);
        let target = self.build_expr(element)?;

        // Sources and filters evaluate against the enclosing scope.
        let mut arms = Vec::with_capacity(generators.len());
        for arm in generators {
            let source = self.build_expr(&arm.source)?;
            let filter = match &arm.filter {
                Some(f) => Some(self.build_expr(f)?),
                None => None,
            };
            arms.push((Identifier::new(arm.var.clone()), source, filter));
        }

        self.generator_types.push(Some(elem.clone()));
        self.yield_collectors.push(Vec::new());

        // Innermost block: yield the element.
        let mut current_block = self.program.add_block(Block::new(pos.clone()));
        let y = self.create_yield(pos.clone(), target);
        self.program.block_mut(current_block).statements.push(y);

        let result = self.build_comprehension_chain(&pos, arms, &mut current_block);
        let yields = self.yield_collectors.pop().unwrap_or_default();
        self.generator_types.pop();
        result?;

        let comprehension_name = self.tmp.fresh("$Comprehension");
        let class = self.create_generator_classes(
            pos.clone(),
            comprehension_name,
            elem,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            current_block,
            yields,
        )?;
        let cur = self.cur_block();
        self.program.block_mut(cur).declarations.push(class);

        let class_ident = self.program.class(class).identifier.clone();
        Ok(self.call(pos, class_ident, Vec::new()))
    }

    fn build_comprehension_chain(
        &mut self,
        pos: &Position,
        arms: Vec<(Identifier, crate::ast::ExprId, Option<crate::ast::ExprId>)>,
        current_block: &mut BlockId,
    ) -> DiagnosticResult<()> {
        for (ident, source, filter) in arms.into_iter().rev() {
            if let Some(filter) = filter {
                let empty = self.program.add_block(Block::new(pos.clone()));
                let ifstm = self.mk_stmt(
                    pos.clone(),
                    StmtKind::Conditional {
                        condition: filter,
                        then_block: *current_block,
                        else_block: empty,
                    },
                );
                let wrapper = self.program.add_block(Block::new(pos.clone()));
                self.program.block_mut(wrapper).statements.push(ifstm);
                *current_block = wrapper;
            }

            let for_block = self.program.add_block(Block::new(pos.clone()));
            self.current_blocks.push(for_block);
            let get_iterator = {
                let c = self.call(pos.clone(), Identifier::new("getIterator"), Vec::new());
                self.member(pos.clone(), source, c)
            };
            let for_stmt = self.create_for_loop(pos.clone(), ident, get_iterator, *current_block);
            self.current_blocks.pop();
            let for_stmt = for_stmt?;
            self.program.block_mut(for_block).statements.push(for_stmt);
            *current_block = for_block;
        }
        Ok(())
    }
}
