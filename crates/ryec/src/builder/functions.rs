//! Function, class, and lambda building.
//!
//! Default-argument functions synthesize one forwarding overload per
//! prefix of the default list; unbound functions additionally synthesize
//! a wrapper class so the function can be used as a value.

use rye_ast as pt;

use crate::ast::{
    AccessModifier, Block, ClassDecl, DeclId, Declaration, ExprId, ExprKind, FunctionDecl,
    FunctionKind, Identifier, Position, Statement, StmtKind, VariableDecl, VariableKind,
};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::AstBuilder;

impl<'a> AstBuilder<'a> {
    pub(crate) fn build_param(&mut self, node: &pt::ParamNode) -> DiagnosticResult<DeclId> {
        let pos = self.pos(node.loc);
        let ty = self.convert_type(&node.ty);
        let decl = VariableDecl::new(
            pos,
            Identifier::new(node.name.clone()),
            ty,
            VariableKind::Parameter,
        );
        Ok(self.program.add_decl(Declaration::Variable(decl)))
    }

    pub(crate) fn build_function(&mut self, node: &pt::FunctionNode) -> DiagnosticResult<DeclId> {
        if node.is_abstract {
            return self.build_abstract_function(node);
        }
        self.generator_types.push(None);
        let decl = self.build_functions(node);
        self.generator_types.pop();
        let decl = decl?;

        // A procedure body without a trailing return gets one appended.
        if node.return_type.is_none() {
            let body = self.program.function(decl).body;
            if !self.ends_with_return(body) {
                let ret = self
                    .program
                    .add_stmt(Statement::new(Position::none(), StmtKind::Return { value: None }));
                self.program.block_mut(body).statements.push(ret);
            }
        }
        Ok(decl)
    }

    pub(crate) fn ends_with_return(&self, block: crate::ast::BlockId) -> bool {
        match self.program.block(block).statements.last() {
            Some(last) => matches!(
                self.program.stmt(*last).kind,
                StmtKind::Return { .. } | StmtKind::Yield { .. }
            ),
            None => false,
        }
    }

    fn build_abstract_function(&mut self, node: &pt::FunctionNode) -> DiagnosticResult<DeclId> {
        let pos = self.pos(node.loc);
        self.variable_context = VariableKind::Parameter;
        let mut params = Vec::with_capacity(node.params.len());
        for p in &node.params {
            params.push(self.build_param(p)?);
        }
        let body = self.program.add_block(Block::new(pos.clone()));
        let rt = node.return_type.as_ref().map(|t| self.convert_type(t));
        let mut f = FunctionDecl::new(
            pos,
            Identifier::new(node.name.clone()),
            params,
            body,
            self.function_context,
            rt,
        );
        f.is_abstract = true;
        Ok(self.program.add_decl(Declaration::Function(f)))
    }

    /// Builds the maximal-arity function and, before it, the forwarding
    /// overloads for each prefix of its default parameters.
    fn build_functions(&mut self, node: &pt::FunctionNode) -> DiagnosticResult<DeclId> {
        let declaration_type = self.function_context;
        let pos = self.pos(node.loc);

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

        let ident = Identifier::new(node.name.clone());
        let rt = node.return_type.as_ref().map(|t| self.convert_type(t));

        self.build_default_functions(
            &pos,
            &ident,
            declaration_type,
            rt.as_ref(),
            &params,
            &default_params,
            &default_values,
        )?;

        let mut all_params = params;
        all_params.extend(default_params);

        let body = self.build_block(pos.clone(), &node.body)?;
        let f = FunctionDecl::new(pos, ident, all_params, body, declaration_type, rt);
        let is_unbound = f.is_unbound();
        let id = self.program.add_decl(Declaration::Function(f));
        if is_unbound {
            self.generate_wrapper_class(id)?;
        }
        Ok(id)
    }

    /// For each prefix of the default-parameter list, a thunk that calls
    /// the maximal-arity overload with the missing arguments filled from
    /// the defaults. Method and initializer thunks call through `self`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build_default_functions(
        &mut self,
        pos: &Position,
        ident: &Identifier,
        declaration_type: FunctionKind,
        rt: Option<&Identifier>,
        params: &[DeclId],
        default_params: &[DeclId],
        default_values: &[ExprId],
    ) -> DiagnosticResult<()> {
        let all: Vec<DeclId> = params.iter().chain(default_params).copied().collect();
        for idx in 0..default_params.len() {
            let provided = params.len() + idx;
            let mut args = Vec::with_capacity(all.len());
            for (y, decl) in all.iter().enumerate() {
                if y >= provided {
                    args.push(default_values[y - params.len()]);
                } else {
                    let name = self.program.variable(*decl).identifier.clone();
                    args.push(self.var_access(pos.clone(), name));
                }
            }
            let mut expr = self.call(pos.clone(), ident.clone(), args);
            if declaration_type != FunctionKind::Unbound {
                let slf = self.mk_expr(pos.clone(), ExprKind::SelfExpr);
                expr = self.member(pos.clone(), slf, expr);
            }

            let block = self.program.add_block(Block::new(pos.clone()));
            if rt.is_some() && declaration_type != FunctionKind::Initializer {
                let ret = self.mk_stmt(Position::none(), StmtKind::Return { value: Some(expr) });
                self.program.block_mut(block).statements.push(ret);
            } else {
                let call = self.mk_stmt(pos.clone(), StmtKind::Call { call: expr });
                self.program.block_mut(block).statements.push(call);
                let ret = self.mk_stmt(Position::none(), StmtKind::Return { value: None });
                self.program.block_mut(block).statements.push(ret);
            }

            let thunk = FunctionDecl::new(
                pos.clone(),
                ident.clone(),
                all[..provided].to_vec(),
                block,
                declaration_type,
                rt.cloned(),
            );
            let thunk_id = self.program.add_decl(Declaration::Function(thunk));
            let cur = self.cur_block();
            self.program.block_mut(cur).declarations.push(thunk_id);
        }
        Ok(())
    }

    pub(crate) fn build_class(&mut self, node: &pt::ClassNode) -> DiagnosticResult<DeclId> {
        let pos = self.pos(node.loc);
        let (name, formal_args) = match &node.name {
            pt::TypeNode::Named { name, args, .. } => (name.clone(), args.clone()),
            _ => {
                return Err(Diagnostic::error_at(&pos, "invalid class name"));
            }
        };
        let mut type_params = Vec::with_capacity(formal_args.len());
        for arg in &formal_args {
            match arg {
                pt::TypeNode::Named { name, args, .. } if args.is_empty() => {
                    type_params.push(Identifier::new(name.clone()));
                }
                _ => {
                    return Err(Diagnostic::error_at(
                        &pos,
                        "formal generic parameters must be plain identifiers",
                    ));
                }
            }
        }
        let super_idents: Vec<Identifier> = node
            .super_types
            .iter()
            .map(|t| self.convert_type(t))
            .collect();

        let block = self.program.add_block(Block::new(pos.clone()));
        self.current_blocks.push(block);
        let members = self.build_class_members(block, &node.members);
        self.current_blocks.pop();
        members?;

        let mut class = ClassDecl::new(pos, Identifier::new(name), block);
        class.is_abstract = node.is_abstract;
        class.super_idents = super_idents;
        class.type_params = type_params;
        Ok(self.program.add_decl(Declaration::Class(class)))
    }

    fn build_class_members(
        &mut self,
        block: crate::ast::BlockId,
        members: &[pt::MemberNode],
    ) -> DiagnosticResult<()> {
        for member in members {
            self.variable_context = VariableKind::Attribute;
            self.function_context = FunctionKind::Method;

            let access = match member.access {
                Some(pt::Access::Public) => AccessModifier::Public,
                Some(pt::Access::Protected) => AccessModifier::Protected,
                Some(pt::Access::Private) => AccessModifier::Private,
                Some(pt::Access::Package) | None => AccessModifier::Package,
            };

            let decl = match &member.item {
                pt::Item::Function(f) => {
                    if f.name == "initializer" {
                        if f.return_type.is_some() {
                            return Err(Diagnostic::error_at(
                                &self.pos(f.loc),
                                "an initializer returns no value",
                            ));
                        }
                        self.function_context = FunctionKind::Initializer;
                    }
                    self.build_function(f)?
                }
                pt::Item::Class(c) => self.build_class(c)?,
                pt::Item::Generator(g) => self.build_generator(g)?,
                pt::Item::Variable(v) => {
                    let attr_pos = self.pos(v.loc);
                    let ty = self.convert_type(&v.ty);
                    let attr = VariableDecl::new(
                        attr_pos.clone(),
                        Identifier::new(v.name.clone()),
                        ty,
                        VariableKind::Attribute,
                    );
                    let attr_id = self.program.add_decl(Declaration::Variable(attr));
                    // An attribute initializer becomes `self.name := e`
                    // in the class block; those statements run inside the
                    // default initializer.
                    if let Some(init) = &v.init {
                        let value = self.build_expr(init)?;
                        let slf = self.mk_expr(attr_pos.clone(), ExprKind::SelfExpr);
                        let access =
                            self.var_access(attr_pos.clone(), Identifier::new(v.name.clone()));
                        let target = self.member(attr_pos.clone(), slf, access);
                        let assign = self.mk_stmt(
                            attr_pos,
                            StmtKind::Assignment {
                                left: target,
                                right: value,
                            },
                        );
                        self.program.block_mut(block).statements.push(assign);
                    }
                    attr_id
                }
                pt::Item::Statement(_) => {
                    return Err(Diagnostic::error(
                        "statements are not allowed as class members",
                    ));
                }
            };
            self.program.decl_mut(decl).set_access(access);
            self.program.block_mut(block).declarations.push(decl);
        }
        Ok(())
    }

    /// A lambda expression becomes a fresh unbound function plus its
    /// wrapper object; the expression's value is the wrapper object.
    pub(crate) fn build_lambda(
        &mut self,
        pos: Position,
        params: &[pt::ParamNode],
        body: &pt::ExprNode,
    ) -> DiagnosticResult<ExprId> {
        self.variable_context = VariableKind::Parameter;
        let mut param_ids = Vec::with_capacity(params.len());
        for p in params {
            param_ids.push(self.build_param(p)?);
        }

        let value = self.build_expr(body)?;
        let body_block = self.program.add_block(Block::new(pos.clone()));
        let ret = self.mk_stmt(pos.clone(), StmtKind::Return { value: Some(value) });
        self.program.block_mut(body_block).statements.push(ret);

        let f = FunctionDecl::new(
            pos.clone(),
            self.tmp.fresh("$lambda"),
            param_ids,
            body_block,
            FunctionKind::Unbound,
            Some(Identifier::new("$infer")),
        );
        let fn_id = self.program.add_decl(Declaration::Function(f));
        let cur = self.cur_block();
        self.program.block_mut(cur).declarations.push(fn_id);

        let object = self.generate_wrapper_class(fn_id)?;
        let object_ident = self.program.variable(object).identifier.clone();
        Ok(self.var_access(pos, object_ident))
    }

    /// Synthesizes the wrapper class, the wrapper object declaration and
    /// the binding assignment for an unbound function. Returns the
    /// wrapper object declaration.
    pub(crate) fn generate_wrapper_class(&mut self, fn_id: DeclId) -> DiagnosticResult<DeclId> {
        let pos = Position::none();
        let (fn_ident, fn_params, fn_rt) = {
            let f = self.program.function(fn_id);
            (f.identifier.clone(), f.parameters.clone(), f.return_type_ident.clone())
        };

        // _apply_ forwards to the wrapped function.
        let mut apply_params = Vec::with_capacity(fn_params.len());
        let mut args = Vec::with_capacity(fn_params.len());
        for p in &fn_params {
            let (p_ident, p_ty) = {
                let v = self.program.variable(*p);
                (v.identifier.clone(), v.type_ident.clone())
            };
            let clone = VariableDecl::new(
                pos.clone(),
                p_ident.clone(),
                p_ty,
                VariableKind::Parameter,
            );
            apply_params.push(self.program.add_decl(Declaration::Variable(clone)));
            args.push(self.var_access(pos.clone(), p_ident));
        }
        let forward = self.call(pos.clone(), fn_ident, args);

        let apply_body = self.program.add_block(Block::new(pos.clone()));
        if fn_rt.is_some() {
            let ret = self.mk_stmt(pos.clone(), StmtKind::Return { value: Some(forward) });
            self.program.block_mut(apply_body).statements.push(ret);
        } else {
            let call = self.mk_stmt(pos.clone(), StmtKind::Call { call: forward });
            self.program.block_mut(apply_body).statements.push(call);
            let ret = self.mk_stmt(pos.clone(), StmtKind::Return { value: None });
            self.program.block_mut(apply_body).statements.push(ret);
        }
        let apply = FunctionDecl::new(
            pos.clone(),
            Identifier::new("_apply_"),
            apply_params,
            apply_body,
            FunctionKind::Method,
            fn_rt,
        );
        let apply_id = self.program.add_decl(Declaration::Function(apply));

        let class_block = self.program.add_block(Block::new(pos.clone()));
        self.program.block_mut(class_block).declarations.push(apply_id);
        let class_ident = self.tmp.fresh("$FnWrapper");
        let mut class = ClassDecl::new(pos.clone(), class_ident.clone(), class_block);
        class.is_function_wrapper = true;
        let class_id = self.program.add_decl(Declaration::Class(class));

        let object_ident = self.tmp.fresh("$fnobj");
        let object = VariableDecl::new(
            pos.clone(),
            object_ident.clone(),
            class_ident.clone(),
            VariableKind::Variable,
        );
        let object_id = self.program.add_decl(Declaration::Variable(object));

        let access = self.var_access(pos.clone(), object_ident);
        let ctor = self.call(pos.clone(), class_ident, Vec::new());
        let assign = self.mk_stmt(
            pos,
            StmtKind::Assignment {
                left: access,
                right: ctor,
            },
        );

        let cur = self.cur_block();
        let block = self.program.block_mut(cur);
        block.declarations.push(class_id);
        block.declarations.push(object_id);
        block.statements.push(assign);
        Ok(object_id)
    }
}
