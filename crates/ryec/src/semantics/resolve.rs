//! Name binding, overload resolution, and expression typing.

use crate::ast::{
    BlockId, DeclId, Declaration, ExprId, ExprKind, Identifier, Position, StmtId,
    StmtKind, Ty,
};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::{Analyzer, Scope};

impl<'a> Analyzer<'a> {
    pub(crate) fn resolve_bodies(&mut self) -> DiagnosticResult<()> {
        // The root scope holds every module's top-level declarations, so
        // whole-program references resolve across module boundaries.
        let mut root = Scope::default();
        for module in self.program.modules.clone() {
            let block = self.program.module(module).block;
            self.fill_scope(&mut root, block, true);
        }
        self.scopes.push(root);
        for module in self.program.modules.clone() {
            let block = self.program.module(module).block;
            self.resolve_block(block)?;
        }
        self.scopes.pop();
        Ok(())
    }

    /// Declares a block's variables and unbound functions into `scope`.
    /// Methods and initializers resolve through their receiver, never
    /// through the lexical scope.
    fn fill_scope(&self, scope: &mut Scope, block: BlockId, include_fns: bool) {
        for decl in &self.program.block(block).declarations {
            match self.program.decl(*decl) {
                Declaration::Variable(v) => {
                    scope.vars.insert(v.identifier.name.clone(), *decl);
                }
                Declaration::Function(f) if include_fns && f.is_unbound() => {
                    scope
                        .fns
                        .entry(f.identifier.name.clone())
                        .or_default()
                        .push(*decl);
                }
                _ => {}
            }
        }
    }

    fn resolve_block(&mut self, block: BlockId) -> DiagnosticResult<()> {
        let mut scope = Scope::default();
        self.fill_scope(&mut scope, block, true);
        self.scopes.push(scope);

        let result = (|| -> DiagnosticResult<()> {
            for decl in self.program.block(block).declarations.clone() {
                match self.program.decl(decl) {
                    Declaration::Class(_) => self.resolve_class(decl)?,
                    Declaration::Function(_) => self.resolve_function(decl)?,
                    _ => {}
                }
            }
            for stmt in self.program.block(block).statements.clone() {
                self.resolve_stmt(stmt)?;
            }
            Ok(())
        })();

        self.scopes.pop();
        result
    }

    fn resolve_class(&mut self, class: DeclId) -> DiagnosticResult<()> {
        self.current_class.push(class);
        let block = self.program.class(class).block;
        let result = self.resolve_block(block);
        self.current_class.pop();
        result
    }

    fn resolve_function(&mut self, function: DeclId) -> DiagnosticResult<()> {
        self.current_function.push(function);
        let mut scope = Scope::default();
        for p in self.program.function(function).parameters.clone() {
            let name = self.program.variable(p).identifier.name.clone();
            scope.vars.insert(name, p);
        }
        self.scopes.push(scope);
        let body = self.program.function(function).body;
        let result = self.resolve_block(body);
        self.scopes.pop();
        self.current_function.pop();
        result?;

        // A synthesized function without a declared return type takes it
        // from its trailing return.
        let needs_inference = matches!(
            &self.program.function(function).return_type_ident,
            Some(ident) if ident.name == "$infer"
        ) && self.program.function(function).return_ty.is_none();
        if needs_inference {
            let last = self.program.block(body).statements.last().copied();
            if let Some(last) = last {
                if let StmtKind::Return { value: Some(value) } = self.program.stmt(last).kind {
                    let ty = self.program.expr(value).ty.clone();
                    self.program.function_mut(function).return_ty = ty;
                }
            }
        }
        Ok(())
    }

    // ----- statements -----

    fn resolve_stmt(&mut self, stmt: StmtId) -> DiagnosticResult<()> {
        let pos = self.program.stmt(stmt).position.clone();
        match &self.program.stmt(stmt).kind {
            StmtKind::Assignment { left, right } => {
                let (left, right) = (*left, *right);
                self.resolve_expr(right)?;
                self.resolve_expr(left)?;
                self.mark_lvalue(left)?;
                let lt = self.program.expr(left).ty.clone();
                let rt = self.program.expr(right).ty.clone();
                if let (Some(lt), Some(rt)) = (lt, rt) {
                    if self.ty_distance(&lt, &rt) == u32::MAX {
                        return Err(Diagnostic::error_at(
                            &pos,
                            "type mismatch in assignment".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            StmtKind::Unpack {
                tmp_assign,
                field_assigns,
                ..
            } => {
                let tmp_assign = *tmp_assign;
                let field_assigns = field_assigns.clone();
                self.resolve_stmt(tmp_assign)?;
                for fa in field_assigns {
                    self.resolve_stmt(fa)?;
                }
                Ok(())
            }
            StmtKind::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                let (condition, then_block, else_block) = (*condition, *then_block, *else_block);
                self.resolve_expr(condition)?;
                self.expect_bool(condition, &pos)?;
                self.resolve_block(then_block)?;
                self.resolve_block(else_block)
            }
            StmtKind::While { condition, body } => {
                let (condition, body) = (*condition, *body);
                self.resolve_expr(condition)?;
                self.expect_bool(condition, &pos)?;
                self.loop_stack.push(stmt);
                let result = self.resolve_block(body);
                self.loop_stack.pop();
                result
            }
            StmtKind::Break { .. } => {
                let enclosing = self.loop_stack.last().copied();
                match enclosing {
                    Some(l) => {
                        if let StmtKind::Break { loop_stmt } = &mut self.program.stmt_mut(stmt).kind
                        {
                            *loop_stmt = Some(l);
                        }
                        Ok(())
                    }
                    None => Err(Diagnostic::error_at(&pos, "break outside of a loop")),
                }
            }
            StmtKind::Skip { .. } => {
                let enclosing = self.loop_stack.last().copied();
                match enclosing {
                    Some(l) => {
                        if let StmtKind::Skip { loop_stmt } = &mut self.program.stmt_mut(stmt).kind
                        {
                            *loop_stmt = Some(l);
                        }
                        Ok(())
                    }
                    None => Err(Diagnostic::error_at(&pos, "skip outside of a loop")),
                }
            }
            StmtKind::Return { value } => {
                let value = *value;
                if let Some(v) = value {
                    self.resolve_expr(v)?;
                }
                let function = match self.current_function.last() {
                    Some(f) => *f,
                    None => {
                        return Err(Diagnostic::error_at(&pos, "return outside of a function"));
                    }
                };
                let f = self.program.function(function);
                let is_procedure = f.return_type_ident.is_none();
                let ret_ty = f.return_ty.clone();
                match (value, is_procedure) {
                    (Some(_), true) => Err(Diagnostic::error_at(
                        &pos,
                        "return with a value inside a procedure",
                    )),
                    (Some(v), false) => {
                        if let (Some(rt), Some(vt)) =
                            (ret_ty, self.program.expr(v).ty.clone())
                        {
                            if self.ty_distance(&rt, &vt) == u32::MAX {
                                return Err(Diagnostic::error_at(
                                    &pos,
                                    "return value does not match the declared return type",
                                ));
                            }
                        }
                        Ok(())
                    }
                    (None, _) => Ok(()),
                }
            }
            StmtKind::Yield { value, .. } => {
                let value = *value;
                self.resolve_expr(value)
            }
            StmtKind::Raise { value } => {
                let value = *value;
                if let Some(v) = value {
                    self.resolve_expr(v)?;
                }
                Ok(())
            }
            StmtKind::Try {
                error,
                try_block,
                handle_block,
            } => {
                let (error, try_block, handle_block) = (*error, *try_block, *handle_block);
                self.resolve_block(try_block)?;
                let mut scope = Scope::default();
                let name = self.program.variable(error).identifier.name.clone();
                scope.vars.insert(name, error);
                self.scopes.push(scope);
                let result = self.resolve_block(handle_block);
                self.scopes.pop();
                result
            }
            StmtKind::Call { call } => {
                let call = *call;
                self.resolve_expr(call)
            }
        }
    }

    fn expect_bool(&mut self, expr: ExprId, pos: &Position) -> DiagnosticResult<()> {
        let boolean = Ty::class(self.core.boolean);
        if let Some(ty) = self.program.expr(expr).ty.clone() {
            if self.ty_distance(&boolean, &ty) == u32::MAX {
                return Err(Diagnostic::error_at(pos, "condition must be a Bool"));
            }
        }
        Ok(())
    }

    fn mark_lvalue(&mut self, expr: ExprId) -> DiagnosticResult<()> {
        match &self.program.expr(expr).kind {
            ExprKind::Variable { .. } => {
                self.program.expr_mut(expr).lvalue = true;
                Ok(())
            }
            ExprKind::Member { right, .. } => {
                let right = *right;
                self.program.expr_mut(expr).lvalue = true;
                match &self.program.expr(right).kind {
                    ExprKind::Variable { .. } => {
                        self.program.expr_mut(right).lvalue = true;
                        Ok(())
                    }
                    _ => Err(Diagnostic::error_at(
                        &self.program.expr(expr).position,
                        "expression is not assignable",
                    )),
                }
            }
            _ => Err(Diagnostic::error_at(
                &self.program.expr(expr).position,
                "expression is not assignable",
            )),
        }
    }

    // ----- expressions -----

    fn is_resolved(&self, expr: ExprId) -> bool {
        let e = self.program.expr(expr);
        match &e.kind {
            ExprKind::Variable { decl, .. } => decl.is_some(),
            ExprKind::Call { decl, .. } => decl.is_some(),
            ExprKind::Member { right, .. } => self.is_resolved(*right),
            _ => e.ty.is_some(),
        }
    }

    pub(crate) fn resolve_expr(&mut self, expr: ExprId) -> DiagnosticResult<()> {
        if self.is_resolved(expr) {
            return Ok(());
        }
        let pos = self.program.expr(expr).position.clone();
        let ty = match &self.program.expr(expr).kind {
            ExprKind::IntLiteral(_) => Some(Ty::class(self.core.int)),
            ExprKind::FloatLiteral(_) => Some(Ty::class(self.core.float)),
            ExprKind::BoolLiteral(_) => Some(Ty::class(self.core.boolean)),
            ExprKind::CharLiteral(_) => Some(Ty::class(self.core.char_class)),
            ExprKind::StringLiteral(_) => Some(Ty::class(self.core.string)),
            ExprKind::Zero => Some(Ty::class(self.core.object)),
            ExprKind::ArrayLiteral(elems) => {
                let elems = elems.clone();
                for e in &elems {
                    self.resolve_expr(*e)?;
                }
                let elem_ty = elems
                    .first()
                    .and_then(|e| self.program.expr(*e).ty.clone())
                    .unwrap_or(Ty::class(self.core.object));
                Some(self.make_class_ty(self.core.array, vec![elem_ty]))
            }
            ExprKind::Variable { name, .. } => {
                let name = name.clone();
                let decl = self.lookup_variable(&name.name).ok_or_else(|| {
                    Diagnostic::error_at(&pos, format!("unknown identifier `{}`", name.name))
                })?;
                let ty = self.var_ty(decl, &pos)?;
                if let ExprKind::Variable { decl: slot, .. } = &mut self.program.expr_mut(expr).kind
                {
                    *slot = Some(decl);
                }
                Some(ty)
            }
            ExprKind::SelfExpr => {
                let class = *self.current_class.last().ok_or_else(|| {
                    Diagnostic::error_at(&pos, "self outside of a class")
                })?;
                let args: Vec<Ty> = (0..self.program.class(class).type_params.len())
                    .map(|i| Ty::Generic {
                        owner: class,
                        index: i as u32,
                    })
                    .collect();
                Some(Ty::Class { decl: class, args })
            }
            ExprKind::Parent { type_ident, .. } => {
                let ident = type_ident.clone();
                if self.current_class.is_empty() {
                    return Err(Diagnostic::error_at(&pos, "parent outside of a class"));
                }
                let target = self.resolve_type(&ident, &pos)?;
                if let ExprKind::Parent { target: slot, .. } =
                    &mut self.program.expr_mut(expr).kind
                {
                    *slot = Some(target.clone());
                }
                Some(target)
            }
            ExprKind::Member { left, right } => {
                let (left, right) = (*left, *right);
                self.resolve_expr(left)?;
                let receiver = self.program.expr(left).ty.clone().ok_or_else(|| {
                    Diagnostic::error_at(&pos, "member access on a valueless expression")
                })?;
                self.resolve_member(right, &receiver, &pos)?;
                self.program.expr(right).ty.clone()
            }
            ExprKind::Call { name, args, .. } => {
                let name = name.clone();
                let args = args.clone();
                for a in &args {
                    self.resolve_expr(*a)?;
                }
                let actuals = self.arg_types(&args, &pos)?;
                return self.resolve_free_call(expr, &name, &actuals, &pos);
            }
            ExprKind::Cast {
                value, type_ident, ..
            } => {
                let (value, ident) = (*value, type_ident.clone());
                self.resolve_expr(value)?;
                let target = self.resolve_cast_target(&ident, value, &pos)?;
                if let ExprKind::Cast { target: slot, .. } = &mut self.program.expr_mut(expr).kind
                {
                    *slot = Some(target.clone());
                }
                Some(target)
            }
            ExprKind::Is {
                value, type_ident, ..
            } => {
                let (value, ident) = (*value, type_ident.clone());
                self.resolve_expr(value)?;
                let target = self.resolve_type(&ident, &pos)?;
                if target.decl().is_none() {
                    return Err(Diagnostic::error_at(&pos, "`is` requires a class type"));
                }
                if let ExprKind::Is { target: slot, .. } = &mut self.program.expr_mut(expr).kind {
                    *slot = Some(target);
                }
                Some(Ty::class(self.core.boolean))
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let (condition, then_expr, else_expr) = (*condition, *then_expr, *else_expr);
                self.resolve_expr(condition)?;
                self.expect_bool(condition, &pos)?;
                self.resolve_expr(then_expr)?;
                self.resolve_expr(else_expr)?;
                self.program.expr(then_expr).ty.clone()
            }
        };
        self.program.expr_mut(expr).ty = ty;
        Ok(())
    }

    fn arg_types(&mut self, args: &[ExprId], pos: &Position) -> DiagnosticResult<Vec<Ty>> {
        let mut actuals = Vec::with_capacity(args.len());
        for a in args {
            let ty = self.program.expr(*a).ty.clone().ok_or_else(|| {
                Diagnostic::error_at(pos, "argument has no value")
            })?;
            actuals.push(ty);
        }
        Ok(actuals)
    }

    fn lookup_variable(&self, name: &str) -> Option<DeclId> {
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.vars.get(name) {
                return Some(*decl);
            }
        }
        None
    }

    /// A variable's type, inferring lazily for synthesized declarations.
    pub(crate) fn var_ty(&mut self, decl: DeclId, pos: &Position) -> DiagnosticResult<Ty> {
        if let Some(ty) = self.program.variable(decl).ty.clone() {
            return Ok(ty);
        }
        let infer_from = self.program.variable(decl).infer_from;
        match infer_from {
            Some(e) => {
                if !self.inferring.insert(decl) {
                    return Err(Diagnostic::error_at(pos, "cyclic type inference"));
                }
                let result = self.resolve_expr(e);
                self.inferring.remove(&decl);
                result?;
                let ty = self.program.expr(e).ty.clone().ok_or_else(|| {
                    Diagnostic::error_at(pos, "cannot infer a type for this variable")
                })?;
                self.program.variable_mut(decl).ty = Some(ty.clone());
                Ok(ty)
            }
            None => Err(Diagnostic::error_at(
                pos,
                format!(
                    "`{}` is used before its type is known",
                    self.program.variable(decl).identifier
                ),
            )),
        }
    }

    /// Resolves the right side of a member access against the receiver.
    fn resolve_member(
        &mut self,
        right: ExprId,
        receiver: &Ty,
        pos: &Position,
    ) -> DiagnosticResult<()> {
        if self.is_resolved(right) {
            return Ok(());
        }
        let class = receiver.decl().ok_or_else(|| {
            Diagnostic::error_at(pos, "member access requires a class-typed receiver")
        })?;
        match &self.program.expr(right).kind {
            ExprKind::Variable { name, .. } => {
                let name = name.clone();
                let attr = self.find_attribute(class, &name.name).ok_or_else(|| {
                    Diagnostic::error_at(
                        pos,
                        format!(
                            "`{}` has no attribute `{}`",
                            self.program.class(class).identifier,
                            name.name
                        ),
                    )
                })?;
                let declared = self.var_ty(attr, pos)?;
                let ty = self.subst_for_receiver(&declared, receiver);
                let e = self.program.expr_mut(right);
                if let ExprKind::Variable { decl: slot, .. } = &mut e.kind {
                    *slot = Some(attr);
                }
                e.ty = Some(ty);
                Ok(())
            }
            ExprKind::Call { name, args, .. } => {
                let name = name.clone();
                let args = args.clone();
                for a in &args {
                    self.resolve_expr(*a)?;
                }
                let actuals = self.arg_types(&args, pos)?;
                let mut candidates = Vec::new();
                self.collect_methods(class, &name.name, true, &mut candidates);
                if candidates.is_empty() {
                    return Err(Diagnostic::error_at(
                        pos,
                        format!(
                            "`{}` has no method `{}`",
                            self.program.class(class).identifier,
                            name.name
                        ),
                    ));
                }
                let chosen = self.pick_overload(&candidates, &actuals, Some(receiver), pos)?;
                let f = self.program.function(chosen);
                let ty = if f.is_initializer() {
                    Some(receiver.clone())
                } else {
                    let ret = f.return_ty.clone();
                    ret.map(|r| self.subst_for_receiver(&r, receiver))
                };
                let e = self.program.expr_mut(right);
                if let ExprKind::Call { decl: slot, .. } = &mut e.kind {
                    *slot = Some(chosen);
                }
                e.ty = ty;
                Ok(())
            }
            _ => Err(Diagnostic::error_at(
                pos,
                "a member access selects an attribute or a method",
            )),
        }
    }

    fn find_attribute(&self, class: DeclId, name: &str) -> Option<DeclId> {
        for attr in &self.program.class(class).attributes {
            if self.program.variable(*attr).identifier.name == name {
                return Some(*attr);
            }
        }
        None
    }

    /// Gathers `name` candidates on `class` and its ancestors, skipping
    /// signatures a subclass already provides. Initializers are only
    /// considered on the receiver class itself.
    fn collect_methods(
        &self,
        class: DeclId,
        name: &str,
        initializers: bool,
        out: &mut Vec<DeclId>,
    ) {
        let block = self.program.class(class).block;
        for decl in &self.program.block(block).declarations {
            if let Declaration::Function(f) = self.program.decl(*decl) {
                if f.identifier.name != name {
                    continue;
                }
                let relevant = f.is_method() || (initializers && f.is_initializer());
                if !relevant {
                    continue;
                }
                let dup = out.iter().any(|o| self.signature_matches(*o, *decl));
                if !dup {
                    out.push(*decl);
                }
            }
        }
        for sup in self.program.class(class).superclasses.clone() {
            if let Some(sup) = sup.decl() {
                self.collect_methods(sup, name, false, out);
            }
        }
    }

    fn signature_matches(&self, a: DeclId, b: DeclId) -> bool {
        let (fa, fb) = (self.program.function(a), self.program.function(b));
        fa.identifier.name == fb.identifier.name
            && fa.parameters.len() == fb.parameters.len()
            && fa
                .parameters
                .iter()
                .zip(&fb.parameters)
                .all(|(pa, pb)| {
                    self.program.variable(*pa).type_ident == self.program.variable(*pb).type_ident
                })
    }

    /// Overload selection: minimal summed parameter distance; a tie is
    /// a resolution error, never a silent pick.
    pub(crate) fn pick_overload(
        &mut self,
        candidates: &[DeclId],
        actuals: &[Ty],
        receiver: Option<&Ty>,
        pos: &Position,
    ) -> DiagnosticResult<DeclId> {
        let mut best: Option<(u64, DeclId)> = None;
        let mut tied = false;
        for cand in candidates {
            let params = self.program.function(*cand).parameters.clone();
            if params.len() != actuals.len() {
                continue;
            }
            let mut score = 0u64;
            let mut viable = true;
            for (p, actual) in params.iter().zip(actuals) {
                let declared = match self.program.variable(*p).ty.clone() {
                    Some(t) => t,
                    None => {
                        viable = false;
                        break;
                    }
                };
                let formal = match receiver {
                    Some(r) => self.subst_for_receiver(&declared, r),
                    None => declared,
                };
                let d = self.ty_distance(&formal, actual);
                if d == u32::MAX {
                    viable = false;
                    break;
                }
                score += d as u64;
            }
            if !viable {
                continue;
            }
            match best {
                None => best = Some((score, *cand)),
                Some((s, _)) if score < s => {
                    best = Some((score, *cand));
                    tied = false;
                }
                Some((s, _)) if score == s => tied = true,
                Some(_) => {}
            }
        }
        match best {
            Some(_) if tied => Err(Diagnostic::error_at(pos, "ambiguous call")),
            Some((_, decl)) => Ok(decl),
            None => Err(Diagnostic::error_at(pos, "no matching overload")),
        }
    }

    /// A call that is not the right side of a member access: either an
    /// unbound function from the lexical scope, or a constructor call.
    fn resolve_free_call(
        &mut self,
        expr: ExprId,
        name: &Identifier,
        actuals: &[Ty],
        pos: &Position,
    ) -> DiagnosticResult<()> {
        let mut candidates: Option<Vec<DeclId>> = None;
        for scope in self.scopes.iter().rev() {
            if let Some(fns) = scope.fns.get(&name.name) {
                if !fns.is_empty() {
                    candidates = Some(fns.clone());
                    break;
                }
            }
        }

        if let Some(candidates) = candidates {
            let chosen = self.pick_overload(&candidates, actuals, None, pos)?;
            let ty = self.program.function(chosen).return_ty.clone();
            let e = self.program.expr_mut(expr);
            if let ExprKind::Call { decl: slot, .. } = &mut e.kind {
                *slot = Some(chosen);
            }
            e.ty = ty;
            return Ok(());
        }

        // Constructor call.
        let class = *self.classes_by_name.get(&name.name).ok_or_else(|| {
            Diagnostic::error_at(pos, format!("unknown function `{}`", name.name))
        })?;
        let receiver = self.constructor_receiver_ty(class, name, actuals, pos)?;
        let mut inits = Vec::new();
        let block = self.program.class(class).block;
        for decl in self.program.block(block).declarations.clone() {
            if let Declaration::Function(f) = self.program.decl(decl) {
                if f.is_initializer() {
                    inits.push(decl);
                }
            }
        }
        let chosen = self.pick_overload(&inits, actuals, Some(&receiver), pos)?;
        let e = self.program.expr_mut(expr);
        if let ExprKind::Call { decl: slot, .. } = &mut e.kind {
            *slot = Some(chosen);
        }
        e.ty = Some(receiver);
        Ok(())
    }

    /// The constructed type: explicit generic arguments, or — for
    /// generic classes whose sole maximal initializer takes the formal
    /// parameters in order, like the tuple family — arguments inferred
    /// from the actuals.
    fn constructor_receiver_ty(
        &mut self,
        class: DeclId,
        name: &Identifier,
        actuals: &[Ty],
        pos: &Position,
    ) -> DiagnosticResult<Ty> {
        let type_params = self.program.class(class).type_params.clone();
        if !name.args.is_empty() {
            let mut args = Vec::with_capacity(name.args.len());
            for a in &name.args {
                args.push(self.resolve_type(a, pos)?);
            }
            if args.len() != type_params.len() {
                return Err(Diagnostic::error_at(
                    pos,
                    format!("wrong number of generic arguments for `{}`", name.name),
                ));
            }
            return Ok(self.make_class_ty(class, args));
        }
        if type_params.is_empty() {
            return Ok(Ty::class(class));
        }

        // Inference for the tuple-shaped case.
        let block = self.program.class(class).block;
        for decl in self.program.block(block).declarations.clone() {
            if let Declaration::Function(f) = self.program.decl(decl) {
                if !f.is_initializer() || f.parameters.len() != actuals.len() {
                    continue;
                }
                let direct = f
                    .parameters
                    .iter()
                    .zip(&type_params)
                    .all(|(p, tp)| {
                        let v = self.program.variable(*p);
                        v.type_ident.name == tp.name && v.type_ident.args.is_empty()
                    });
                if direct && f.parameters.len() == type_params.len() {
                    return Ok(self.make_class_ty(class, actuals.to_vec()));
                }
            }
        }
        Err(Diagnostic::error_at(
            pos,
            format!("cannot infer generic arguments for `{}`", name.name),
        ))
    }

    /// The for-in desugaring casts its Maybe to `Just<$infer>`; the
    /// element type comes from the value being cast.
    fn resolve_cast_target(
        &mut self,
        ident: &Identifier,
        value: ExprId,
        pos: &Position,
    ) -> DiagnosticResult<Ty> {
        let placeholder =
            ident.args.len() == 1 && ident.args[0].name == "$infer" && ident.args[0].args.is_empty();
        if !placeholder {
            return self.resolve_type(ident, pos);
        }
        let value_ty = self.program.expr(value).ty.clone().ok_or_else(|| {
            Diagnostic::error_at(pos, "cast of a valueless expression")
        })?;
        let elem = value_ty.args().first().cloned().ok_or_else(|| {
            Diagnostic::error_at(pos, "cannot infer the cast's generic argument")
        })?;
        let class = *self.classes_by_name.get(&ident.name).ok_or_else(|| {
            Diagnostic::error_at(pos, format!("undeclared type `{}`", ident.name))
        })?;
        Ok(self.make_class_ty(class, vec![elem]))
    }
}
