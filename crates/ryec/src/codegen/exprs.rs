//! Expression emission. Every successful visit pushes exactly one
//! operand onto the evaluation stack.

use crate::ast::{DeclId, ExprId, ExprKind, FunctionKind, Ty};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::types::{self, pointer, LlvmType};
use super::{CodeGen, LlvmIdentifier};

impl<'p> CodeGen<'p> {
    pub(crate) fn visit_expr(&mut self, expr: ExprId) -> DiagnosticResult<()> {
        match &self.program.expr(expr).kind {
            ExprKind::IntLiteral(v) => {
                let constant = LlvmIdentifier::new(v.to_string(), LlvmType::Int64, false);
                let boxed = self.box_value(&constant, &Ty::class(self.core.int))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::FloatLiteral(v) => {
                let constant =
                    LlvmIdentifier::new(format!("{:.6e}", v), LlvmType::Double, false);
                let boxed = self.box_value(&constant, &Ty::class(self.core.float))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::BoolLiteral(v) => {
                let constant =
                    LlvmIdentifier::new(if *v { "1" } else { "0" }, LlvmType::Int1, false);
                let boxed = self.box_value(&constant, &Ty::class(self.core.boolean))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::CharLiteral(v) => {
                let code = (*v as u32) & 0xff;
                let constant = LlvmIdentifier::new(code.to_string(), LlvmType::Int8, false);
                let boxed = self.box_value(&constant, &Ty::class(self.core.char_class))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::StringLiteral(v) => {
                let v = v.clone();
                let data = self.string_constant(&v);
                let boxed = self.box_value(&data, &Ty::class(self.core.string))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::ArrayLiteral(elems) => {
                let elems = elems.clone();
                for e in &elems {
                    self.visit_expr(*e)?;
                }
                let values = self.pop_arguments(elems.len());
                let ty = self.expr_ty(expr)?;
                let boxed = self.build_array(&values, &ty)?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::Variable { decl, .. } => {
                let decl = (*decl).ok_or_else(|| {
                    Diagnostic::error_at(
                        &self.program.expr(expr).position,
                        "unresolved variable access",
                    )
                })?;
                self.visit_variable_access(expr, decl)
            }
            ExprKind::Member { left, right } => {
                let (left, right) = (*left, *right);
                self.visit_expr(left)?;
                let receiver_ty = self.program.expr(left).ty.clone();
                match &self.program.expr(right).kind {
                    ExprKind::Variable { decl, .. } => {
                        let decl = (*decl).ok_or_else(|| {
                            Diagnostic::error_at(
                                &self.program.expr(right).position,
                                "unresolved member access",
                            )
                        })?;
                        self.visit_attribute_access(right, decl)
                    }
                    ExprKind::Call { .. } => self.visit_call(right, receiver_ty.as_ref()),
                    _ => Err(Diagnostic::error_at(
                        &self.program.expr(right).position,
                        "a member access selects an attribute or a method",
                    )),
                }
            }
            ExprKind::SelfExpr => {
                let this = self
                    .self_ident()
                    .ok_or_else(|| Diagnostic::error("self outside of a method"))?;
                self.stack.push(this);
                Ok(())
            }
            ExprKind::Parent { target, .. } => {
                let target = target.clone().ok_or_else(|| {
                    Diagnostic::error("unresolved parent expression")
                })?;
                let this = self
                    .self_ident()
                    .ok_or_else(|| Diagnostic::error("parent outside of a method"))?;
                let prefix = self.create_label_prefix("cast");
                let result = self.cast_class(&this, &target, &prefix)?;
                self.stack.push(result);
                Ok(())
            }
            ExprKind::Call { .. } => self.visit_call(expr, None),
            ExprKind::Cast { value, target, .. } => {
                let value = *value;
                let target = target.clone().ok_or_else(|| {
                    Diagnostic::error_at(
                        &self.program.expr(expr).position,
                        "unresolved cast target",
                    )
                })?;
                self.visit_expr(value)?;
                let object = self.pop_value();
                let prefix = self.create_label_prefix("cast");
                let result = self.cast_class(&object, &target, &prefix)?;
                self.stack.push(result);
                Ok(())
            }
            ExprKind::Is { value, target, .. } => {
                let value = *value;
                let target = target.clone().ok_or_else(|| {
                    Diagnostic::error_at(
                        &self.program.expr(expr).position,
                        "unresolved is target",
                    )
                })?;
                self.visit_expr(value)?;
                let object = self.pop_value();
                let prefix = self.create_label_prefix("is");
                let bit = self.is_class(&object, &target, &prefix)?;
                let boxed = self.box_value(&bit, &Ty::class(self.core.boolean))?;
                self.stack.push(boxed);
                Ok(())
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let (condition, then_expr, else_expr) = (*condition, *then_expr, *else_expr);
                let prefix = self.create_label_prefix("ifexpr");
                let if_true = format!("{}.true", prefix);
                let if_false = format!("{}.false", prefix);
                let if_end = format!("{}.end", prefix);

                self.visit_expr(condition)?;
                let cond = self.pop_value();
                self.branch_on(&cond, &if_true, &if_false);

                self.contexts.active().label(if_true);
                self.visit_expr(then_expr)?;
                let then_operand = self.pop_value();
                let then_value = self.resolve_value(&then_operand);
                let then_label = self.contexts.active().current_label().to_string();
                self.contexts.active().branch(&if_end);

                self.contexts.active().label(if_false);
                self.visit_expr(else_expr)?;
                let else_operand = self.pop_value();
                let else_value = self.resolve_value(&else_operand);
                let else_value = self.bitcast_to(&else_value, &then_value.ty);
                let else_label = self.contexts.active().current_label().to_string();
                self.contexts.active().branch(&if_end);

                self.contexts.active().label(if_end);
                let result = self.idents.tmp(then_value.ty.clone());
                self.contexts.active().append(format!(
                    "{} = phi {} [ {}, %{} ], [ {}, %{} ]",
                    result.name,
                    then_value.ty,
                    then_value.name,
                    then_label,
                    else_value.name,
                    else_label
                ));
                self.stack.push(result);
                Ok(())
            }
            ExprKind::Zero => {
                let ty = self.expr_ty(expr)?;
                let ir = self.map_ty(&ty);
                self.stack
                    .push(LlvmIdentifier::new("null", ir, false));
                Ok(())
            }
        }
    }

    fn expr_ty(&self, expr: ExprId) -> DiagnosticResult<Ty> {
        self.program.expr(expr).ty.clone().ok_or_else(|| {
            Diagnostic::error_at(
                &self.program.expr(expr).position,
                "expression has no resolved type",
            )
        })
    }

    /// Variable access, distinguished by the declaration: global,
    /// generator state, attribute behind a member target, or local.
    fn visit_variable_access(&mut self, expr: ExprId, decl: DeclId) -> DiagnosticResult<()> {
        let v = self.program.variable(decl);
        if v.is_global {
            let ty = self.expr_ty(expr)?;
            let symbol = types::mangle_variable(self.program, decl);
            let ir = self.map_ty(&ty);
            self.stack
                .push(LlvmIdentifier::new(format!("@{}", symbol), ir, true));
            return Ok(());
        }
        if v.is_attribute() {
            // A bare attribute read inside a generator body resolves as
            // a member of the iterator's state object.
            let owner = v.owner_class;
            let in_generator = self
                .current_function
                .last()
                .and_then(|f| self.program.function(*f).defining_class)
                .is_some_and(|c| Some(c) == owner && self.program.class(c).is_generator);
            if !in_generator {
                return Err(Diagnostic::error_at(
                    &self.program.expr(expr).position,
                    "attribute access requires a receiver",
                ));
            }
            let index = self
                .program
                .variable(decl)
                .attribute_index
                .unwrap_or_else(|| panic!("attribute without an index"));
            let lvalue = self.program.expr(expr).lvalue;
            let ty = self.expr_ty(expr)?;
            let ir = self.map_ty(&ty);
            let this = self
                .self_ident()
                .ok_or_else(|| Diagnostic::error("generator state outside a method"))?;
            let access = self.access_member(&this, index, ir, !lvalue);
            self.stack.push(access);
            return Ok(());
        }
        match self.lookup_local(decl) {
            Some(ident) => {
                self.stack.push(ident);
                Ok(())
            }
            None => Err(Diagnostic::error_at(
                &self.program.expr(expr).position,
                format!(
                    "`{}` is used before it is emitted",
                    self.program.variable(decl).identifier
                ),
            )),
        }
    }

    /// The right side of a member access naming an attribute: pop the
    /// target, index into it, dereference unless used as an l-value.
    fn visit_attribute_access(&mut self, expr: ExprId, decl: DeclId) -> DiagnosticResult<()> {
        let target = self.pop_value();
        let index = self
            .program
            .variable(decl)
            .attribute_index
            .unwrap_or_else(|| panic!("attribute without an index"));
        let lvalue = self.program.expr(expr).lvalue;
        let ty = self.expr_ty(expr)?;
        let ir = self.map_ty(&ty);
        let access = self.access_member(&target, index, ir, !lvalue);
        self.stack.push(access);
        Ok(())
    }

    /// Function-call dispatch, in the documented order: the boxed-core
    /// initializer identity, receiver handling, fresh-object allocation
    /// with its default-initializer call, then virtual or direct
    /// dispatch.
    fn visit_call(&mut self, expr: ExprId, receiver_ty: Option<&Ty>) -> DiagnosticResult<()> {
        let (args, decl) = match &self.program.expr(expr).kind {
            ExprKind::Call { args, decl, .. } => (args.clone(), *decl),
            _ => panic!("visit_call on a non-call expression"),
        };
        let function = decl.ok_or_else(|| {
            Diagnostic::error_at(&self.program.expr(expr).position, "unresolved call")
        })?;

        for a in &args {
            self.visit_expr(*a)?;
        }
        let mut arguments = self.pop_arguments(args.len());

        let f = self.program.function(function);
        let kind = f.kind;
        let is_default_initializer = f.is_default_initializer;
        let defining = f.defining_class;
        let return_ty = f.return_ty.clone();
        let param_decls = f.parameters.clone();

        // Rule 1: initializers of the treated-special boxed core classes
        // push their already-boxed argument unchanged.
        if kind == FunctionKind::Initializer
            && defining.is_some_and(|c| self.core.is_treated_special(c))
            && arguments.len() == 1
        {
            let value = arguments.pop().unwrap_or_else(|| unreachable!());
            self.stack.push(value);
            return Ok(());
        }

        // The receiver type carrying the variation context for this
        // call: the member target's type, or the constructed type.
        let context_ty = match receiver_ty {
            Some(t) => Some(self.apply_variations(t)),
            None if kind == FunctionKind::Initializer => {
                let t = self.expr_ty(expr)?;
                Some(self.apply_variations(&t))
            }
            None => None,
        };
        let owner_args: Vec<Ty> = match (defining, &context_ty) {
            (Some(owner), Some(ctx)) => {
                types::variation_args_for(self.program, ctx, owner).unwrap_or_default()
            }
            _ => Vec::new(),
        };

        // Rules 2-4: receiver handling.
        let mut expected: Vec<Ty> = Vec::new();
        if kind != FunctionKind::Unbound {
            let owner = defining.ok_or_else(|| {
                Diagnostic::error("member function without a defining class")
            })?;
            expected.push(Ty::Class {
                decl: owner,
                args: owner_args.clone(),
            });
            if kind == FunctionKind::Method {
                let receiver = self.pop_value();
                arguments.insert(0, receiver);
            } else {
                // Initializer.
                if receiver_ty.is_some() {
                    let receiver = self.pop_value();
                    arguments.insert(0, receiver);
                } else {
                    // Fresh-object path: allocate, then run the default
                    // initializer first when the chosen one is not it.
                    let constructed = self.expr_ty(expr)?;
                    let fresh = self.call_constructor(&constructed)?;
                    if !is_default_initializer {
                        let default = self
                            .program
                            .class(owner)
                            .default_initializer
                            .unwrap_or_else(|| panic!("class without a default initializer"));
                        self.ensure_callee_declared(default, &owner_args)?;
                        let symbol =
                            types::mangle_function(self.program, default, Some(&owner_args));
                        let receiver = self.resolve_value(&fresh);
                        self.call_direct(&symbol, LlvmType::Void, &[receiver]);
                    }
                    arguments.insert(0, fresh);
                }
            }
        }
        for p in &param_decls {
            let declared = self.program.variable(*p).ty.clone().ok_or_else(|| {
                Diagnostic::error("parameter has no resolved type")
            })?;
            let substituted = match defining {
                Some(owner) => types::subst_ty(&declared, owner, &owner_args),
                None => declared,
            };
            expected.push(substituted);
        }

        // Materialize the arguments against the expected parameter
        // types.
        let mut final_args = Vec::with_capacity(arguments.len());
        for (arg, formal) in arguments.iter().zip(&expected) {
            let value = self.resolve_value(arg);
            let ir = self.map_ty(formal);
            final_args.push(self.bitcast_to(&value, &ir));
        }

        let ret_ir = match (kind, &return_ty) {
            (FunctionKind::Initializer, _) => LlvmType::Void,
            (_, None) => LlvmType::Void,
            (_, Some(_)) => {
                let ty = self.expr_ty(expr)?;
                self.map_ty(&ty)
            }
        };

        // Rules 5-6: dispatch and result.
        if kind == FunctionKind::Method {
            let slot = self
                .program
                .function(function)
                .vtable_slot
                .unwrap_or_else(|| panic!("method without a dispatch slot"));
            if let Some(result) = self.call_virtual(slot, ret_ir, &final_args) {
                self.stack.push(result);
            }
        } else {
            self.ensure_callee_declared(function, &owner_args)?;
            let symbol = types::mangle_function(self.program, function, Some(&owner_args));
            let result = self.call_direct(&symbol, ret_ir, &final_args);
            if kind == FunctionKind::Initializer {
                // Initializers push self.
                let this = final_args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| panic!("initializer call without a receiver"));
                self.stack.push(this);
            } else if let Some(result) = result {
                self.stack.push(result);
            }
        }
        Ok(())
    }

    /// Pops already-evaluated elements (reversed back to source order by
    /// the caller), builds the array aggregate, and boxes it.
    fn build_array(
        &mut self,
        values: &[LlvmIdentifier],
        array_ty: &Ty,
    ) -> DiagnosticResult<LlvmIdentifier> {
        let array_ty = self.apply_variations(array_ty);
        let (decl, args) = match &array_ty {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => {
                return Err(Diagnostic::error("array literal of abstract generic type"));
            }
        };
        let elem_ty = args
            .first()
            .cloned()
            .unwrap_or(Ty::class(self.core.object));
        let elem_ir = self.map_ty(&elem_ty);
        let struct_name = self.ensure_struct(decl, &args);
        let object_ty = pointer(LlvmType::Named(struct_name.clone()));

        // Layout size plus one element slot per entry.
        let elems_size = self.idents.tmp(LlvmType::Int64);
        self.contexts.active().append(format!(
            "{} = mul i64 {}, ptrtoint ({et}* getelementptr ({et}, {et}* null, i32 1) to i64)",
            elems_size.name,
            values.len(),
            et = elem_ir
        ));
        let total = self.idents.tmp(LlvmType::Int64);
        self.contexts.active().append(format!(
            "{} = add i64 ptrtoint (%{sn}* getelementptr (%{sn}, %{sn}* null, i32 1) to i64), {}",
            total.name,
            elems_size.name,
            sn = struct_name
        ));
        let raw = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = call i8* @rye_alloc(i64 {})",
            raw.name, total.name
        ));
        let object = self.bitcast_to(&raw, &object_ty);
        self.store_descriptor(&object, decl, &args);

        let len_slot = self.idents.tmp(pointer(LlvmType::Int64));
        self.contexts.active().append(format!(
            "{} = getelementptr %{}, {} {}, i32 0, i32 1",
            len_slot.name, struct_name, object_ty, object.name
        ));
        self.contexts.active().append(format!(
            "store i64 {}, i64* {}",
            values.len(),
            len_slot.name
        ));

        for (i, value) in values.iter().enumerate() {
            let value = self.resolve_value(value);
            let value = self.bitcast_to(&value, &elem_ir);
            let slot = self.idents.tmp(pointer(elem_ir.clone()));
            self.contexts.active().append(format!(
                "{} = getelementptr %{}, {} {}, i32 0, i32 2, i64 {}",
                slot.name, struct_name, object_ty, object.name, i
            ));
            self.contexts.active().append(format!(
                "store {}, {}* {}",
                value.typed(),
                elem_ir,
                slot.name
            ));
        }
        Ok(object)
    }
}
