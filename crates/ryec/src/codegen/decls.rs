//! Declaration emission: modules, classes (with their monomorphic
//! variations), constructors, descriptors, and functions including the
//! generator `getNext` jump header.

use crate::ast::{BlockId, DeclId, Declaration, FunctionKind, StmtKind, Ty};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::types::{self, pointer, LlvmType};
use super::{CodeGen, LlvmIdentifier};

impl<'p> CodeGen<'p> {
    pub(crate) fn add_main(&mut self) {
        let ctx = self.contexts.active();
        ctx.raw("define i32 @main() {");
        ctx.label("entry");
    }

    pub(crate) fn return_main(&mut self) {
        let ctx = self.contexts.active();
        ctx.terminator("ret i32 0");
        ctx.raw("}");
    }

    /// Declarations first, then statements; the value stack is cleared
    /// between statements and must be empty after each one.
    pub(crate) fn visit_block(&mut self, block: BlockId) -> DiagnosticResult<()> {
        for decl in self.program.block(block).declarations.clone() {
            self.visit_declaration(decl)?;
        }
        for stmt in self.program.block(block).statements.clone() {
            self.stack.clear();
            self.visit_stmt(stmt)?;
            assert!(
                self.stack.is_empty(),
                "value stack not empty after a statement"
            );
        }
        Ok(())
    }

    fn visit_declaration(&mut self, decl: DeclId) -> DiagnosticResult<()> {
        match self.program.decl(decl) {
            Declaration::Class(_) => self.visit_class(decl),
            Declaration::Function(_) => self.visit_function(decl),
            Declaration::Variable(v) => {
                if v.is_global {
                    let ty = v.ty.clone().ok_or_else(|| {
                        Diagnostic::error_at(&v.position, "global variable has no resolved type")
                    })?;
                    let symbol = types::mangle_variable(self.program, decl);
                    let ir_ty = self.map_ty(&ty);
                    self.contexts
                        .declarations()
                        .raw(format!("@{} = global {} null", symbol, ir_ty));
                } else if !v.is_attribute() {
                    self.declare_local_variable(decl)?;
                }
                Ok(())
            }
            Declaration::Module(_) => Ok(()),
        }
    }

    fn declare_local_variable(&mut self, decl: DeclId) -> DiagnosticResult<()> {
        let v = self.program.variable(decl);
        let ty = v.ty.clone().ok_or_else(|| {
            Diagnostic::error_at(&v.position, "local variable has no resolved type")
        })?;
        let name = v.identifier.name.trim_start_matches('$').to_string();
        let ir_ty = self.map_ty(&ty);
        let ident = self.idents.local(&name, ir_ty.clone(), true);
        self.contexts
            .active()
            .append(format!("{} = alloca {}", ident.name, ir_ty));
        self.bind_local(decl, ident);
        Ok(())
    }

    /// Generic classes emit nothing themselves: each registered
    /// variation is emitted under its own variation context, in
    /// discovery order.
    fn visit_class(&mut self, class: DeclId) -> DiagnosticResult<()> {
        if class == self.core.void {
            return Ok(());
        }
        if self.program.class(class).is_generic() {
            let count = self.program.class(class).variations.len();
            for i in 0..count {
                let args = self.program.class(class).variations[i].clone();
                self.variation_stack.push((class, args));
                let result = self.emit_class_body(class);
                self.variation_stack.pop();
                result?;
            }
            Ok(())
        } else {
            self.emit_class_body(class)
        }
    }

    fn current_variation_args(&self, class: DeclId) -> Vec<Ty> {
        for (c, args) in self.variation_stack.iter().rev() {
            if *c == class {
                return args.clone();
            }
        }
        Vec::new()
    }

    fn emit_class_body(&mut self, class: DeclId) -> DiagnosticResult<()> {
        let args = self.current_variation_args(class);
        self.ensure_struct(class, &args);
        self.emit_descriptor(class, &args)?;
        if !self.program.class(class).is_abstract {
            self.open_function_scope();
            self.build_constructor(class, &args)?;
            self.close_function_scope();
        }
        let block = self.program.class(class).block;
        self.visit_block(block)
    }

    /// The allocation routine: malloc the layout, plant the descriptor,
    /// return the typed pointer.
    fn build_constructor(&mut self, class: DeclId, args: &[Ty]) -> DiagnosticResult<()> {
        let struct_name = self.ensure_struct(class, args);
        let object_ty = pointer(LlvmType::Named(struct_name.clone()));
        let symbol = types::ctor_symbol(self.program, class, args);

        let ctx = self.contexts.active();
        ctx.raw(format!("define {} @{}() {{", object_ty, symbol));
        ctx.label("entry");

        let raw = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = call i8* @rye_alloc(i64 ptrtoint (%{sn}* getelementptr (%{sn}, %{sn}* null, i32 1) to i64))",
            raw.name,
            sn = struct_name
        ));
        let object = self.bitcast_to(&raw, &object_ty);
        let addr = self.idents.tmp(pointer(pointer(pointer(LlvmType::Int8))));
        self.contexts.active().append(format!(
            "{} = getelementptr %{}, {} {}, i32 0, i32 0",
            addr.name, struct_name, object_ty, object.name
        ));
        let descriptor = self.descriptor_operand(class, args);
        self.contexts.active().append(format!(
            "store i8** {}, i8*** {}",
            descriptor, addr.name
        ));
        self.contexts
            .active()
            .terminator(format!("ret {} {}", object_ty, object.name));
        self.contexts.active().raw("}");
        Ok(())
    }

    /// The per-class descriptor: slot 0 links to the superclass
    /// descriptor (null for Object), the remaining slots hold the
    /// dispatch table in stable order.
    fn emit_descriptor(&mut self, class: DeclId, args: &[Ty]) -> DiagnosticResult<()> {
        let symbol = types::descriptor_symbol(self.program, class, args);
        if self.declared_symbols.contains(&symbol) {
            return Ok(());
        }
        self.declared_symbols.insert(symbol.clone());

        let emitted = Ty::Class {
            decl: class,
            args: args.to_vec(),
        };

        let mut entries = Vec::new();
        let first_super = self.program.class(class).superclasses.first().cloned();
        match first_super {
            Some(sup) => {
                let sup = types::subst_ty(&sup, class, args);
                match sup {
                    Ty::Class {
                        decl: sup_decl,
                        args: sup_args,
                    } => {
                        let sup_ty = types::descriptor_type(self.program, sup_decl);
                        let sup_sym =
                            types::descriptor_symbol(self.program, sup_decl, &sup_args);
                        entries.push(format!(
                            "i8* bitcast ({}* {} to i8*)",
                            sup_ty, sup_sym
                        ));
                    }
                    Ty::Generic { .. } => entries.push("i8* null".to_string()),
                }
            }
            None => entries.push("i8* null".to_string()),
        }

        for method in self.program.class(class).dispatch.clone() {
            let f = self.program.function(method);
            let owner = f.defining_class.unwrap_or(class);
            let owner_args =
                types::variation_args_for(self.program, &emitted, owner).unwrap_or_default();
            let symbol = types::mangle_function(self.program, method, Some(&owner_args));
            self.ensure_callee_declared(method, &owner_args)?;
            let fn_ty = self.method_fn_type(method, owner, &owner_args)?;
            entries.push(format!("i8* bitcast ({}* @{} to i8*)", fn_ty, symbol));
        }

        let dty = types::descriptor_type(self.program, class);
        self.contexts.declarations().raw(format!(
            "{} = constant {} [ {} ]",
            symbol,
            dty,
            entries.join(", ")
        ));
        Ok(())
    }

    /// The IR function type of a method as defined: receiver first, then
    /// the declared parameters, all under the owner's variation.
    fn method_fn_type(
        &mut self,
        method: DeclId,
        owner: DeclId,
        owner_args: &[Ty],
    ) -> DiagnosticResult<LlvmType> {
        let f = self.program.function(method);
        let ret = f.return_ty.clone();
        let params = f.parameters.clone();

        let receiver = Ty::Class {
            decl: owner,
            args: owner_args.to_vec(),
        };
        let mut ir_params = vec![self.map_ty(&receiver)];
        for p in params {
            let declared = self.program.variable(p).ty.clone().ok_or_else(|| {
                Diagnostic::error("method parameter has no resolved type")
            })?;
            let substituted = types::subst_ty(&declared, owner, owner_args);
            ir_params.push(self.map_ty(&substituted));
        }
        let ir_ret = match ret {
            Some(t) => {
                let substituted = types::subst_ty(&t, owner, owner_args);
                self.map_ty(&substituted)
            }
            None => LlvmType::Void,
        };
        Ok(LlvmType::Function {
            ret: Box::new(ir_ret),
            params: ir_params,
        })
    }

    /// Calls into native modules resolve to external symbols; make sure
    /// the `declare` exists exactly once.
    pub(crate) fn ensure_callee_declared(
        &mut self,
        function: DeclId,
        variation: &[Ty],
    ) -> DiagnosticResult<()> {
        if !self.is_native(function) {
            return Ok(());
        }
        let symbol = types::mangle_function(self.program, function, Some(variation));
        if self.declared_symbols.contains(&symbol) {
            return Ok(());
        }
        self.declared_symbols.insert(symbol.clone());

        let f = self.program.function(function);
        let owner = f.defining_class;
        let params = f.parameters.clone();
        let ret = f.return_ty.clone();

        let mut ir_params = Vec::new();
        if let Some(owner) = owner {
            let receiver = Ty::Class {
                decl: owner,
                args: variation.to_vec(),
            };
            ir_params.push(self.map_ty(&receiver));
        }
        for p in params {
            let declared = self.program.variable(p).ty.clone().ok_or_else(|| {
                Diagnostic::error("native parameter has no resolved type")
            })?;
            let substituted = match owner {
                Some(owner) => types::subst_ty(&declared, owner, variation),
                None => declared,
            };
            ir_params.push(self.map_ty(&substituted));
        }
        let ir_ret = match ret {
            Some(t) => {
                let substituted = match owner {
                    Some(owner) => types::subst_ty(&t, owner, variation),
                    None => t,
                };
                self.map_ty(&substituted)
            }
            None => LlvmType::Void,
        };
        let rendered: Vec<String> = ir_params.iter().map(|t| t.to_string()).collect();
        self.contexts.declarations().raw(format!(
            "declare {} @{}({})",
            ir_ret,
            symbol,
            rendered.join(", ")
        ));
        Ok(())
    }

    /// Native means: declared in a native module, not abstract, not part
    /// of a synthesized wrapper class, and not an initializer.
    pub(crate) fn is_native(&self, function: DeclId) -> bool {
        let f = self.program.function(function);
        if f.is_abstract || f.is_initializer() {
            return false;
        }
        if let Some(class) = f.defining_class {
            if self.program.class(class).is_function_wrapper {
                return false;
            }
        }
        match f.module {
            Some(m) => self.program.module(m).native,
            None => false,
        }
    }

    // ----- functions -----

    fn visit_function(&mut self, function: DeclId) -> DiagnosticResult<()> {
        let f = self.program.function(function);
        let defining = f.defining_class;
        let variation = defining
            .map(|c| self.current_variation_args(c))
            .unwrap_or_default();

        if self.is_native(function) {
            return self.ensure_callee_declared(function, &variation);
        }

        let is_abstract = f.is_abstract;
        let is_initializer = f.is_initializer();
        let is_generator = f.is_generator();
        let returns_value = f.return_ty.is_some();
        let body = f.body;

        self.open_function_scope();
        self.current_function.push(function);
        let result = (|| -> DiagnosticResult<()> {
            self.add_function(function, &variation)?;

            if is_abstract {
                // Abstract bodies synthesize a default return of the
                // declared type.
                let f = self.program.function(function);
                match f.return_ty.clone() {
                    Some(ty) => {
                        let ir = self.map_ty(&ty);
                        self.contexts
                            .active()
                            .terminator(format!("ret {} null", ir));
                    }
                    None => {
                        self.contexts.active().terminator("ret void");
                    }
                }
            } else {
                if is_generator {
                    self.add_generator_jump_header(function)?;
                }

                let generator_class = defining
                    .filter(|c| self.program.class(*c).is_generator)
                    .filter(|_| is_initializer);
                match generator_class {
                    Some(class) => {
                        // Emit the body minus its synthesized trailing
                        // return, then plant the start label before the
                        // final return.
                        self.visit_initializer_body_of_generator(body, class)?;
                    }
                    None => {
                        self.visit_block(body)?;
                    }
                }

                if !self.contexts.active().is_terminated() {
                    if returns_value {
                        self.contexts.active().terminator("unreachable");
                    } else {
                        self.contexts.active().terminator("ret void");
                    }
                }
            }
            self.contexts.active().raw("}");
            Ok(())
        })();
        self.current_function.pop();
        self.close_function_scope();
        result
    }

    /// A generator-class initializer arms the state machine: before its
    /// final return the jump pointer is set to `startGenerator`.
    fn visit_initializer_body_of_generator(
        &mut self,
        body: BlockId,
        class: DeclId,
    ) -> DiagnosticResult<()> {
        for decl in self.program.block(body).declarations.clone() {
            self.visit_declaration(decl)?;
        }
        let stmts = self.program.block(body).statements.clone();
        for stmt in &stmts {
            let is_trailing_return = Some(stmt) == stmts.last()
                && matches!(self.program.stmt(*stmt).kind, StmtKind::Return { value: None });
            if is_trailing_return {
                break;
            }
            self.stack.clear();
            self.visit_stmt(*stmt)?;
        }
        self.set_generator_label(class, "startGenerator")?;
        self.contexts.active().terminator("ret void");
        Ok(())
    }

    /// Opens the define, binds `self` and the parameters.
    fn add_function(&mut self, function: DeclId, variation: &[Ty]) -> DiagnosticResult<()> {
        let f = self.program.function(function);
        let kind = f.kind;
        let defining = f.defining_class;
        let params = f.parameters.clone();
        let ret = f.return_ty.clone();
        let symbol = types::mangle_function(self.program, function, Some(variation));

        let mut rendered: Vec<String> = Vec::new();
        if kind != FunctionKind::Unbound {
            let class = defining.ok_or_else(|| {
                Diagnostic::error("method without a defining class")
            })?;
            let receiver = Ty::Class {
                decl: class,
                args: variation.to_vec(),
            };
            let self_ty = self.map_ty(&receiver);
            let self_ident = LlvmIdentifier::new("%self", self_ty.clone(), false);
            rendered.push(self_ident.typed());
            *self
                .current_self
                .last_mut()
                .expect("no open function scope") = Some(self_ident);
        }
        for p in params {
            let v = self.program.variable(p);
            let declared = v.ty.clone().ok_or_else(|| {
                Diagnostic::error_at(&v.position, "parameter has no resolved type")
            })?;
            let name = v.identifier.name.trim_start_matches('$').to_string();
            let substituted = match defining {
                Some(class) => types::subst_ty(&declared, class, variation),
                None => declared,
            };
            let ir = self.map_ty(&substituted);
            // Parameters arrive already dereferenced.
            let ident = self.idents.local(&name, ir, false);
            rendered.push(ident.typed());
            self.bind_local(p, ident);
        }

        let ir_ret = match (kind, ret) {
            (FunctionKind::Initializer, _) | (_, None) => LlvmType::Void,
            (_, Some(t)) => {
                let substituted = match defining {
                    Some(class) => types::subst_ty(&t, class, variation),
                    None => t,
                };
                self.map_ty(&substituted)
            }
        };

        let ctx = self.contexts.active();
        ctx.raw(format!(
            "define {} @{}({}) {{",
            ir_ret,
            symbol,
            rendered.join(", ")
        ));
        ctx.label("entry");
        Ok(())
    }

    /// The `getNext` prelude: load the jump attribute and take an
    /// indirect branch to `startGenerator` or one of the resume labels.
    fn add_generator_jump_header(&mut self, function: DeclId) -> DiagnosticResult<()> {
        let class = self
            .program
            .function(function)
            .defining_class
            .ok_or_else(|| Diagnostic::error("generator body outside its iterator class"))?;
        let this = self
            .self_ident()
            .ok_or_else(|| Diagnostic::error("generator body without a receiver"))?;
        let addr = self.jump_pointer_addr(&this, class)?;
        let target = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = load i8*, i8** {}",
            target.name, addr.name
        ));

        let yield_count = self.program.function(function).yields.len();
        let mut labels = vec!["label %startGenerator".to_string()];
        for i in 0..yield_count {
            labels.push(format!("label %yield{}", i));
        }
        self.contexts.active().terminator(format!(
            "indirectbr i8* {}, [ {} ]",
            target.name,
            labels.join(", ")
        ));
        self.contexts.active().label("startGenerator");
        Ok(())
    }

    /// Stores `blockaddress(getNext, label)` into the iterator's jump
    /// attribute.
    pub(crate) fn set_generator_label(
        &mut self,
        class: DeclId,
        label: &str,
    ) -> DiagnosticResult<()> {
        let block = self.program.class(class).block;
        let mut get_next = None;
        for decl in &self.program.block(block).declarations {
            if let Declaration::Function(f) = self.program.decl(*decl) {
                if f.identifier.name == "getNext" {
                    get_next = Some(*decl);
                    break;
                }
            }
        }
        let get_next = get_next.ok_or_else(|| {
            Diagnostic::error("generator class without a getNext method")
        })?;
        let symbol = types::mangle_function(self.program, get_next, Some(&[]));

        let this = self
            .self_ident()
            .ok_or_else(|| Diagnostic::error("generator label outside a method"))?;
        let addr = self.jump_pointer_addr(&this, class)?;
        self.contexts.active().append(format!(
            "store i8* blockaddress(@{}, %{}), i8** {}",
            symbol, label, addr.name
        ));
        Ok(())
    }
}
