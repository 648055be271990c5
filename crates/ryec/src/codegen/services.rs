//! Value-level emission services: loads and stores, boxing, constants,
//! calls, checked casts and class tests, branches.

use crate::ast::{DeclId, Ty};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::types::{self, pointer, LlvmType};
use super::{CodeGen, LlvmIdentifier};

impl<'p> CodeGen<'p> {
    /// Materializes an operand: identifiers that point at their value
    /// are loaded into a fresh register.
    pub(crate) fn resolve_value(&mut self, ident: &LlvmIdentifier) -> LlvmIdentifier {
        if !ident.needs_deref {
            return ident.clone();
        }
        let tmp = self.idents.tmp(ident.ty.clone());
        self.contexts.active().append(format!(
            "{} = load {}, {}* {}",
            tmp.name, ident.ty, ident.ty, ident.name
        ));
        tmp
    }

    pub(crate) fn bitcast_to(
        &mut self,
        value: &LlvmIdentifier,
        target: &LlvmType,
    ) -> LlvmIdentifier {
        if value.ty == *target {
            return value.clone();
        }
        let tmp = self.idents.tmp(target.clone());
        self.contexts.active().append(format!(
            "{} = bitcast {} to {}",
            tmp.name,
            value.typed(),
            target
        ));
        tmp
    }

    /// Stores `source`'s resolved value into `target`'s address.
    pub(crate) fn assign(
        &mut self,
        target: &LlvmIdentifier,
        source: &LlvmIdentifier,
    ) -> DiagnosticResult<()> {
        if !target.needs_deref {
            return Err(Diagnostic::error(
                "assignment target has no storage location",
            ));
        }
        let value = self.resolve_value(source);
        let value = self.bitcast_to(&value, &target.ty);
        self.contexts.active().append(format!(
            "store {}, {}* {}",
            value.typed(),
            target.ty,
            target.name
        ));
        Ok(())
    }

    /// `ptrtoint`-on-null, the textual sizeof.
    fn sizeof_operand(struct_name: &str) -> String {
        format!(
            "ptrtoint (%{sn}* getelementptr (%{sn}, %{sn}* null, i32 1) to i64)",
            sn = struct_name
        )
    }

    pub(crate) fn descriptor_operand(&mut self, decl: DeclId, args: &[Ty]) -> String {
        let dty = types::descriptor_type(self.program, decl);
        let sym = types::descriptor_symbol(self.program, decl, args);
        format!("bitcast ({}* {} to i8**)", dty, sym)
    }

    pub(crate) fn store_descriptor(&mut self, object: &LlvmIdentifier, decl: DeclId, args: &[Ty]) {
        let addr = self.idents.tmp(pointer(pointer(pointer(LlvmType::Int8))));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 0",
            addr.name,
            strip_pointer(&object.ty),
            object.ty,
            object.name
        ));
        let descriptor = self.descriptor_operand(decl, args);
        self.contexts.active().append(format!(
            "store i8** {}, i8*** {}",
            descriptor, addr.name
        ));
    }

    /// Allocates a box of the class's layout, stores the payload at the
    /// boxed-payload offset, and returns the pointer.
    pub(crate) fn box_value(
        &mut self,
        value: &LlvmIdentifier,
        ty: &Ty,
    ) -> DiagnosticResult<LlvmIdentifier> {
        let ty = self.apply_variations(ty);
        let (decl, args) = match &ty {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => {
                return Err(Diagnostic::error("cannot box an abstract generic type"));
            }
        };
        let struct_name = self.ensure_struct(decl, &args);
        let boxed_ty = pointer(LlvmType::Named(struct_name.clone()));

        let raw = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = call i8* @rye_alloc(i64 {})",
            raw.name,
            Self::sizeof_operand(&struct_name)
        ));
        let object = self.bitcast_to(&raw, &boxed_ty);
        self.store_descriptor(&object, decl, &args);

        let payload = self.resolve_value(value);
        let slot = self.idents.tmp(pointer(payload.ty.clone()));
        self.contexts.active().append(format!(
            "{} = getelementptr %{}, {} {}, i32 0, i32 1",
            slot.name, struct_name, boxed_ty, object.name
        ));
        self.contexts.active().append(format!(
            "store {}, {}* {}",
            payload.typed(),
            payload.ty,
            slot.name
        ));
        Ok(object)
    }

    /// Interns a string constant and yields its data pointer.
    pub(crate) fn string_constant(&mut self, value: &str) -> LlvmIdentifier {
        let (global, len) = match self.string_constants.get(value) {
            Some(entry) => entry.clone(),
            None => {
                let global = self.idents.constant();
                let bytes = value.as_bytes();
                let len = bytes.len() + 1;
                self.contexts.constant().raw(format!(
                    "{} = private constant [{} x i8] c\"{}\\00\"",
                    global,
                    len,
                    escape_bytes(bytes)
                ));
                self.string_constants
                    .insert(value.to_string(), (global.clone(), len));
                (global, len)
            }
        };
        LlvmIdentifier::new(
            format!(
                "getelementptr inbounds ([{} x i8], [{} x i8]* {}, i64 0, i64 0)",
                len, len, global
            ),
            pointer(LlvmType::Int8),
            false,
        )
    }

    /// Reads the payload of a Bool, or passes a raw i1 through.
    pub(crate) fn unbox_bool(&mut self, cond: &LlvmIdentifier) -> LlvmIdentifier {
        let value = self.resolve_value(cond);
        if value.ty == LlvmType::Int1 {
            return value;
        }
        let slot = self.idents.tmp(pointer(LlvmType::Int1));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 1",
            slot.name,
            strip_pointer(&value.ty),
            value.ty,
            value.name
        ));
        let bit = self.idents.tmp(LlvmType::Int1);
        self.contexts.active().append(format!(
            "{} = load i1, i1* {}",
            bit.name, slot.name
        ));
        bit
    }

    /// Conditional branch on a (boxed) Bool.
    pub(crate) fn branch_on(
        &mut self,
        cond: &LlvmIdentifier,
        if_true: &str,
        if_false: &str,
    ) {
        let bit = self.unbox_bool(cond);
        self.contexts.active().terminator(format!(
            "br i1 {}, label %{}, label %{}",
            bit.name, if_true, if_false
        ));
    }

    /// Indexes into an object at an attribute slot, loading the value
    /// unless the location itself is wanted.
    pub(crate) fn access_member(
        &mut self,
        target: &LlvmIdentifier,
        index: u32,
        value_ty: LlvmType,
        deref: bool,
    ) -> LlvmIdentifier {
        let object = self.resolve_value(target);
        let addr = self.idents.tmp(pointer(value_ty.clone()));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 {}",
            addr.name,
            strip_pointer(&object.ty),
            object.ty,
            object.name,
            index
        ));
        if deref {
            let value = self.idents.tmp(value_ty.clone());
            self.contexts.active().append(format!(
                "{} = load {}, {}* {}",
                value.name, value_ty, value_ty, addr.name
            ));
            value
        } else {
            LlvmIdentifier::new(addr.name, value_ty, true)
        }
    }

    /// The address (as `i8**`) of a generator iterator's indirect-branch
    /// target, payload attribute 0.
    pub(crate) fn jump_pointer_addr(
        &mut self,
        this: &LlvmIdentifier,
        class: DeclId,
    ) -> DiagnosticResult<LlvmIdentifier> {
        let jump = self
            .program
            .class(class)
            .attributes
            .iter()
            .copied()
            .find(|a| self.program.variable(*a).identifier.name == "$jump")
            .ok_or_else(|| Diagnostic::error("generator iterator lacks its jump attribute"))?;
        let index = self
            .program
            .variable(jump)
            .attribute_index
            .unwrap_or_else(|| panic!("jump attribute has no index"));
        let object = self.resolve_value(this);
        let field_ty = {
            let object_struct = self.ensure_struct(self.core.object, &[]);
            pointer(LlvmType::Named(object_struct))
        };
        let addr = self.idents.tmp(pointer(field_ty.clone()));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 {}",
            addr.name,
            strip_pointer(&object.ty),
            object.ty,
            object.name,
            index
        ));
        let cast = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = bitcast {}* {} to i8**",
            cast.name, field_ty, addr.name
        ));
        Ok(cast)
    }

    /// Calls the class's allocation routine.
    pub(crate) fn call_constructor(&mut self, ty: &Ty) -> DiagnosticResult<LlvmIdentifier> {
        let ty = self.apply_variations(ty);
        let (decl, args) = match &ty {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => {
                return Err(Diagnostic::error("cannot construct an abstract generic type"));
            }
        };
        let struct_name = self.ensure_struct(decl, &args);
        let result = self.idents.tmp(pointer(LlvmType::Named(struct_name)));
        self.contexts.active().append(format!(
            "{} = call {} @{}()",
            result.name,
            result.ty,
            types::ctor_symbol(self.program, decl, &args)
        ));
        Ok(result)
    }

    /// A direct call by mangled symbol. Returns the result operand for
    /// value-returning callees.
    pub(crate) fn call_direct(
        &mut self,
        symbol: &str,
        ret: LlvmType,
        args: &[LlvmIdentifier],
    ) -> Option<LlvmIdentifier> {
        let rendered: Vec<String> = args.iter().map(|a| a.typed()).collect();
        if ret == LlvmType::Void {
            self.contexts.active().append(format!(
                "call void @{}({})",
                symbol,
                rendered.join(", ")
            ));
            None
        } else {
            let result = self.idents.tmp(ret.clone());
            self.contexts.active().append(format!(
                "{} = call {} @{}({})",
                result.name,
                ret,
                symbol,
                rendered.join(", ")
            ));
            Some(result)
        }
    }

    /// A virtual call through the receiver's dispatch table.
    pub(crate) fn call_virtual(
        &mut self,
        slot: u32,
        ret: LlvmType,
        args: &[LlvmIdentifier],
    ) -> Option<LlvmIdentifier> {
        let receiver = &args[0];
        let table_addr = self.idents.tmp(pointer(pointer(pointer(LlvmType::Int8))));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 0",
            table_addr.name,
            strip_pointer(&receiver.ty),
            receiver.ty,
            receiver.name
        ));
        let table = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = load i8**, i8*** {}",
            table.name, table_addr.name
        ));
        let slot_addr = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = getelementptr i8*, i8** {}, i64 {}",
            slot_addr.name,
            table.name,
            slot + 1
        ));
        let raw = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = load i8*, i8** {}",
            raw.name, slot_addr.name
        ));
        let fn_ty = LlvmType::Function {
            ret: Box::new(ret.clone()),
            params: args.iter().map(|a| a.ty.clone()).collect(),
        };
        let fn_ptr = self.idents.tmp(pointer(fn_ty.clone()));
        self.contexts.active().append(format!(
            "{} = bitcast i8* {} to {}*",
            fn_ptr.name, raw.name, fn_ty
        ));
        let rendered: Vec<String> = args.iter().map(|a| a.typed()).collect();
        if ret == LlvmType::Void {
            self.contexts.active().append(format!(
                "call void {}({})",
                fn_ptr.name,
                rendered.join(", ")
            ));
            None
        } else {
            let result = self.idents.tmp(ret.clone());
            self.contexts.active().append(format!(
                "{} = call {} {}({})",
                result.name,
                ret,
                fn_ptr.name,
                rendered.join(", ")
            ));
            Some(result)
        }
    }

    /// Walks the descriptor chain in a labelled loop; lands in `match`
    /// with the chain cursor equal to the target descriptor, in `miss`
    /// at the chain's end.
    fn emit_descriptor_walk(
        &mut self,
        object: &LlvmIdentifier,
        target_decl: DeclId,
        target_args: &[Ty],
        prefix: &str,
        match_label: &str,
        miss_label: &str,
    ) {
        let cursor = self.idents.local(
            &format!("{}.cur", prefix),
            pointer(pointer(LlvmType::Int8)),
            true,
        );
        self.contexts.active().append(format!(
            "{} = alloca i8**",
            cursor.name
        ));
        let d_addr = self.idents.tmp(pointer(pointer(pointer(LlvmType::Int8))));
        self.contexts.active().append(format!(
            "{} = getelementptr {}, {} {}, i32 0, i32 0",
            d_addr.name,
            strip_pointer(&object.ty),
            object.ty,
            object.name
        ));
        let start = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = load i8**, i8*** {}",
            start.name, d_addr.name
        ));
        self.contexts.active().append(format!(
            "store i8** {}, i8*** {}",
            start.name, cursor.name
        ));
        let loop_label = format!("{}.loop", prefix);
        let step_label = format!("{}.step", prefix);
        self.contexts.active().branch(&loop_label);

        self.contexts.active().label(loop_label.clone());
        let cur = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = load i8**, i8*** {}",
            cur.name, cursor.name
        ));
        let target = self.descriptor_operand(target_decl, target_args);
        let hit = self.idents.tmp(LlvmType::Int1);
        self.contexts.active().append(format!(
            "{} = icmp eq i8** {}, {}",
            hit.name, cur.name, target
        ));
        self.contexts.active().terminator(format!(
            "br i1 {}, label %{}, label %{}",
            hit.name, match_label, step_label
        ));

        self.contexts.active().label(step_label);
        let parent = self.idents.tmp(pointer(LlvmType::Int8));
        self.contexts.active().append(format!(
            "{} = load i8*, i8** {}",
            parent.name, cur.name
        ));
        let ended = self.idents.tmp(LlvmType::Int1);
        self.contexts.active().append(format!(
            "{} = icmp eq i8* {}, null",
            ended.name, parent.name
        ));
        let advance_label = format!("{}.advance", prefix);
        self.contexts.active().terminator(format!(
            "br i1 {}, label %{}, label %{}",
            ended.name, miss_label, advance_label
        ));

        self.contexts.active().label(advance_label);
        let next = self.idents.tmp(pointer(pointer(LlvmType::Int8)));
        self.contexts.active().append(format!(
            "{} = bitcast i8* {} to i8**",
            next.name, parent.name
        ));
        self.contexts.active().append(format!(
            "store i8** {}, i8*** {}",
            next.name, cursor.name
        ));
        self.contexts.active().branch(&loop_label);
    }

    /// A checked cast: aborts at runtime when the dynamic type does not
    /// reach the target along the descriptor chain, otherwise yields the
    /// object as a pointer of the target type.
    pub(crate) fn cast_class(
        &mut self,
        object: &LlvmIdentifier,
        target: &Ty,
        prefix: &str,
    ) -> DiagnosticResult<LlvmIdentifier> {
        let target = self.apply_variations(target);
        let (decl, args) = match &target {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => {
                return Err(Diagnostic::error("cannot cast to an abstract generic type"));
            }
        };
        let object = self.resolve_value(object);
        let match_label = format!("{}.success", prefix);
        let fail_label = format!("{}.fail", prefix);
        self.emit_descriptor_walk(&object, decl, &args, prefix, &match_label, &fail_label);

        self.contexts.active().label(fail_label);
        self.contexts
            .active()
            .append("call void @rye_cast_failed()");
        self.contexts.active().terminator("unreachable");

        self.contexts.active().label(match_label);
        let target_ir = self.map_ty(&target);
        Ok(self.bitcast_to(&object, &target_ir))
    }

    /// `x is T`: the descriptor-chain test as a raw i1.
    pub(crate) fn is_class(
        &mut self,
        object: &LlvmIdentifier,
        target: &Ty,
        prefix: &str,
    ) -> DiagnosticResult<LlvmIdentifier> {
        let target = self.apply_variations(target);
        let (target, target_args) = match &target {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => {
                return Err(Diagnostic::error("cannot test an abstract generic type"));
            }
        };
        let object = self.resolve_value(object);
        let result = self
            .idents
            .local(&format!("{}.res", prefix), LlvmType::Int1, true);
        self.contexts
            .active()
            .append(format!("{} = alloca i1", result.name));
        let yes_label = format!("{}.yes", prefix);
        let no_label = format!("{}.no", prefix);
        let end_label = format!("{}.end", prefix);
        self.emit_descriptor_walk(&object, target, &target_args, prefix, &yes_label, &no_label);

        self.contexts.active().label(yes_label);
        self.contexts
            .active()
            .append(format!("store i1 1, i1* {}", result.name));
        self.contexts.active().branch(&end_label);

        self.contexts.active().label(no_label);
        self.contexts
            .active()
            .append(format!("store i1 0, i1* {}", result.name));
        self.contexts.active().branch(&end_label);

        self.contexts.active().label(end_label);
        let value = self.idents.tmp(LlvmType::Int1);
        self.contexts.active().append(format!(
            "{} = load i1, i1* {}",
            value.name, result.name
        ));
        Ok(value)
    }

    /// Pops `count` operands pushed left-to-right back into source
    /// order.
    pub(crate) fn pop_arguments(&mut self, count: usize) -> Vec<LlvmIdentifier> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let arg = self
                .stack
                .pop()
                .unwrap_or_else(|| panic!("value stack underflow while collecting arguments"));
            args.push(arg);
        }
        args.reverse();
        args
    }
}

pub(crate) fn strip_pointer(ty: &LlvmType) -> LlvmType {
    match ty {
        LlvmType::Pointer(inner) => (**inner).clone(),
        other => other.clone(),
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{:02X}", b));
        }
    }
    out
}
