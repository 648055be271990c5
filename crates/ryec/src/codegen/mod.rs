//! IR code generation.
//!
//! `CodeGen` owns the emission contexts, the scoped identifier factory,
//! the evaluation value stack, and the side tables (current variation,
//! loop labels, raise handlers). The walk happens in `decls`/`stmts`/
//! `exprs`; `services` holds the value-level building blocks (boxing,
//! calls, casts, branches).

pub mod context;
pub mod ident;
mod decls;
mod exprs;
mod services;
mod stmts;
pub mod types;

use std::collections::{HashMap, HashSet};

use crate::ast::{CoreClasses, DeclId, Program, StmtId, Ty};
use crate::diagnostics::DiagnosticResult;

pub use self::context::{CodeContext, ContextUtils};
pub use self::ident::{LlvmIdentifier, LlvmIdentifierFactory};
pub use self::types::LlvmType;

pub(crate) struct Handler {
    pub label: String,
    pub slot: LlvmIdentifier,
}

pub struct CodeGen<'p> {
    pub program: &'p Program,
    pub core: CoreClasses,
    pub contexts: ContextUtils,
    pub idents: LlvmIdentifierFactory,
    /// The evaluation value stack: every expression visit pushes exactly
    /// one operand; statements consume them and leave the stack empty.
    pub stack: Vec<LlvmIdentifier>,
    /// Per-function-locals, keyed by declaration; one frame per open
    /// function emission.
    pub(crate) locals: Vec<HashMap<DeclId, LlvmIdentifier>>,
    pub(crate) current_self: Vec<Option<LlvmIdentifier>>,
    pub(crate) current_function: Vec<DeclId>,
    /// The monomorphization side channel: innermost entry wins when the
    /// IR type mapping meets an abstract generic type.
    pub(crate) variation_stack: Vec<(DeclId, Vec<Ty>)>,
    pub(crate) label_counters: Vec<HashMap<String, u32>>,
    pub(crate) loop_labels: HashMap<StmtId, String>,
    pub(crate) handler_stack: Vec<Handler>,
    defined_structs: HashSet<String>,
    pub(crate) declared_symbols: HashSet<String>,
    pub(crate) string_constants: HashMap<String, (String, usize)>,
}

/// Compiles the whole annotated program into one textual IR document.
pub fn generate(program: &Program, core: CoreClasses) -> DiagnosticResult<String> {
    let mut cg = CodeGen {
        program,
        core,
        contexts: ContextUtils::new(),
        idents: LlvmIdentifierFactory::new(),
        stack: Vec::new(),
        locals: Vec::new(),
        current_self: Vec::new(),
        current_function: Vec::new(),
        variation_stack: Vec::new(),
        label_counters: Vec::new(),
        loop_labels: HashMap::new(),
        handler_stack: Vec::new(),
        defined_structs: HashSet::new(),
        declared_symbols: HashSet::new(),
        string_constants: HashMap::new(),
    };
    cg.declare_runtime();

    cg.open_function_scope();
    cg.add_main();
    for module in &program.modules {
        let block = program.module(*module).block;
        cg.visit_block(block)?;
    }
    cg.return_main();
    cg.close_function_scope();

    debug_assert_eq!(cg.idents.open_scopes(), 0);
    debug_assert_eq!(cg.contexts.open_contexts(), 0);
    Ok(cg.contexts.write_ir())
}

impl<'p> CodeGen<'p> {
    // ----- function emission scopes -----

    /// Opens an emission context together with an identifier scope; the
    /// two stay balanced or emission aborts.
    pub(crate) fn open_function_scope(&mut self) {
        self.contexts.add_new_context();
        self.idents.open_scope();
        self.locals.push(HashMap::new());
        self.current_self.push(None);
        self.label_counters.push(HashMap::new());
    }

    pub(crate) fn close_function_scope(&mut self) {
        self.contexts.close_context();
        self.idents.close_scope();
        if self.locals.pop().is_none()
            || self.current_self.pop().is_none()
            || self.label_counters.pop().is_none()
        {
            panic!("function emission scopes are imbalanced");
        }
    }

    pub(crate) fn self_ident(&self) -> Option<LlvmIdentifier> {
        self.current_self.last().cloned().flatten()
    }

    pub(crate) fn lookup_local(&self, decl: DeclId) -> Option<LlvmIdentifier> {
        self.locals.last().and_then(|frame| frame.get(&decl).cloned())
    }

    pub(crate) fn bind_local(&mut self, decl: DeclId, ident: LlvmIdentifier) {
        match self.locals.last_mut() {
            Some(frame) => {
                frame.insert(decl, ident);
            }
            None => panic!("local binding outside a function scope"),
        }
    }

    /// A fresh label prefix, unique within the current function.
    pub(crate) fn create_label_prefix(&mut self, base: &str) -> String {
        let counters = match self.label_counters.last_mut() {
            Some(c) => c,
            None => panic!("label requested outside a function scope"),
        };
        let n = counters.entry(base.to_string()).or_insert(0);
        let prefix = format!("{}{}", base, n);
        *n += 1;
        prefix
    }

    // ----- IR type mapping -----

    /// Maps a resolved type to its IR type: classes become pointers to
    /// their boxed layout, `Void` becomes the IR void. Abstract generic
    /// types resolve through the current variation.
    pub(crate) fn map_ty(&mut self, ty: &Ty) -> LlvmType {
        let ty = self.apply_variations(ty);
        match &ty {
            Ty::Generic { owner, .. } => panic!(
                "abstract generic type of `{}` escaped monomorphization",
                self.program.class(*owner).identifier
            ),
            Ty::Class { decl, args } => {
                if *decl == self.core.void {
                    return LlvmType::Void;
                }
                let name = self.ensure_struct(*decl, args);
                types::pointer(LlvmType::Named(name))
            }
        }
    }

    /// Substitutes abstract generic types through the variation stack,
    /// innermost variation first.
    pub(crate) fn apply_variations(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Generic { owner, .. } => {
                for (class, args) in self.variation_stack.iter().rev() {
                    if class == owner {
                        let substituted = types::subst_ty(ty, *class, args);
                        return self.apply_variations(&substituted);
                    }
                }
                ty.clone()
            }
            Ty::Class { decl, args } => Ty::Class {
                decl: *decl,
                args: args.iter().map(|a| self.apply_variations(a)).collect(),
            },
        }
    }

    /// The unboxed payload of the boxed core primitives.
    pub(crate) fn payload_type(&self, decl: DeclId) -> Option<LlvmType> {
        if decl == self.core.int {
            Some(LlvmType::Int64)
        } else if decl == self.core.float {
            Some(LlvmType::Double)
        } else if decl == self.core.boolean {
            Some(LlvmType::Int1)
        } else if decl == self.core.char_class {
            Some(LlvmType::Int8)
        } else if decl == self.core.string {
            Some(types::pointer(LlvmType::Int8))
        } else {
            None
        }
    }

    /// Emits the named struct definition for a class variation on first
    /// use and returns the struct name. Field 0 is the descriptor
    /// pointer; boxed primitives keep their payload at field 1; arrays
    /// carry a length and a trailing element run.
    pub(crate) fn ensure_struct(&mut self, decl: DeclId, args: &[Ty]) -> String {
        let name = format!("class.{}", types::mangle_class(self.program, decl, args));
        if self.defined_structs.contains(&name) {
            return name;
        }
        self.defined_structs.insert(name.clone());

        let descriptor = types::pointer(types::pointer(LlvmType::Int8));
        let mut fields = vec![descriptor];
        if let Some(payload) = self.payload_type(decl) {
            fields.push(payload);
        } else if decl == self.core.array {
            let elem = args
                .first()
                .cloned()
                .unwrap_or(Ty::class(self.core.object));
            let elem = self.map_array_elem(&elem);
            fields.push(LlvmType::Int64);
            fields.push(LlvmType::Array(0, Box::new(elem)));
        } else {
            let emitted = Ty::Class {
                decl,
                args: args.to_vec(),
            };
            for attr in self.program.class(decl).attributes.clone() {
                let v = self.program.variable(attr);
                let owner = v.owner_class.unwrap_or(decl);
                let declared = match &v.ty {
                    Some(t) => t.clone(),
                    None => panic!(
                        "attribute `{}` has no resolved type",
                        v.identifier
                    ),
                };
                let substituted =
                    match types::variation_args_for(self.program, &emitted, owner) {
                        Some(owner_args) => types::subst_ty(&declared, owner, &owner_args),
                        None => declared,
                    };
                fields.push(self.map_ty(&substituted));
            }
        }

        let rendered: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        self.contexts
            .declarations()
            .raw(format!("%{} = type {{ {} }}", name, rendered.join(", ")));
        name
    }

    fn map_array_elem(&mut self, elem: &Ty) -> LlvmType {
        self.map_ty(elem)
    }

    // ----- runtime surface -----

    /// The fixed externally-linked runtime symbols the generated code
    /// may reference.
    fn declare_runtime(&mut self) {
        let decls = self.contexts.declarations();
        decls.raw("declare i8* @rye_alloc(i64)");
        decls.raw("declare void @rye_raise(i8*)");
        decls.raw("declare void @rye_cast_failed()");
    }
}
