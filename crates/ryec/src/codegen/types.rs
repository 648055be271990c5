//! The IR type model and name mangling.
//!
//! `mangle_*` are pure functions of the annotated program: symbols are
//! deterministic from the fully-qualified name, the parameter types, and
//! the owning class variation, and therefore stable under
//! recompilation.

use std::fmt;

use crate::ast::{DeclId, Program, Ty};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlvmType {
    Void,
    Int1,
    Int8,
    Int32,
    Int64,
    Double,
    Pointer(Box<LlvmType>),
    /// A named struct, rendered `%name`.
    Named(String),
    Array(u64, Box<LlvmType>),
    Function {
        ret: Box<LlvmType>,
        params: Vec<LlvmType>,
    },
}

pub fn pointer(ty: LlvmType) -> LlvmType {
    LlvmType::Pointer(Box::new(ty))
}

impl fmt::Display for LlvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlvmType::Void => write!(f, "void"),
            LlvmType::Int1 => write!(f, "i1"),
            LlvmType::Int8 => write!(f, "i8"),
            LlvmType::Int32 => write!(f, "i32"),
            LlvmType::Int64 => write!(f, "i64"),
            LlvmType::Double => write!(f, "double"),
            LlvmType::Pointer(t) => write!(f, "{}*", t),
            LlvmType::Named(name) => write!(f, "%{}", name),
            LlvmType::Array(n, t) => write!(f, "[{} x {}]", n, t),
            LlvmType::Function { ret, params } => {
                write!(f, "{} (", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Substitutes `owner`'s formal generics with `args` throughout `ty`
/// without registering anything; emission never meets an instantiation
/// the resolver has not already registered.
pub fn subst_ty(ty: &Ty, owner: DeclId, args: &[Ty]) -> Ty {
    match ty {
        Ty::Generic { owner: o, index } if *o == owner => args[*index as usize].clone(),
        Ty::Generic { .. } => ty.clone(),
        Ty::Class { decl, args: inner } => Ty::Class {
            decl: *decl,
            args: inner.iter().map(|t| subst_ty(t, owner, args)).collect(),
        },
    }
}

/// The generic arguments `receiver` supplies for `owner`, walking up the
/// substituted superclass chain.
pub fn variation_args_for(program: &Program, receiver: &Ty, owner: DeclId) -> Option<Vec<Ty>> {
    let (decl, args) = match receiver {
        Ty::Class { decl, args } => (*decl, args.clone()),
        Ty::Generic { .. } => return None,
    };
    if decl == owner {
        return Some(args);
    }
    for sup in &program.class(decl).superclasses {
        let substituted = subst_ty(sup, decl, &args);
        if let Some(found) = variation_args_for(program, &substituted, owner) {
            return Some(found);
        }
    }
    None
}

/// `Int`, `Box$Int`, `Box$Array$Int`.
pub fn mangle_class(program: &Program, decl: DeclId, args: &[Ty]) -> String {
    let mut name = program.class(decl).identifier.name.clone();
    for arg in args {
        name.push('$');
        name.push_str(&mangle_ty(program, arg));
    }
    name
}

pub fn mangle_ty(program: &Program, ty: &Ty) -> String {
    match ty {
        Ty::Class { decl, args } => mangle_class(program, *decl, args),
        // Template symbols are never emitted; a formal parameter can only
        // show up in a mangled name through an internal error.
        Ty::Generic { owner, index } => format!(
            "{}${}",
            program.class(*owner).identifier.name,
            index
        ),
    }
}

pub fn mangle_ty_opt(program: &Program, ty: Option<&Ty>) -> String {
    match ty {
        Some(t) => mangle_ty(program, t),
        None => "Void".to_string(),
    }
}

fn module_name(program: &Program, module: Option<DeclId>) -> String {
    match module {
        Some(m) => program.module(m).identifier.name.clone(),
        None => "main".to_string(),
    }
}

/// `<module>.<Class[$Args]>.<name>[.<param>...]` — the owning class part
/// carries the variation, so each monomorphization gets its own symbol.
pub fn mangle_function(program: &Program, decl: DeclId, variation: Option<&[Ty]>) -> String {
    let f = program.function(decl);
    let mut name = module_name(program, f.module);
    name.push('.');
    if let Some(class) = f.defining_class {
        let args = variation.unwrap_or(&[]);
        name.push_str(&mangle_class(program, class, args));
        name.push('.');
    }
    name.push_str(&f.identifier.name);
    for p in &f.parameters {
        let declared = program.variable(*p).ty.clone();
        let substituted = match (&declared, f.defining_class, variation) {
            (Some(ty), Some(class), Some(args)) => Some(subst_ty(ty, class, args)),
            _ => declared,
        };
        name.push('.');
        name.push_str(&mangle_ty_opt(program, substituted.as_ref()));
    }
    name
}

/// `<module>.<name>` for globals; locals keep their source name and are
/// uniquified by the identifier factory.
pub fn mangle_variable(program: &Program, decl: DeclId) -> String {
    let v = program.variable(decl);
    if v.is_global {
        let module = v
            .owner_function
            .and_then(|f| program.function(f).module)
            .or_else(|| {
                // Module-level variables hang off no function; find the
                // module through the program's module blocks.
                program.modules.iter().copied().find(|m| {
                    program
                        .block(program.module(*m).block)
                        .declarations
                        .contains(&decl)
                })
            });
        format!("{}.{}", module_name(program, module), v.identifier.name)
    } else {
        v.identifier.name.clone()
    }
}

/// The allocation routine of a class variation.
pub fn ctor_symbol(program: &Program, decl: DeclId, args: &[Ty]) -> String {
    format!("{}.$ctor", mangle_class(program, decl, args))
}

/// The descriptor global of a class variation.
pub fn descriptor_symbol(program: &Program, decl: DeclId, args: &[Ty]) -> String {
    format!("@{}.vtable", mangle_class(program, decl, args))
}

/// The descriptor's IR type: one slot for the superclass link plus one
/// per dispatch entry.
pub fn descriptor_type(program: &Program, decl: DeclId) -> LlvmType {
    let slots = program.class(decl).dispatch.len() as u64 + 1;
    LlvmType::Array(slots, Box::new(pointer(LlvmType::Int8)))
}
