//! The core-class registry.
//!
//! Built-in classes are looked up once by name when the core modules have
//! been built, and from then on recognized by declaration identity, not
//! by name. Boxing and the special-case initializer rule both key off
//! this registry.

use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::{DeclId, Declaration, Program};

#[derive(Debug, Clone, Copy)]
pub struct CoreClasses {
    pub object: DeclId,
    pub int: DeclId,
    pub float: DeclId,
    pub boolean: DeclId,
    pub char_class: DeclId,
    pub string: DeclId,
    pub array: DeclId,
    pub void: DeclId,
    pub maybe: DeclId,
    pub just: DeclId,
    pub nothing: DeclId,
    pub iterator: DeclId,
    pub range: DeclId,
}

impl CoreClasses {
    /// Resolves the registry against the program. Every core class must
    /// exist in one of the compiled modules (normally the synthesized
    /// core/std modules prepended by the driver).
    pub fn find(program: &Program) -> DiagnosticResult<CoreClasses> {
        let lookup = |name: &str| -> DiagnosticResult<DeclId> {
            for (idx, decl) in program.decls.iter().enumerate() {
                if let Declaration::Class(c) = decl {
                    if c.identifier.name == name {
                        return Ok(DeclId(idx as u32));
                    }
                }
            }
            Err(Diagnostic::error(format!("core class `{}` is missing", name)))
        };
        Ok(CoreClasses {
            object: lookup("Object")?,
            int: lookup("Int")?,
            float: lookup("Float")?,
            boolean: lookup("Bool")?,
            char_class: lookup("Char")?,
            string: lookup("String")?,
            array: lookup("Array")?,
            void: lookup("Void")?,
            maybe: lookup("Maybe")?,
            just: lookup("Just")?,
            nothing: lookup("Nothing")?,
            iterator: lookup("Iterator")?,
            range: lookup("Range")?,
        })
    }

    /// The boxed core classes whose initializers are an identity on their
    /// already-boxed argument: Int, Float, Bool, Char, String, Array.
    pub fn is_treated_special(&self, decl: DeclId) -> bool {
        decl == self.int
            || decl == self.float
            || decl == self.boolean
            || decl == self.char_class
            || decl == self.string
            || decl == self.array
    }
}
