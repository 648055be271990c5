//! Declaration nodes: modules, classes, variables, functions.

use indexmap::IndexSet;

use super::{BlockId, DeclId, Identifier, Position, StmtId, Ty};

/// Member visibility. Defaults to `Package` inside classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Debug)]
pub enum Declaration {
    Module(ModuleDecl),
    Class(ClassDecl),
    Variable(VariableDecl),
    Function(FunctionDecl),
}

impl Declaration {
    pub fn identifier(&self) -> &Identifier {
        match self {
            Declaration::Module(d) => &d.identifier,
            Declaration::Class(d) => &d.identifier,
            Declaration::Variable(d) => &d.identifier,
            Declaration::Function(d) => &d.identifier,
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Declaration::Module(d) => &d.position,
            Declaration::Class(d) => &d.position,
            Declaration::Variable(d) => &d.position,
            Declaration::Function(d) => &d.position,
        }
    }

    pub fn set_access(&mut self, access: AccessModifier) {
        match self {
            Declaration::Module(d) => d.access = access,
            Declaration::Class(d) => d.access = access,
            Declaration::Variable(d) => d.access = access,
            Declaration::Function(d) => d.access = access,
        }
    }
}

/// One compiled source module. Native modules declare their bodies but
/// emit nothing; calls into them become external symbols.
#[derive(Debug)]
pub struct ModuleDecl {
    pub position: Position,
    pub identifier: Identifier,
    pub access: AccessModifier,
    pub imports: Vec<Identifier>,
    pub block: BlockId,
    pub native: bool,
}

#[derive(Debug)]
pub struct ClassDecl {
    pub position: Position,
    pub identifier: Identifier,
    pub access: AccessModifier,
    pub super_idents: Vec<Identifier>,
    /// Resolved superclass types, in declaration order. The first entry
    /// is the layout parent.
    pub superclasses: Vec<Ty>,
    pub block: BlockId,
    pub is_abstract: bool,
    /// Formal generic type parameters. Non-empty means the class itself
    /// emits no code — only its variations do.
    pub type_params: Vec<Identifier>,
    /// Monomorphic variations in discovery order. The set index is the
    /// variation id used by `Ty::Class { variation }`.
    pub variations: IndexSet<Vec<Ty>>,
    /// True for synthesized generator-iterator classes: the first payload
    /// attribute is the indirect-branch target of `getNext`.
    pub is_generator: bool,
    /// True for synthesized function-wrapper classes.
    pub is_function_wrapper: bool,
    /// Attributes in layout order, assigned by the resolver. Index 0 of
    /// every object is the class descriptor pointer, so the attribute at
    /// position `i` here lives at field `attribute_index` recorded on the
    /// variable itself.
    pub attributes: Vec<DeclId>,
    /// Dispatch table: the implementing method for each slot, inherited
    /// slots first.
    pub dispatch: Vec<DeclId>,
    pub default_initializer: Option<DeclId>,
    /// Module that declared this class.
    pub module: Option<DeclId>,
}

impl ClassDecl {
    pub fn new(position: Position, identifier: Identifier, block: BlockId) -> Self {
        ClassDecl {
            position,
            identifier,
            access: AccessModifier::Package,
            super_idents: Vec::new(),
            superclasses: Vec::new(),
            block,
            is_abstract: false,
            type_params: Vec::new(),
            variations: IndexSet::new(),
            is_generator: false,
            is_function_wrapper: false,
            attributes: Vec::new(),
            dispatch: Vec::new(),
            default_initializer: None,
            module: None,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Variable,
    Parameter,
    Attribute,
}

#[derive(Debug)]
pub struct VariableDecl {
    pub position: Position,
    pub identifier: Identifier,
    pub access: AccessModifier,
    pub type_ident: Identifier,
    /// Resolved declared type.
    pub ty: Option<Ty>,
    pub kind: VariableKind,
    pub is_global: bool,
    /// Field index inside the owning class, assigned by the resolver.
    /// Stable per class; starts at 1 because field 0 is the descriptor.
    pub attribute_index: Option<u32>,
    pub owner_class: Option<DeclId>,
    /// Enclosing function, when declared inside one.
    pub owner_function: Option<DeclId>,
    /// Synthesized declarations may infer their type from an expression
    /// instead of naming it; `type_ident` is `$infer` in that case.
    pub infer_from: Option<super::ExprId>,
}

impl VariableDecl {
    pub fn new(
        position: Position,
        identifier: Identifier,
        type_ident: Identifier,
        kind: VariableKind,
    ) -> Self {
        VariableDecl {
            position,
            identifier,
            access: AccessModifier::Package,
            type_ident,
            ty: None,
            kind,
            is_global: false,
            attribute_index: None,
            owner_class: None,
            owner_function: None,
            infer_from: None,
        }
    }

    /// A synthesized variable whose type the resolver infers from `expr`.
    pub fn inferred(
        position: Position,
        identifier: Identifier,
        kind: VariableKind,
        expr: super::ExprId,
    ) -> Self {
        let mut v = VariableDecl::new(position, identifier, Identifier::new("$infer"), kind);
        v.infer_from = Some(expr);
        v
    }

    pub fn is_attribute(&self) -> bool {
        self.kind == VariableKind::Attribute
    }

    pub fn is_parameter(&self) -> bool {
        self.kind == VariableKind::Parameter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Unbound,
    Method,
    Initializer,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub position: Position,
    pub identifier: Identifier,
    pub access: AccessModifier,
    pub parameters: Vec<DeclId>,
    pub body: BlockId,
    pub return_type_ident: Option<Identifier>,
    /// Resolved return type; `None` marks a procedure.
    pub return_ty: Option<Ty>,
    pub kind: FunctionKind,
    /// Abstract functions have an empty body and synthesize a default
    /// return.
    pub is_abstract: bool,
    pub is_default_initializer: bool,
    pub defining_class: Option<DeclId>,
    pub module: Option<DeclId>,
    /// Yield statements of a generator body, in source order. The vector
    /// index is the yield's resume-label ordinal.
    pub yields: Vec<StmtId>,
    /// Dispatch-table slot, assigned by the resolver for methods.
    pub vtable_slot: Option<u32>,
}

impl FunctionDecl {
    pub fn new(
        position: Position,
        identifier: Identifier,
        parameters: Vec<DeclId>,
        body: BlockId,
        kind: FunctionKind,
        return_type_ident: Option<Identifier>,
    ) -> Self {
        FunctionDecl {
            position,
            identifier,
            access: AccessModifier::Package,
            parameters,
            body,
            return_type_ident,
            return_ty: None,
            kind,
            is_abstract: false,
            is_default_initializer: false,
            defining_class: None,
            module: None,
            yields: Vec::new(),
            vtable_slot: None,
        }
    }

    /// Functions return a value; procedures and initializers do not.
    pub fn is_function(&self) -> bool {
        self.return_type_ident.is_some()
    }

    pub fn is_method(&self) -> bool {
        self.kind == FunctionKind::Method
    }

    pub fn is_initializer(&self) -> bool {
        self.kind == FunctionKind::Initializer
    }

    pub fn is_unbound(&self) -> bool {
        self.kind == FunctionKind::Unbound
    }

    pub fn is_generator(&self) -> bool {
        !self.yields.is_empty()
    }
}
