//! Semantic analysis: the resolver and type checker.
//!
//! Annotates the AST in place across four passes: owner links
//! (defining class/function, globals), declared-type and signature
//! resolution, class layouts (attribute indices and dispatch tables),
//! and body resolution (name binding, overload resolution by type
//! distance, expression typing). Generic-class variations are registered
//! whenever a fully concrete instantiation is seen and closed under
//! member-type substitution afterwards, so emission order is the stable
//! discovery order.

mod resolve;

use std::collections::{HashMap, HashSet};

use crate::ast::{
    BlockId, CoreClasses, DeclId, Declaration, FunctionKind, Identifier, Position, Program,
    StmtId, StmtKind, Ty, VariableKind,
};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

pub struct Analyzer<'a> {
    pub(crate) program: &'a mut Program,
    pub(crate) core: CoreClasses,
    pub(crate) classes_by_name: HashMap<String, DeclId>,
    /// Lexical scope stack used during body resolution.
    pub(crate) scopes: Vec<Scope>,
    pub(crate) current_class: Vec<DeclId>,
    pub(crate) current_function: Vec<DeclId>,
    pub(crate) loop_stack: Vec<StmtId>,
    /// Guards lazy type inference against cycles.
    pub(crate) inferring: HashSet<DeclId>,
}

#[derive(Default)]
pub(crate) struct Scope {
    pub vars: HashMap<String, DeclId>,
    pub fns: HashMap<String, Vec<DeclId>>,
}

/// Runs all passes and returns the core-class registry.
pub fn analyze(program: &mut Program) -> DiagnosticResult<CoreClasses> {
    let core = CoreClasses::find(program)?;
    let mut classes_by_name = HashMap::new();
    for (idx, decl) in program.decls.iter().enumerate() {
        if let Declaration::Class(c) = decl {
            let prev = classes_by_name.insert(c.identifier.name.clone(), DeclId(idx as u32));
            if prev.is_some() {
                return Err(Diagnostic::error_at(
                    &c.position,
                    format!("duplicate class `{}`", c.identifier.name),
                ));
            }
        }
    }

    let mut analyzer = Analyzer {
        program,
        core,
        classes_by_name,
        scopes: Vec::new(),
        current_class: Vec::new(),
        current_function: Vec::new(),
        loop_stack: Vec::new(),
        inferring: HashSet::new(),
    };
    analyzer.collect_owners()?;
    analyzer.resolve_signatures()?;
    analyzer.compute_layouts()?;
    analyzer.resolve_bodies()?;
    analyzer.close_variations()?;
    Ok(core)
}

impl<'a> Analyzer<'a> {
    // ----- pass 1: owner links and default initializers -----

    fn collect_owners(&mut self) -> DiagnosticResult<()> {
        for module in self.program.modules.clone() {
            let block = self.program.module(module).block;
            self.collect_block_owners(block, Some(module), None, None)?;
        }
        Ok(())
    }

    fn collect_block_owners(
        &mut self,
        block: BlockId,
        module: Option<DeclId>,
        class: Option<DeclId>,
        function: Option<DeclId>,
    ) -> DiagnosticResult<()> {
        for decl in self.program.block(block).declarations.clone() {
            match self.program.decl_mut(decl) {
                Declaration::Variable(v) => {
                    let is_attr = v.kind == VariableKind::Attribute;
                    v.owner_class = if is_attr { class } else { None };
                    v.owner_function = function;
                    if function.is_none() && class.is_none() {
                        v.is_global = true;
                    }
                }
                Declaration::Class(c) => {
                    c.module = module;
                }
                Declaration::Function(f) => {
                    f.defining_class = class;
                    f.module = module;
                }
                Declaration::Module(_) => {}
            }

            match self.program.decl(decl) {
                Declaration::Class(c) => {
                    let class_block = c.block;
                    self.collect_class_owners(decl, class_block, module)?;
                }
                Declaration::Function(f) => {
                    let body = f.body;
                    let params = f.parameters.clone();
                    for p in params {
                        self.program.variable_mut(p).owner_function = Some(decl);
                    }
                    self.collect_stmt_owners(body, module, class, Some(decl))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn collect_class_owners(
        &mut self,
        class: DeclId,
        class_block: BlockId,
        module: Option<DeclId>,
    ) -> DiagnosticResult<()> {
        self.collect_block_owners(class_block, module, Some(class), None)?;
        self.synthesize_default_initializer(class, class_block)?;
        Ok(())
    }

    /// The statement-holding blocks of a function body, walked without
    /// descending into nested declarations.
    fn collect_stmt_owners(
        &mut self,
        body: BlockId,
        module: Option<DeclId>,
        class: Option<DeclId>,
        function: Option<DeclId>,
    ) -> DiagnosticResult<()> {
        let mut worklist = vec![body];
        while let Some(block) = worklist.pop() {
            self.collect_block_owners(block, module, class, function)?;
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
                        error,
                        try_block,
                        handle_block,
                    } => {
                        let (error, try_block, handle_block) =
                            (*error, *try_block, *handle_block);
                        self.program.variable_mut(error).owner_function = function;
                        worklist.push(try_block);
                        worklist.push(handle_block);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Every class carries a zero-argument default initializer: the one
    /// it declares explicitly, or a synthesized one. The class block's
    /// attribute-initializer statements move into its body.
    fn synthesize_default_initializer(
        &mut self,
        class: DeclId,
        class_block: BlockId,
    ) -> DiagnosticResult<()> {
        let mut explicit = None;
        for decl in self.program.block(class_block).declarations.clone() {
            if let Declaration::Function(f) = self.program.decl(decl) {
                if f.is_initializer() && f.parameters.is_empty() && !f.is_default_initializer {
                    explicit = Some(decl);
                    break;
                }
            }
        }

        let attr_inits = std::mem::take(&mut self.program.block_mut(class_block).statements);

        let init = match explicit {
            Some(init) => {
                let body = self.program.function(init).body;
                let stmts = &mut self.program.block_mut(body).statements;
                for (i, s) in attr_inits.into_iter().enumerate() {
                    stmts.insert(i, s);
                }
                init
            }
            None => {
                let pos = Position::none();
                let mut body = crate::ast::Block::new(pos.clone());
                body.statements = attr_inits;
                let ret = self
                    .program
                    .add_stmt(crate::ast::Statement::new(pos.clone(), StmtKind::Return {
                        value: None,
                    }));
                body.statements.push(ret);
                let body = self.program.add_block(body);
                let mut f = crate::ast::FunctionDecl::new(
                    pos,
                    Identifier::new("initializer"),
                    Vec::new(),
                    body,
                    FunctionKind::Initializer,
                    None,
                );
                f.defining_class = Some(class);
                f.module = self.program.class(class).module;
                let id = self.program.add_decl(Declaration::Function(f));
                self.program.block_mut(class_block).declarations.push(id);
                id
            }
        };
        self.program.function_mut(init).is_default_initializer = true;
        self.program.class_mut(class).default_initializer = Some(init);
        Ok(())
    }

    // ----- pass 2: declared types and signatures -----

    fn resolve_signatures(&mut self) -> DiagnosticResult<()> {
        for module in self.program.modules.clone() {
            let block = self.program.module(module).block;
            self.signatures_in_block(block)?;
        }
        Ok(())
    }

    fn signatures_in_block(&mut self, block: BlockId) -> DiagnosticResult<()> {
        for decl in self.program.block(block).declarations.clone() {
            match self.program.decl(decl) {
                Declaration::Class(c) => {
                    let class_block = c.block;
                    let super_idents = c.super_idents.clone();
                    self.current_class.push(decl);
                    let mut supers = Vec::with_capacity(super_idents.len());
                    for ident in &super_idents {
                        supers.push(self.resolve_type(ident, &Position::none())?);
                    }
                    if supers.is_empty() && decl != self.core.object {
                        supers.push(Ty::Class {
                            decl: self.core.object,
                            args: Vec::new(),
                        });
                    }
                    self.program.class_mut(decl).superclasses = supers;
                    self.signatures_in_block(class_block)?;
                    self.current_class.pop();
                }
                Declaration::Function(f) => {
                    let params = f.parameters.clone();
                    let rt = f.return_type_ident.clone();
                    let body = f.body;
                    let pos = f.position.clone();
                    for p in params {
                        self.resolve_variable_type(p)?;
                    }
                    if let Some(rt) = rt {
                        if rt.name != "$infer" {
                            let ty = self.resolve_type(&rt, &pos)?;
                            self.program.function_mut(decl).return_ty = Some(ty);
                        }
                    }
                    self.signatures_in_stmt_blocks(body)?;
                }
                Declaration::Variable(_) => {
                    self.resolve_variable_type(decl)?;
                }
                Declaration::Module(_) => {}
            }
        }
        Ok(())
    }

    fn signatures_in_stmt_blocks(&mut self, body: BlockId) -> DiagnosticResult<()> {
        let mut worklist = vec![body];
        while let Some(block) = worklist.pop() {
            self.signatures_in_block(block)?;
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
                        error,
                        try_block,
                        handle_block,
                    } => {
                        let (error, try_block, handle_block) =
                            (*error, *try_block, *handle_block);
                        self.resolve_variable_type(error)?;
                        worklist.push(try_block);
                        worklist.push(handle_block);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Resolves a variable's declared type unless it is inferred; the
    /// inferred ones resolve lazily during body resolution.
    pub(crate) fn resolve_variable_type(&mut self, decl: DeclId) -> DiagnosticResult<()> {
        let (ident, pos, inferred) = {
            let v = self.program.variable(decl);
            (v.type_ident.clone(), v.position.clone(), v.infer_from.is_some())
        };
        if inferred || ident.name == "$infer" {
            return Ok(());
        }
        let ty = self.resolve_type(&ident, &pos)?;
        self.program.variable_mut(decl).ty = Some(ty);
        Ok(())
    }

    // ----- type resolution -----

    /// Resolves a type identifier against the enclosing generic
    /// parameters and the global class table, registering a variation
    /// when the instantiation is fully concrete.
    pub(crate) fn resolve_type(
        &mut self,
        ident: &Identifier,
        pos: &Position,
    ) -> DiagnosticResult<Ty> {
        if ident.args.is_empty() {
            for class in self.current_class.clone().into_iter().rev() {
                let params = &self.program.class(class).type_params;
                if let Some(index) = params.iter().position(|p| p.name == ident.name) {
                    return Ok(Ty::Generic {
                        owner: class,
                        index: index as u32,
                    });
                }
            }
        }

        let decl = *self.classes_by_name.get(&ident.name).ok_or_else(|| {
            Diagnostic::error_at(pos, format!("undeclared type `{}`", ident))
        })?;

        let mut args = Vec::with_capacity(ident.args.len());
        for a in &ident.args {
            args.push(self.resolve_type(a, pos)?);
        }
        let expected = self.program.class(decl).type_params.len();
        if args.len() != expected {
            return Err(Diagnostic::error_at(
                pos,
                format!(
                    "`{}` expects {} generic arguments, got {}",
                    ident.name,
                    expected,
                    args.len()
                ),
            ));
        }
        Ok(self.make_class_ty(decl, args))
    }

    /// Builds a class type, registering the variation when every
    /// argument is concrete.
    pub(crate) fn make_class_ty(&mut self, decl: DeclId, args: Vec<Ty>) -> Ty {
        if !args.is_empty() && args.iter().all(ty_is_concrete) {
            self.program.class_mut(decl).variations.insert(args.clone());
        }
        Ty::Class { decl, args }
    }

    /// Substitutes `owner`'s formal generics with `args` throughout `ty`.
    pub(crate) fn subst(&mut self, ty: &Ty, owner: DeclId, args: &[Ty]) -> Ty {
        match ty {
            Ty::Generic { owner: o, index } if *o == owner => args[*index as usize].clone(),
            Ty::Generic { .. } => ty.clone(),
            Ty::Class { decl, args: inner } => {
                let substituted: Vec<Ty> =
                    inner.iter().map(|t| self.subst(t, owner, args)).collect();
                self.make_class_ty(*decl, substituted)
            }
        }
    }

    /// The generic arguments `receiver` supplies for `owner`, walking up
    /// the (substituted) superclass chain when the member is inherited.
    pub(crate) fn variation_args_for(&mut self, receiver: &Ty, owner: DeclId) -> Option<Vec<Ty>> {
        let (decl, args) = match receiver {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => return None,
        };
        if decl == owner {
            return Some(args);
        }
        let supers = self.program.class(decl).superclasses.clone();
        for sup in supers {
            let substituted = self.subst(&sup, decl, &args);
            if let Some(found) = self.variation_args_for(&substituted, owner) {
                return Some(found);
            }
        }
        None
    }

    /// Substitutes a member's declared type into the receiver's context.
    pub(crate) fn subst_for_receiver(&mut self, ty: &Ty, receiver: &Ty) -> Ty {
        match ty {
            Ty::Generic { owner, .. } => {
                let owner = *owner;
                match self.variation_args_for(receiver, owner) {
                    Some(args) => self.subst(ty, owner, &args),
                    None => ty.clone(),
                }
            }
            Ty::Class { decl, args } => {
                let decl = *decl;
                let substituted: Vec<Ty> = args
                    .iter()
                    .map(|t| self.subst_for_receiver(t, receiver))
                    .collect();
                self.make_class_ty(decl, substituted)
            }
        }
    }

    // ----- type distance -----

    /// The inheritance distance from `actual` up to `formal`: 0 on an
    /// exact match, otherwise the minimum hop count along the superclass
    /// graph, otherwise `u32::MAX`.
    pub(crate) fn ty_distance(&mut self, formal: &Ty, actual: &Ty) -> u32 {
        if formal == actual {
            return 0;
        }
        let (decl, args) = match actual {
            Ty::Class { decl, args } => (*decl, args.clone()),
            Ty::Generic { .. } => return u32::MAX,
        };
        let supers = self.program.class(decl).superclasses.clone();
        let mut best = u32::MAX;
        for sup in supers {
            let substituted = self.subst(&sup, decl, &args);
            let d = self.ty_distance(formal, &substituted);
            if d < best {
                best = d;
            }
        }
        best.saturating_add(1)
    }

    // ----- pass 3: layouts and dispatch tables -----

    fn compute_layouts(&mut self) -> DiagnosticResult<()> {
        let classes: Vec<DeclId> = (0..self.program.decls.len() as u32)
            .map(DeclId)
            .filter(|d| matches!(self.program.decl(*d), Declaration::Class(_)))
            .collect();
        let mut done: HashSet<DeclId> = HashSet::new();
        for class in classes {
            self.layout_class(class, &mut done)?;
        }
        Ok(())
    }

    fn layout_class(&mut self, class: DeclId, done: &mut HashSet<DeclId>) -> DiagnosticResult<()> {
        if done.contains(&class) {
            return Ok(());
        }
        done.insert(class);

        // The layout prefix comes from the first superclass.
        let first_super = self
            .program
            .class(class)
            .superclasses
            .first()
            .and_then(|t| t.decl());
        let (mut attributes, mut dispatch) = match first_super {
            Some(sup) => {
                self.layout_class(sup, done)?;
                let s = self.program.class(sup);
                (s.attributes.clone(), s.dispatch.clone())
            }
            None => (Vec::new(), Vec::new()),
        };

        let block = self.program.class(class).block;
        for decl in self.program.block(block).declarations.clone() {
            match self.program.decl(decl) {
                Declaration::Variable(v) if v.is_attribute() => {
                    let index = attributes.len() as u32 + 1;
                    attributes.push(decl);
                    self.program.variable_mut(decl).attribute_index = Some(index);
                }
                Declaration::Function(f) if f.is_method() => {
                    let sig_name = f.identifier.name.clone();
                    let sig_params: Vec<Identifier> = f
                        .parameters
                        .iter()
                        .map(|p| self.program.variable(*p).type_ident.clone())
                        .collect();
                    let slot = dispatch.iter().position(|other| {
                        let o = self.program.function(*other);
                        o.identifier.name == sig_name
                            && o.parameters.len() == sig_params.len()
                            && o.parameters.iter().zip(&sig_params).all(|(p, ty)| {
                                self.program.variable(*p).type_ident == *ty
                            })
                    });
                    let slot = match slot {
                        Some(s) => {
                            dispatch[s] = decl;
                            s
                        }
                        None => {
                            dispatch.push(decl);
                            dispatch.len() - 1
                        }
                    };
                    self.program.function_mut(decl).vtable_slot = Some(slot as u32);
                }
                _ => {}
            }
        }

        let c = self.program.class_mut(class);
        c.attributes = attributes;
        c.dispatch = dispatch;
        Ok(())
    }

    // ----- variation closure -----

    /// Registers every variation reachable through member types of the
    /// already-registered variations, so emission never meets an
    /// unregistered concrete instantiation.
    fn close_variations(&mut self) -> DiagnosticResult<()> {
        loop {
            let mut changed = false;
            let classes: Vec<DeclId> = (0..self.program.decls.len() as u32)
                .map(DeclId)
                .filter(|d| matches!(self.program.decl(*d), Declaration::Class(_)))
                .collect();
            for class in classes {
                let count = self.program.class(class).variations.len();
                for i in 0..count {
                    let args = self.program.class(class).variations[i].clone();
                    changed |= self.close_one_variation(class, &args)?;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn close_one_variation(&mut self, class: DeclId, args: &[Ty]) -> DiagnosticResult<bool> {
        let mut member_tys: Vec<Ty> = Vec::new();
        for sup in self.program.class(class).superclasses.clone() {
            member_tys.push(sup);
        }
        // Expression types inside the class's bodies can instantiate
        // other generic classes through the formal parameters; walking
        // every expression over-approximates but registers them all.
        for expr in &self.program.exprs {
            if let Some(ty) = &expr.ty {
                if ty_mentions_generic_of(ty, class) {
                    member_tys.push(ty.clone());
                }
            }
        }
        for attr in self.program.class(class).attributes.clone() {
            if let Some(ty) = self.program.variable(attr).ty.clone() {
                member_tys.push(ty);
            }
        }
        for decl in self
            .program
            .block(self.program.class(class).block)
            .declarations
            .clone()
        {
            if let Declaration::Function(f) = self.program.decl(decl) {
                let mut tys: Vec<Ty> = f.return_ty.clone().into_iter().collect();
                for p in &f.parameters {
                    if let Some(ty) = self.program.variable(*p).ty.clone() {
                        tys.push(ty);
                    }
                }
                member_tys.extend(tys);
            }
        }

        let mut changed = false;
        for ty in member_tys {
            let before = self.variation_count();
            let _ = self.subst(&ty, class, args);
            if self.variation_count() != before {
                changed = true;
            }
        }
        Ok(changed)
    }

    fn variation_count(&self) -> usize {
        self.program
            .decls
            .iter()
            .map(|d| match d {
                Declaration::Class(c) => c.variations.len(),
                _ => 0,
            })
            .sum()
    }
}

pub(crate) fn ty_is_concrete(ty: &Ty) -> bool {
    match ty {
        Ty::Class { args, .. } => args.iter().all(ty_is_concrete),
        Ty::Generic { .. } => false,
    }
}

fn ty_mentions_generic_of(ty: &Ty, class: DeclId) -> bool {
    match ty {
        Ty::Generic { owner, .. } => *owner == class,
        Ty::Class { args, .. } => args.iter().any(|a| ty_mentions_generic_of(a, class)),
    }
}
