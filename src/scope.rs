//! Scoped name resolution.

use std::{cell::RefCell, collections::HashMap};

use typed_arena::Arena;

use crate::{
    error::{SymbolError, SymbolKind},
    glsl_type::GlslType,
    ir::{FunctionRef, VarRef},
};

/// Interface block namespaces; one identifier may name a block in each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    Uniform,
    Buffer,
    In,
    Out,
}
impl InterfaceKind {
    const fn slot(self) -> usize {
        match self {
            Self::Uniform => 0,
            Self::Buffer => 1,
            Self::In => 2,
            Self::Out => 3,
        }
    }
}

/// Everything one identifier denotes in one scope.
#[derive(Debug, Clone, Default)]
pub struct SymbolEntry {
    pub variable: Option<VarRef>,
    pub ty: Option<GlslType>,
    pub function: Option<FunctionRef>,
    interfaces: [Option<GlslType>; 4],
}
impl SymbolEntry {
    fn variable(v: VarRef) -> Self {
        Self {
            variable: Some(v),
            ..Default::default()
        }
    }

    fn function(f: FunctionRef) -> Self {
        Self {
            function: Some(f),
            ..Default::default()
        }
    }

    pub fn interface(&self, kind: InterfaceKind) -> Option<&GlslType> {
        self.interfaces[kind.slot()].as_ref()
    }

    fn add_interface(&mut self, ty: GlslType, kind: InterfaceKind) -> bool {
        let slot = &mut self.interfaces[kind.slot()];
        if slot.is_some() {
            return false;
        }

        *slot = Some(ty);
        true
    }
}

#[derive(Debug)]
pub struct Scope<'a> {
    pub parent: Option<&'a Scope<'a>>,
    entries: RefCell<HashMap<String, SymbolEntry>>,
}
impl<'a> Scope<'a> {
    pub fn new(parent: Option<&'a Scope<'a>>) -> Self {
        Self {
            parent,
            entries: RefCell::new(HashMap::new()),
        }
    }

    #[inline(always)]
    pub fn new_child(&'a self) -> Self {
        Self::new(Some(self))
    }

    fn root(&'a self) -> &'a Scope<'a> {
        match self.parent {
            Some(p) => p.root(),
            None => self,
        }
    }

    fn declares(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Innermost scope holding an entry for `name`.
    fn find(&'a self, name: &str) -> Option<&'a Scope<'a>> {
        if self.declares(name) {
            return Some(self);
        }

        self.parent.and_then(|p| p.find(name))
    }

    fn insert(&self, name: &str, entry: SymbolEntry) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return false;
        }

        entries.insert(name.to_owned(), entry);
        true
    }
}

/// Stack of scopes allocated from an arena owned by the caller; popping a scope only moves
/// the cursor back to its parent.
pub struct SymbolTable<'a> {
    arena: &'a Arena<Scope<'a>>,
    current: &'a Scope<'a>,
    /// Functions and variables live in separate namespaces (GLSL 1.10 rules).
    pub separate_function_namespace: bool,
}
impl<'a> SymbolTable<'a> {
    pub fn new(arena: &'a Arena<Scope<'a>>) -> Self {
        Self {
            arena,
            current: arena.alloc(Scope::new(None)),
            separate_function_namespace: false,
        }
    }

    pub fn push_scope(&mut self) {
        self.current = self.arena.alloc(self.current.new_child());
    }

    pub fn pop_scope(&mut self) {
        self.current = self
            .current
            .parent
            .unwrap_or_else(|| panic!("popping the outermost scope"));
    }

    pub fn name_declared_this_scope(&self, name: &str) -> bool {
        self.current.declares(name)
    }

    fn entry(&self, name: &str) -> Option<SymbolEntry> {
        self.current
            .find(name)
            .and_then(|s| s.entries.borrow().get(name).cloned())
    }

    fn conflict(name: &str, kind: SymbolKind) -> SymbolError {
        SymbolError::AlreadyDeclared {
            name: name.to_owned(),
            kind,
        }
    }

    pub fn add_variable(&mut self, name: &str, v: VarRef) -> Result<(), SymbolError> {
        if self.separate_function_namespace {
            if self.name_declared_this_scope(name) {
                let mut entries = self.current.entries.borrow_mut();
                match entries.get_mut(name) {
                    Some(e) if e.variable.is_none() && e.ty.is_none() => {
                        e.variable = Some(v);
                        return Ok(());
                    }
                    _ => return Err(Self::conflict(name, SymbolKind::Variable)),
                }
            }

            // keep an outer function visible through the new entry
            let mut entry = SymbolEntry::variable(v);
            entry.function = self.entry(name).and_then(|e| e.function);
            return if self.current.insert(name, entry) {
                Ok(())
            } else {
                Err(Self::conflict(name, SymbolKind::Variable))
            };
        }

        if self.current.insert(name, SymbolEntry::variable(v)) {
            Ok(())
        } else {
            Err(Self::conflict(name, SymbolKind::Variable))
        }
    }

    pub fn add_type(&mut self, name: &str, ty: GlslType) -> Result<(), SymbolError> {
        let entry = SymbolEntry {
            ty: Some(ty),
            ..Default::default()
        };
        if self.current.insert(name, entry) {
            Ok(())
        } else {
            Err(Self::conflict(name, SymbolKind::Type))
        }
    }

    pub fn add_function(&mut self, name: &str, f: FunctionRef) -> Result<(), SymbolError> {
        if self.separate_function_namespace && self.name_declared_this_scope(name) {
            let mut entries = self.current.entries.borrow_mut();
            if let Some(e) = entries.get_mut(name) {
                if e.function.is_none() && e.ty.is_none() {
                    e.function = Some(f);
                    return Ok(());
                }
            }
        }

        if self.current.insert(name, SymbolEntry::function(f)) {
            Ok(())
        } else {
            Err(Self::conflict(name, SymbolKind::Function))
        }
    }

    /// Adds an interface block to the innermost entry for `name`, or a new entry here.
    pub fn add_interface(
        &mut self,
        name: &str,
        ty: GlslType,
        kind: InterfaceKind,
    ) -> Result<(), SymbolError> {
        let added = match self.current.find(name) {
            Some(scope) => scope
                .entries
                .borrow_mut()
                .get_mut(name)
                .is_some_and(|e| e.add_interface(ty, kind)),
            None => {
                let mut entry = SymbolEntry::default();
                entry.add_interface(ty, kind);
                self.current.insert(name, entry)
            }
        };

        if added {
            Ok(())
        } else {
            Err(Self::conflict(name, SymbolKind::Interface))
        }
    }

    /// Registers a function in the outermost scope regardless of the current one.
    pub fn add_global_function(&mut self, name: &str, f: FunctionRef) -> Result<(), SymbolError> {
        if self.current.root().insert(name, SymbolEntry::function(f)) {
            Ok(())
        } else {
            Err(Self::conflict(name, SymbolKind::Function))
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<VarRef> {
        self.entry(name)?.variable
    }

    pub fn get_type(&self, name: &str) -> Option<GlslType> {
        self.entry(name)?.ty
    }

    pub fn get_function(&self, name: &str) -> Option<FunctionRef> {
        self.entry(name)?.function
    }

    pub fn get_interface(&self, name: &str, kind: InterfaceKind) -> Option<GlslType> {
        self.entry(name)?.interface(kind).cloned()
    }
}
