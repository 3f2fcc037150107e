//! Scope tree and symbol store.
//!
//! Scopes form a tree rooted at the single global scope; the table keeps
//! them in a flat arena addressed by [`ScopeId`] and tracks the current
//! scope as a cursor. Lookup is lexical: current scope first, then the
//! parent chain up to global.
//!
//! Instead of an inheritance hierarchy of symbol classes, a symbol is
//! one struct with a [`SymbolKind`] tag carrying the function or class
//! payload where one exists.

use std::collections::HashMap;

use compiscript_base::{Diagnostic, Loc, Symbol};

use crate::types::Type;

/// Index of a scope in the table's flat arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// What kind of construct a scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function(Symbol),
    Class(Symbol),
    Block,
    ForLoop,
    ForeachLoop,
    Try,
    Catch,
    /// Body of a class `init` constructor.
    Init,
}

impl ScopeKind {
    /// Debug rendering matching the conventional scope names
    /// (`global`, `function_f`, `class_C`, `block`, ...).
    pub fn name(&self, interner: &compiscript_base::Interner) -> String {
        match self {
            ScopeKind::Global => "global".to_string(),
            ScopeKind::Function(sym) => format!("function_{}", interner.resolve(*sym)),
            ScopeKind::Class(sym) => format!("class_{}", interner.resolve(*sym)),
            ScopeKind::Block => "block".to_string(),
            ScopeKind::ForLoop => "for_loop".to_string(),
            ScopeKind::ForeachLoop => "foreach_loop".to_string(),
            ScopeKind::Try => "try".to_string(),
            ScopeKind::Catch => "catch".to_string(),
            ScopeKind::Init => "init".to_string(),
        }
    }
}

/// A single scope: symbols plus tree links.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    symbols: HashMap<Symbol, SymbolInfo>,
    /// Declaration order, for deterministic iteration.
    order: Vec<Symbol>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            symbols: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Looks up a name in this scope only.
    pub fn get(&self, name: Symbol) -> Option<&SymbolInfo> {
        self.symbols.get(&name)
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.order.iter().filter_map(|name| self.symbols.get(name))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A named binding with its attributes.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: Symbol,
    pub ty: Type,
    pub kind: SymbolKind,
    pub is_constant: bool,
    pub is_initialized: bool,
    pub decl_loc: Loc,
}

impl SymbolInfo {
    /// A plain variable binding.
    pub fn var(name: Symbol, ty: Type, loc: Loc) -> Self {
        Self {
            name,
            ty,
            kind: SymbolKind::Var,
            is_constant: false,
            is_initialized: false,
            decl_loc: loc,
        }
    }

    /// A function binding (type tag `Function`).
    pub fn function(name: Symbol, data: FunctionData, loc: Loc) -> Self {
        Self {
            name,
            ty: Type::Function,
            kind: SymbolKind::Function(data),
            is_constant: false,
            is_initialized: true,
            decl_loc: loc,
        }
    }

    /// A class binding (type tag `Class`).
    pub fn class(name: Symbol, data: ClassData, loc: Loc) -> Self {
        Self {
            name,
            ty: Type::Class(name),
            kind: SymbolKind::Class(data),
            is_constant: false,
            is_initialized: true,
            decl_loc: loc,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            SymbolKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.kind {
            SymbolKind::Class(data) => Some(data),
            _ => None,
        }
    }
}

/// Tagged payload per symbol specialization.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    Var,
    Function(FunctionData),
    Class(ClassData),
}

/// Signature of a function or method.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub return_type: Type,
    /// Ordered `(name, type)` pairs.
    pub params: Vec<(Symbol, Type)>,
    /// Set once a `return` statement is seen in the body.
    pub has_return: bool,
}

impl FunctionData {
    pub fn new(return_type: Type, params: Vec<(Symbol, Type)>) -> Self {
        Self { return_type, params, has_return: false }
    }
}

/// Shape of a class: parent link, methods, attributes in declaration
/// order.
#[derive(Debug, Clone, Default)]
pub struct ClassData {
    pub parent: Option<Symbol>,
    pub methods: Vec<(Symbol, FunctionData)>,
    pub attributes: Vec<(Symbol, Type)>,
    /// The `init` method, if declared.
    pub constructor: Option<FunctionData>,
}

impl ClassData {
    pub fn method(&self, name: Symbol) -> Option<&FunctionData> {
        self.methods.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }

    pub fn attribute(&self, name: Symbol) -> Option<&Type> {
        self.attributes.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }
}

/// The symbol table: scope arena plus current-scope cursor.
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
    errors: Vec<Diagnostic>,
    sym_print: Symbol,
}

impl SymbolTable {
    /// Creates a table with the global scope and the built-in
    /// `print(value: string): void` installed.
    pub fn new(interner: &mut compiscript_base::Interner) -> Self {
        let mut table = Self {
            scopes: vec![Scope::new(ScopeKind::Global, None)],
            current: ScopeId::GLOBAL,
            errors: Vec::new(),
            sym_print: interner.intern("print"),
        };
        let value = interner.intern("value");
        let print = SymbolInfo::function(
            table.sym_print,
            FunctionData::new(Type::Void, vec![(value, Type::Str)]),
            Loc::default(),
        );
        table.define(print);
        table
    }

    /// The interned name of the built-in `print`.
    pub fn print_symbol(&self) -> Symbol {
        self.sym_print
    }

    // ------------------------------------------------------------------
    // Scope navigation
    // ------------------------------------------------------------------

    /// Creates a child of the current scope and descends into it.
    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(kind, Some(self.current)));
        let parent = self.current;
        self.scopes[parent.0].children.push(id);
        self.current = id;
        id
    }

    /// Ascends to the parent scope.
    ///
    /// Exiting the global scope is an internal invariant violation; in
    /// release builds it is ignored.
    pub fn exit_scope(&mut self) {
        debug_assert!(
            self.scopes[self.current.0].parent.is_some(),
            "exit_scope called on the global scope"
        );
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    pub fn current_scope_id(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[ScopeId::GLOBAL.0]
    }

    /// All scopes in creation order.
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// `true` when the current scope chain passes through a class body
    /// (class scope or `init` scope), which is where `this` and `super`
    /// are legal.
    pub fn in_class_context(&self) -> bool {
        self.enclosing_class().is_some()
    }

    /// The class whose body lexically encloses the current scope.
    pub fn enclosing_class(&self) -> Option<Symbol> {
        self.enclosing_class_scope()
            .and_then(|id| match self.scopes[id.0].kind {
                ScopeKind::Class(sym) => Some(sym),
                _ => None,
            })
    }

    /// The scope of the class whose body lexically encloses the current
    /// scope.
    pub fn enclosing_class_scope(&self) -> Option<ScopeId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            match self.scopes[id.0].kind {
                ScopeKind::Class(_) => return Some(id),
                _ => cursor = self.scopes[id.0].parent,
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Definition and lookup
    // ------------------------------------------------------------------

    /// Inserts a symbol into the current scope.
    ///
    /// A duplicate name is reported and the existing binding kept.
    pub fn define(&mut self, info: SymbolInfo) -> bool {
        self.define_in(self.current, info)
    }

    /// Inserts a symbol into a specific scope (used when a method body
    /// scope needs to add a field to its class scope).
    pub fn define_in(&mut self, scope: ScopeId, info: SymbolInfo) -> bool {
        let scope = &mut self.scopes[scope.0];
        if scope.symbols.contains_key(&info.name) {
            self.errors.push(Diagnostic::new(
                "Symbol already declared in current scope",
                info.decl_loc,
            ));
            return false;
        }
        scope.order.push(info.name);
        scope.symbols.insert(info.name, info);
        true
    }

    /// Lexical lookup from the current scope to global.
    pub fn lookup(&self, name: Symbol) -> Option<&SymbolInfo> {
        self.lookup_from(self.current, name)
    }

    /// Lexical lookup starting from an arbitrary scope.
    pub fn lookup_from(&self, start: ScopeId, name: Symbol) -> Option<&SymbolInfo> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if let Some(info) = self.scopes[id.0].symbols.get(&name) {
                return Some(info);
            }
            cursor = self.scopes[id.0].parent;
        }
        None
    }

    /// Lookup restricted to the current scope.
    pub fn lookup_local(&self, name: Symbol) -> Option<&SymbolInfo> {
        self.scopes[self.current.0].symbols.get(&name)
    }

    /// Mutable lexical lookup, for marking initialization and return
    /// flags.
    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut SymbolInfo> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if self.scopes[id.0].symbols.contains_key(&name) {
                return self.scopes[id.0].symbols.get_mut(&name);
            }
            cursor = self.scopes[id.0].parent;
        }
        None
    }

    /// Finds the scope that holds `name` along the lexical chain.
    pub fn defining_scope(&self, name: Symbol) -> Option<ScopeId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if self.scopes[id.0].symbols.contains_key(&name) {
                return Some(id);
            }
            cursor = self.scopes[id.0].parent;
        }
        None
    }

    // ------------------------------------------------------------------
    // Class queries
    // ------------------------------------------------------------------

    /// The class data for a class symbol, looked up from global.
    pub fn class_data(&self, class: Symbol) -> Option<&ClassData> {
        self.lookup_from(ScopeId::GLOBAL, class)?.as_class()
    }

    /// Mutable class data, searched across every scope (classes may be
    /// declared in nested scopes).
    pub fn class_data_mut(&mut self, class: Symbol) -> Option<&mut ClassData> {
        for scope in &mut self.scopes {
            if let Some(info) = scope.symbols.get_mut(&class) {
                if let SymbolKind::Class(data) = &mut info.kind {
                    return Some(data);
                }
            }
        }
        None
    }

    /// Resolves an attribute on a class, walking the inheritance chain.
    pub fn find_attribute(&self, class: Symbol, field: Symbol) -> Option<Type> {
        let mut cursor = Some(class);
        while let Some(name) = cursor {
            let data = self.find_class_anywhere(name)?;
            if let Some(ty) = data.attribute(field) {
                return Some(ty.clone());
            }
            cursor = data.parent;
        }
        None
    }

    /// Resolves a method on a class, walking the inheritance chain.
    pub fn find_method(&self, class: Symbol, method: Symbol) -> Option<&FunctionData> {
        let mut cursor = Some(class);
        while let Some(name) = cursor {
            let data = self.find_class_anywhere(name)?;
            if let Some(found) = data.method(method) {
                return Some(found);
            }
            cursor = data.parent;
        }
        None
    }

    /// Searches every declared class for a method, used when the
    /// receiver's class is not statically known.
    pub fn find_method_any(&self, method: Symbol) -> Option<&FunctionData> {
        for scope in &self.scopes {
            for info in scope.symbols.values() {
                if let SymbolKind::Class(data) = &info.kind {
                    if let Some(found) = data.method(method) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Searches every declared class for an attribute.
    pub fn find_attribute_any(&self, field: Symbol) -> Option<Type> {
        for scope in &self.scopes {
            for info in scope.symbols.values() {
                if let SymbolKind::Class(data) = &info.kind {
                    if let Some(ty) = data.attribute(field) {
                        return Some(ty.clone());
                    }
                }
            }
        }
        None
    }

    fn find_class_anywhere(&self, class: Symbol) -> Option<&ClassData> {
        for scope in &self.scopes {
            if let Some(info) = scope.symbols.get(&class) {
                if let SymbolKind::Class(data) = &info.kind {
                    return Some(data);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub fn add_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiscript_base::Interner;

    fn setup() -> (SymbolTable, Interner) {
        let mut interner = Interner::new();
        let table = SymbolTable::new(&mut interner);
        (table, interner)
    }

    #[test]
    fn print_builtin_is_predefined_in_global() {
        let (table, interner) = setup();
        let print = interner.lookup("print").expect("print interned");
        let info = table.lookup(print).expect("print defined");
        let data = info.as_function().expect("print is a function");
        assert_eq!(data.return_type, Type::Void);
        assert_eq!(data.params.len(), 1);
        assert_eq!(data.params[0].1, Type::Str);
    }

    #[test]
    fn define_rejects_duplicates_and_keeps_first() {
        let (mut table, mut interner) = setup();
        let name = interner.intern("a");
        assert!(table.define(SymbolInfo::var(name, Type::Integer, Loc::new(1, 0))));
        assert!(!table.define(SymbolInfo::var(name, Type::Str, Loc::new(2, 0))));
        assert_eq!(table.lookup(name).unwrap().ty, Type::Integer);
        assert!(table.has_errors());
    }

    #[test]
    fn lookup_is_lexical_through_parents() {
        let (mut table, mut interner) = setup();
        let name = interner.intern("x");
        table.define(SymbolInfo::var(name, Type::Integer, Loc::default()));
        table.enter_scope(ScopeKind::Block);
        assert_eq!(table.lookup(name).unwrap().ty, Type::Integer);
        assert!(table.lookup_local(name).is_none());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let (mut table, mut interner) = setup();
        let name = interner.intern("a");
        table.define(SymbolInfo::var(name, Type::Integer, Loc::default()));
        table.enter_scope(ScopeKind::Function(interner.intern("main")));
        table.define(SymbolInfo::var(name, Type::Str, Loc::default()));
        assert_eq!(table.lookup(name).unwrap().ty, Type::Str);
        table.exit_scope();
        assert_eq!(table.lookup(name).unwrap().ty, Type::Integer);
    }

    #[test]
    fn enter_and_exit_restore_the_cursor() {
        let (mut table, mut interner) = setup();
        let start = table.current_scope_id();
        table.enter_scope(ScopeKind::Block);
        table.enter_scope(ScopeKind::ForLoop);
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.current_scope_id(), start);
        let _ = interner.intern("unused");
    }

    #[test]
    fn class_context_is_visible_from_method_scopes() {
        let (mut table, mut interner) = setup();
        let class = interner.intern("Punto");
        table.define(SymbolInfo::class(class, ClassData::default(), Loc::default()));
        table.enter_scope(ScopeKind::Class(class));
        table.enter_scope(ScopeKind::Init);
        assert!(table.in_class_context());
        assert_eq!(table.enclosing_class(), Some(class));
        table.exit_scope();
        table.exit_scope();
        assert!(!table.in_class_context());
    }

    #[test]
    fn attribute_resolution_walks_inheritance() {
        let (mut table, mut interner) = setup();
        let animal = interner.intern("Animal");
        let perro = interner.intern("Perro");
        let edad = interner.intern("edad");

        let mut animal_data = ClassData::default();
        animal_data.attributes.push((edad, Type::Integer));
        table.define(SymbolInfo::class(animal, animal_data, Loc::default()));

        let perro_data = ClassData { parent: Some(animal), ..ClassData::default() };
        table.define(SymbolInfo::class(perro, perro_data, Loc::default()));

        assert_eq!(table.find_attribute(perro, edad), Some(Type::Integer));
    }

    #[test]
    fn scope_iteration_preserves_declaration_order() {
        let (mut table, mut interner) = setup();
        let names = ["uno", "dos", "tres"];
        for name in names {
            let sym = interner.intern(name);
            table.define(SymbolInfo::var(sym, Type::Integer, Loc::default()));
        }
        let declared: Vec<&str> = table
            .global_scope()
            .iter()
            .map(|info| interner.resolve(info.name))
            .collect();
        // `print` is installed first, then the user symbols in order.
        assert_eq!(declared, ["print", "uno", "dos", "tres"]);
    }
}
