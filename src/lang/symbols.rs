/// symbols.rs
///
/// The symbol table produced by declaration binding. It stores the declared
/// types, their methods and constructors, and the parameters and type
/// parameters of those members. Scopes are module-level (the global scope) or
/// type-level; member-local scopes are not stored here but are created by the
/// binder (see `binder::scope`).
///
/// Once declared a symbol is never modified: member binding only reads from
/// the table, which is why multiple members can be bound concurrently against
/// the same table.

use std::fmt;

use super::arena::{Arena, Id};

pub type SymbolId = Id<Symbol>;
pub type ScopeId = Id<ScopedSymbols>;

const RESERVED_SYMBOLS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int,
    Long,
    Float,
}

impl PrimitiveType {
    /// Number of bytes a value of this type occupies on the heap.
    pub fn size(&self) -> u32 {
        match self {
            PrimitiveType::Bool => 1,
            PrimitiveType::Int => 4,
            PrimitiveType::Long => 8,
            PrimitiveType::Float => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        match name {
            "bool" => Some(PrimitiveType::Bool),
            "int" => Some(PrimitiveType::Int),
            "long" => Some(PrimitiveType::Long),
            "float" => Some(PrimitiveType::Float),
            _ => None,
        }
    }
}

/// A resolved type. `Generic` refers to a type parameter symbol, `Error` is
/// the type of expressions that failed to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Void,
    Primitive(PrimitiveType),
    String,
    Archive,
    Array(PrimitiveType),
    Generic(SymbolId),
    Error,
}

impl TypeRef {
    pub const BOOL: TypeRef = TypeRef::Primitive(PrimitiveType::Bool);
    pub const INT: TypeRef = TypeRef::Primitive(PrimitiveType::Int);
    pub const LONG: TypeRef = TypeRef::Primitive(PrimitiveType::Long);
    pub const FLOAT: TypeRef = TypeRef::Primitive(PrimitiveType::Float);

    pub fn is_numeric(&self) -> bool {
        match self {
            TypeRef::Primitive(PrimitiveType::Int) |
            TypeRef::Primitive(PrimitiveType::Long) |
            TypeRef::Primitive(PrimitiveType::Float) => true,
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            TypeRef::Primitive(PrimitiveType::Int) | TypeRef::Primitive(PrimitiveType::Long) => true,
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        *self == TypeRef::Error
    }

    /// Resolves one of the builtin type names. Type parameters are resolved
    /// by whoever knows which type parameters are in scope.
    pub fn from_builtin_name(name: &str, is_array: bool) -> Option<TypeRef> {
        if is_array {
            return PrimitiveType::from_name(name).map(TypeRef::Array);
        }

        match name {
            "void" => Some(TypeRef::Void),
            "string" => Some(TypeRef::String),
            "archive" => Some(TypeRef::Archive),
            _ => PrimitiveType::from_name(name).map(TypeRef::Primitive),
        }
    }

    /// Human readable name, needs the table to name type parameters.
    pub fn display_name(&self, table: &SymbolTable) -> String {
        match self {
            TypeRef::Void => String::from("void"),
            TypeRef::Primitive(v) => String::from(v.name()),
            TypeRef::String => String::from("string"),
            TypeRef::Archive => String::from("archive"),
            TypeRef::Array(v) => format!("{}[]", v.name()),
            TypeRef::Generic(id) => table[*id].name.clone(),
            TypeRef::Error => String::from("<error>"),
        }
    }
}

#[derive(Debug)]
pub struct ScopedSymbols {
    parent: Option<ScopeId>,
    symbols: Vec<SymbolId>,
}

#[derive(Debug)]
pub struct TypeSymbol {
    pub members_scope: ScopeId,
    pub methods: Vec<SymbolId>,
    pub constructor: Option<SymbolId>,
}

#[derive(Debug)]
pub struct MethodSymbol {
    pub owner: SymbolId,
    pub parameters: Vec<SymbolId>,
    pub type_parameters: Vec<SymbolId>,
}

#[derive(Debug)]
pub struct ConstructorSymbol {
    pub owner: SymbolId,
    pub parameters: Vec<SymbolId>,
}

#[derive(Debug)]
pub enum SymbolKind {
    Type(TypeSymbol),
    Method(MethodSymbol),
    Constructor(ConstructorSymbol),
    Parameter { ordinal: u16 },
    TypeParameter { ordinal: u16 },
}

/// A declared symbol. `declared_type` is the return type for methods, the
/// value type for parameters and `Void` for types and constructors.
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub declared_type: TypeRef,
    pub scope: ScopeId,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn is_method_or_constructor(&self) -> bool {
        match self.kind {
            SymbolKind::Method(_) | SymbolKind::Constructor(_) => true,
            _ => false,
        }
    }

    pub fn as_type(&self) -> Option<&TypeSymbol> {
        match &self.kind {
            SymbolKind::Type(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodSymbol> {
        match &self.kind {
            SymbolKind::Method(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_constructor(&self) -> Option<&ConstructorSymbol> {
        match &self.kind {
            SymbolKind::Constructor(v) => Some(v),
            _ => None,
        }
    }

    /// Parameters of a method or constructor, empty for anything else.
    pub fn parameters(&self) -> &[SymbolId] {
        match &self.kind {
            SymbolKind::Method(v) => &v.parameters,
            SymbolKind::Constructor(v) => &v.parameters,
            _ => &[],
        }
    }

    pub fn owner(&self) -> Option<SymbolId> {
        match &self.kind {
            SymbolKind::Method(v) => Some(v.owner),
            SymbolKind::Constructor(v) => Some(v.owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    DuplicateSymbol { name: String, existing: SymbolId },
    DuplicateConstructor { owner: String },
    ReservedName { name: String },
    UnknownType { name: String },
    NotAType { name: String },
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::DuplicateSymbol{ name, .. } => write!(f, "symbol '{}' is already defined", name),
            SymbolError::DuplicateConstructor{ owner } => write!(f, "type '{}' already has a constructor", owner),
            SymbolError::ReservedName{ name } => write!(f, "'{}' is a reserved type name", name),
            SymbolError::UnknownType{ name } => write!(f, "unknown type '{}'", name),
            SymbolError::NotAType{ name } => write!(f, "symbol '{}' is not a type", name),
        }
    }
}

pub struct SymbolTable {
    symbols: Arena<Symbol>,
    scopes: Arena<ScopedSymbols>,
    global_scope: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let global_scope = scopes.alloc_with_id(|_| ScopedSymbols{
            parent: None,
            symbols: Vec::with_capacity(RESERVED_SYMBOLS),
        });

        Self{ symbols: Arena::new(), scopes, global_scope }
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    /// Declares a new type in the global scope.
    pub fn declare_type(&mut self, name: &str) -> Result<SymbolId, SymbolError> {
        if TypeRef::from_builtin_name(name, false).is_some() {
            return Err(SymbolError::ReservedName{ name: name.to_string() });
        }
        if let Some(existing) = self.find_in_scope(self.global_scope, name) {
            return Err(SymbolError::DuplicateSymbol{ name: name.to_string(), existing });
        }

        let members_scope = self.insert_scope(Some(self.global_scope));
        let global_scope = self.global_scope;
        let id = self.symbols.alloc_with_id(|_| Symbol{
            name: name.to_string(),
            declared_type: TypeRef::Void,
            scope: global_scope,
            kind: SymbolKind::Type(TypeSymbol{
                members_scope,
                methods: Vec::new(),
                constructor: None,
            }),
        });
        self.scopes_mut(global_scope).symbols.push(id);

        Ok(id)
    }

    /// Declares a method on a previously declared type. Parameter and return
    /// types are written as type names (e.g. `int`, `float[]` or one of the
    /// method's own type parameters).
    pub fn declare_method(
        &mut self, owner: SymbolId, name: &str, return_type: &str,
        type_parameters: &[&str], parameters: &[(&str, &str)]
    ) -> Result<SymbolId, SymbolError> {
        let members_scope = self.members_scope_of(owner)?;
        if let Some(existing) = self.find_in_scope(members_scope, name) {
            return Err(SymbolError::DuplicateSymbol{ name: name.to_string(), existing });
        }

        // Type parameters and parameters live in a scope of their own, nested
        // in the type's scope. No uniqueness is enforced there: the binder
        // reports collisions when it registers them.
        let signature_scope = self.insert_scope(Some(members_scope));
        let mut type_parameter_ids = Vec::with_capacity(type_parameters.len());
        for (ordinal, type_parameter) in type_parameters.iter().enumerate() {
            let id = self.symbols.alloc_with_id(|id| Symbol{
                name: type_parameter.to_string(),
                declared_type: TypeRef::Generic(id),
                scope: signature_scope,
                kind: SymbolKind::TypeParameter{ ordinal: ordinal as u16 },
            });
            self.scopes_mut(signature_scope).symbols.push(id);
            type_parameter_ids.push(id);
        }

        let return_type = self.resolve_type_name(return_type, &type_parameter_ids)?;
        let parameter_ids = self.declare_parameters(signature_scope, parameters, &type_parameter_ids)?;

        let id = self.symbols.alloc_with_id(|_| Symbol{
            name: name.to_string(),
            declared_type: return_type,
            scope: members_scope,
            kind: SymbolKind::Method(MethodSymbol{
                owner,
                parameters: parameter_ids,
                type_parameters: type_parameter_ids,
            }),
        });
        self.scopes_mut(members_scope).symbols.push(id);
        if let SymbolKind::Type(type_symbol) = &mut self.symbol_mut(owner).kind {
            type_symbol.methods.push(id);
        }

        Ok(id)
    }

    /// Declares the (single) constructor of a type. Constructors are not
    /// registered by name, they are reached through their owning type.
    pub fn declare_constructor(&mut self, owner: SymbolId, parameters: &[(&str, &str)]) -> Result<SymbolId, SymbolError> {
        let members_scope = self.members_scope_of(owner)?;
        if self[owner].as_type().and_then(|v| v.constructor).is_some() {
            return Err(SymbolError::DuplicateConstructor{ owner: self[owner].name.clone() });
        }

        let signature_scope = self.insert_scope(Some(members_scope));
        let parameter_ids = self.declare_parameters(signature_scope, parameters, &[])?;
        let id = self.symbols.alloc_with_id(|_| Symbol{
            name: String::from("ctor"),
            declared_type: TypeRef::Void,
            scope: members_scope,
            kind: SymbolKind::Constructor(ConstructorSymbol{
                owner,
                parameters: parameter_ids,
            }),
        });
        if let SymbolKind::Type(type_symbol) = &mut self.symbol_mut(owner).kind {
            type_symbol.constructor = Some(id);
        }

        Ok(id)
    }

    fn declare_parameters(
        &mut self, signature_scope: ScopeId, parameters: &[(&str, &str)], type_parameters: &[SymbolId]
    ) -> Result<Vec<SymbolId>, SymbolError> {
        let mut ids = Vec::with_capacity(parameters.len());
        for (ordinal, (name, type_name)) in parameters.iter().enumerate() {
            let declared_type = self.resolve_type_name(type_name, type_parameters)?;
            if declared_type == TypeRef::Void {
                return Err(SymbolError::UnknownType{ name: type_name.to_string() });
            }
            let id = self.symbols.alloc_with_id(|_| Symbol{
                name: name.to_string(),
                declared_type,
                scope: signature_scope,
                kind: SymbolKind::Parameter{ ordinal: ordinal as u16 },
            });
            self.scopes_mut(signature_scope).symbols.push(id);
            ids.push(id);
        }

        Ok(ids)
    }

    /// Resolves a written type name, where a trailing `[]` denotes an array.
    fn resolve_type_name(&self, name: &str, type_parameters: &[SymbolId]) -> Result<TypeRef, SymbolError> {
        let (base, is_array) = match name.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (name, false),
        };

        if let Some(builtin) = TypeRef::from_builtin_name(base, is_array) {
            return Ok(builtin);
        }
        if !is_array {
            for type_parameter in type_parameters {
                if self[*type_parameter].name == base {
                    return Ok(TypeRef::Generic(*type_parameter));
                }
            }
        }

        Err(SymbolError::UnknownType{ name: name.to_string() })
    }

    fn members_scope_of(&self, owner: SymbolId) -> Result<ScopeId, SymbolError> {
        match self[owner].as_type() {
            Some(type_symbol) => Ok(type_symbol.members_scope),
            None => Err(SymbolError::NotAType{ name: self[owner].name.clone() }),
        }
    }

    fn insert_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.alloc_with_id(|_| ScopedSymbols{
            parent,
            symbols: Vec::with_capacity(RESERVED_SYMBOLS),
        })
    }

    fn find_in_scope(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope].symbols.iter()
            .copied()
            .find(|id| self[*id].name == name)
    }

    /// Looks up a symbol by name, starting at `scope` and walking up the
    /// parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut seek_scope = Some(scope);
        while let Some(scope) = seek_scope {
            if let Some(found) = self.find_in_scope(scope, name) {
                return Some(found);
            }
            seek_scope = self.scopes[scope].parent;
        }

        None
    }

    pub fn lookup_type(&self, name: &str) -> Option<SymbolId> {
        self.find_in_scope(self.global_scope, name)
            .filter(|id| self[*id].as_type().is_some())
    }

    /// Name under which a method or constructor is found in an emitted image,
    /// e.g. `Program.main` or `Point.ctor`.
    pub fn qualified_name(&self, member: SymbolId) -> String {
        let symbol = &self[member];
        match symbol.owner() {
            Some(owner) => format!("{}.{}", self[owner].name, symbol.name),
            None => symbol.name.clone(),
        }
    }

    pub fn types(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().filter(|(_, symbol)| symbol.as_type().is_some())
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    // Symbols are only mutated while declaring, hence the private accessors
    fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    fn scopes_mut(&mut self, id: ScopeId) -> &mut ScopedSymbols {
        &mut self.scopes[id]
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<SymbolId> for SymbolTable {
    type Output = Symbol;
    fn index(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }
}
