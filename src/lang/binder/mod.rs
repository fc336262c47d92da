/// binder
///
/// Binding of member bodies. The `MethodBinder` takes the syntax of a single
/// method or constructor together with the symbol that was declared for it,
/// registers the member's parameters (and type parameters) in a fresh scope
/// and hands the body to a nested `StatementBinder`. The result is a typed
/// bound tree plus diagnostics.
///
/// Binding never stops at the first problem: every statement produces exactly
/// one bound statement, with `Error` nodes standing in for whatever could not
/// be resolved.

pub(crate) mod bound;
pub(crate) mod scope;
mod statement;

use crate::lang::ast::{InputSpan, MemberSyntax};
use crate::lang::diagnostics::Diagnostics;
use crate::lang::symbols::{SymbolId, SymbolKind, SymbolTable};

use bound::*;
use scope::{Scope, ScopeEntry};
use statement::StatementBinder;

macro_rules! debug_log {
    ($format:literal) => {
        enabled_debug_print!(false, "binder", $format);
    };
    ($format:literal, $($args:expr),*) => {
        enabled_debug_print!(false, "binder", $format, $($args),*);
    };
}

pub struct MethodBinder<'s, 't> {
    scope: &'s mut Scope<'t>,
    diagnostics: Diagnostics,
}

impl<'s, 't> MethodBinder<'s, 't> {
    pub fn new(scope: &'s mut Scope<'t>) -> Self {
        Self{
            scope,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Diagnostics collected by all calls to `bind` so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Binds `node`. `args` must hold exactly one symbol: the method or
    /// constructor `node` was declared as. Anything else is reported and
    /// results in a `BoundMember::Error`.
    pub fn bind(&mut self, node: &MemberSyntax, args: &[SymbolId]) -> BoundMember {
        let table = self.scope.table();
        let span = node.span();

        if args.len() != 1 {
            let message = format!("expected a single member symbol to bind against, got {}", args.len());
            return self.error_member(span, message);
        }

        let symbol_id = args[0];
        let symbol = match table.get(symbol_id) {
            Some(symbol) => symbol,
            None => {
                let message = format!("symbol #{} does not belong to this symbol table", symbol_id.index());
                return self.error_member(span, message);
            },
        };
        match (node, &symbol.kind) {
            (MemberSyntax::Method(_), SymbolKind::Method(_)) |
            (MemberSyntax::Constructor(_), SymbolKind::Constructor(_)) => {},
            (_, kind) if !symbol.is_method_or_constructor() => {
                let message = format!("symbol '{}' is not a method or constructor ({})", &symbol.name, kind_name(kind));
                return self.error_member(span, message);
            },
            (MemberSyntax::Method(_), _) => {
                let message = format!("method syntax cannot be bound to constructor '{}'", table.qualified_name(symbol_id));
                return self.error_member(span, message);
            },
            (MemberSyntax::Constructor(_), _) => {
                let message = format!("constructor syntax cannot be bound to method '{}'", table.qualified_name(symbol_id));
                return self.error_member(span, message);
            },
        }

        if let MemberSyntax::Method(method) = node {
            if method.identifier.value != symbol.name {
                self.diagnostics.info(
                    method.identifier.span,
                    format!("method '{}' is bound to symbol '{}'", &method.identifier.value, &symbol.name)
                );
            }
        }

        debug_log!("binding '{}'", table.qualified_name(symbol_id));
        self.register_signature(table, symbol_id, span);

        let mut binder = StatementBinder::new(&mut *self.scope, symbol_id);
        let statements: Vec<BoundStatement> = node.body().statements.iter()
            .map(|v| binder.bind_statement(v))
            .collect();
        let (locals, diagnostics) = binder.finish();
        self.diagnostics.merge(diagnostics);

        debug_log!(" * {} statement(s), {} local(s)", statements.len(), locals.len());
        match node {
            MemberSyntax::Method(_) => BoundMember::Method(BoundMethod{
                span, symbol: symbol_id, statements, locals,
            }),
            MemberSyntax::Constructor(_) => BoundMember::Constructor(BoundConstructor{
                span, symbol: symbol_id, statements, locals,
            }),
        }
    }

    /// Registers parameters, then type parameters, in declaration order. On
    /// a name clash the parameter keeps the name.
    fn register_signature(&mut self, table: &SymbolTable, member: SymbolId, span: InputSpan) {
        let symbol = &table[member];
        let type_parameters = symbol.as_method()
            .map(|v| v.type_parameters.as_slice())
            .unwrap_or(&[]);

        for id in symbol.parameters().iter().chain(type_parameters.iter()) {
            let name = &table[*id].name;
            if self.scope.register(name, ScopeEntry::Symbol(*id)).is_err() {
                self.diagnostics.error(
                    span,
                    format!("'{}' is declared more than once in the signature of '{}'", name, table.qualified_name(member))
                );
            }
        }
    }

    fn error_member(&mut self, span: InputSpan, message: String) -> BoundMember {
        self.diagnostics.error(span, &message);
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(span, message);
        BoundMember::Error(BoundErrorMember{ span, diagnostics })
    }
}

fn kind_name(kind: &SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Type(_) => "type",
        SymbolKind::Method(_) => "method",
        SymbolKind::Constructor(_) => "constructor",
        SymbolKind::Parameter{ .. } => "parameter",
        SymbolKind::TypeParameter{ .. } => "type parameter",
    }
}

/// Binds a single member in a scope of its own, rooted at the member scope
/// of the owning type.
pub fn bind_member(table: &SymbolTable, node: &MemberSyntax, member: SymbolId) -> (BoundMember, Diagnostics) {
    let root = table.get(member)
        .and_then(|v| v.owner())
        .and_then(|owner| table[owner].as_type())
        .map(|v| v.members_scope)
        .unwrap_or_else(|| table.global_scope());

    let mut scope = Scope::new(table, root);
    let mut binder = MethodBinder::new(&mut scope);
    let bound = binder.bind(node, &[member]);
    (bound, binder.into_diagnostics())
}
