pub mod arena;
pub mod ast;
pub mod binder;
pub mod diagnostics;
pub mod emit;
pub mod eval;
pub mod symbols;

#[cfg(test)] pub(crate) mod tests;

pub use binder::bound::{
    BoundConstructor, BoundError, BoundErrorMember, BoundExpression, BoundExpressionKind,
    BoundMember, BoundMethod, BoundStatement, LocalEntry, LocalId, LocalsTable, Variable,
};
pub use binder::scope::{Scope, ScopeEntry};
pub use binder::{bind_member, MethodBinder};
pub use emit::image::{Image, LoadError, MemberCode, MemberKind};
pub use emit::opcode::{Instruction, OpCode, TypeTag};
pub use emit::{EmitError, EmitOutput, Emitter};

use crate::lang::ast::MemberSyntax;
use crate::lang::diagnostics::Diagnostics;
use crate::lang::symbols::{SymbolId, SymbolTable};

/// The syntax of a member together with the symbol it was declared as.
#[derive(Debug, Clone)]
pub struct MemberUnit {
    pub syntax: MemberSyntax,
    pub symbol: SymbolId,
}

impl MemberUnit {
    pub fn new(syntax: MemberSyntax, symbol: SymbolId) -> Self {
        Self{ syntax, symbol }
    }
}

pub struct CompileOutput {
    /// Image holding every member that could be emitted
    pub image: Image,
    /// Bound members, in the order of the units they were bound from
    pub bound: Vec<BoundMember>,
    pub diagnostics: Diagnostics,
    pub emit_errors: Vec<EmitError>,
}

impl CompileOutput {
    /// Whether every unit made it into the image
    pub fn is_complete(&self) -> bool {
        !self.diagnostics.has_errors() && self.emit_errors.is_empty()
    }
}

/// Binds every unit in a scope of its own and emits the results as a single
/// image. Members appear in the image in the order of `units`.
pub fn compile(table: &SymbolTable, units: &[MemberUnit]) -> CompileOutput {
    let mut diagnostics = Diagnostics::new();
    let mut bound = Vec::with_capacity(units.len());
    for unit in units {
        let (member, member_diagnostics) = bind_member(table, &unit.syntax, unit.symbol);
        diagnostics.merge(member_diagnostics);
        bound.push(member);
    }

    let EmitOutput{ image, errors } = Emitter::new(table).emit(&bound);
    CompileOutput{ image, bound, diagnostics, emit_errors: errors }
}
