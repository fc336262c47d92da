use crate::lang::symbols::{ScopeId, SymbolId, SymbolTable};
use super::bound::LocalId;

/// Something a name inside a member body can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    Symbol(SymbolId),
    Local(LocalId),
}

#[derive(Debug, Default)]
struct ScopeFrame {
    entries: Vec<(String, ScopeEntry)>,
}

/// Lexical scope used while binding a single member body. Frames are pushed
/// for the member itself and for each nested block. Lookups that miss every
/// frame continue into the symbol table, starting at `root` (typically the
/// owning type's member scope) and following its parent chain.
///
/// The scope is exclusively owned by whoever binds a member. Nested binders
/// borrow it mutably, there is no ambient "current scope".
pub struct Scope<'t> {
    table: &'t SymbolTable,
    root: ScopeId,
    frames: Vec<ScopeFrame>,
}

impl<'t> Scope<'t> {
    pub fn new(table: &'t SymbolTable, root: ScopeId) -> Self {
        Self{
            table,
            root,
            frames: vec![ScopeFrame::default()],
        }
    }

    pub fn table(&self) -> &'t SymbolTable {
        self.table
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "popping the member frame");
        self.frames.pop();
    }

    /// Registers `name` in the innermost frame. Returns the entry that is
    /// already registered under that name in the innermost frame, in which
    /// case nothing is registered. Shadowing names of outer frames is
    /// allowed.
    pub(crate) fn register(&mut self, name: &str, entry: ScopeEntry) -> Result<(), ScopeEntry> {
        let frame = self.frames.last_mut().expect("scope without frames");
        if let Some((_, existing)) = frame.entries.iter().find(|(n, _)| n == name) {
            return Err(*existing);
        }

        frame.entries.push((name.to_string(), entry));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ScopeEntry> {
        for frame in self.frames.iter().rev() {
            if let Some((_, entry)) = frame.entries.iter().rev().find(|(n, _)| n == name) {
                return Some(*entry);
            }
        }

        self.table.lookup(self.root, name).map(ScopeEntry::Symbol)
    }

    /// Total number of entries registered in all frames, not counting the
    /// symbol table.
    pub fn num_entries(&self) -> usize {
        self.frames.iter().map(|v| v.entries.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_duplicates() {
        let mut table = SymbolTable::new();
        let program = table.declare_type("Program").unwrap();
        let root = table[program].as_type().unwrap().members_scope;

        let mut scope = Scope::new(&table, root);
        assert!(scope.register("a", ScopeEntry::Local(LocalId(0))).is_ok());
        assert_eq!(scope.register("a", ScopeEntry::Local(LocalId(1))), Err(ScopeEntry::Local(LocalId(0))));

        scope.push_frame();
        assert!(scope.register("a", ScopeEntry::Local(LocalId(2))).is_ok());
        assert_eq!(scope.lookup("a"), Some(ScopeEntry::Local(LocalId(2))));
        assert_eq!(scope.num_entries(), 2);
        scope.pop_frame();

        assert_eq!(scope.lookup("a"), Some(ScopeEntry::Local(LocalId(0))));
        assert_eq!(scope.lookup("Program"), Some(ScopeEntry::Symbol(program)));
        assert_eq!(scope.lookup("nope"), None);
    }
}
