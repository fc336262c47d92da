use std::collections::HashMap;

use crate::lang::ast::Literal;

/// Hashable stand-in for a literal. Floats are keyed by their bit pattern,
/// so `0.0` and `-0.0` are distinct constants while identical NaNs collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(u64),
    String(String),
}

impl ConstantKey {
    fn of(literal: &Literal) -> Self {
        match literal {
            Literal::Bool(v) => ConstantKey::Bool(*v),
            Literal::Int(v) => ConstantKey::Int(*v),
            Literal::Long(v) => ConstantKey::Long(*v),
            Literal::Float(v) => ConstantKey::Float(v.to_bits()),
            Literal::String(v) => ConstantKey::String(v.clone()),
        }
    }
}

/// Ordered, value-deduplicated pool of literals. Indices are handed out in
/// order of first insertion and never change afterwards. The map is only
/// used for lookups, never iterated.
#[derive(Debug, Default)]
pub struct ConstantTable {
    constants: Vec<Literal>,
    lookup: HashMap<ConstantKey, u32>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self{ constants: Vec::new(), lookup: HashMap::new() }
    }

    /// Returns the index of `literal`, adding it if not yet present.
    pub fn add(&mut self, literal: &Literal) -> u32 {
        let key = ConstantKey::of(literal);
        if let Some(index) = self.lookup.get(&key) {
            return *index;
        }

        let index = self.constants.len() as u32;
        self.constants.push(literal.clone());
        self.lookup.insert(key, index);
        index
    }

    pub fn add_string(&mut self, value: &str) -> u32 {
        self.add(&Literal::String(value.to_string()))
    }

    pub fn get(&self, index: u32) -> Option<&Literal> {
        self.constants.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn into_constants(self) -> Vec<Literal> {
        self.constants
    }
}
