/// bound.rs
///
/// The bound tree: member bodies after name resolution and type checking.
/// Every expression carries its resolved type. Constructs that failed to bind
/// are kept in the tree as `Error` nodes carrying the reason, so that a
/// single pass reports everything and the emitter can refuse the member.

use crate::lang::ast::{InputSpan, Literal, BinaryOperator, UnaryOperator};
use crate::lang::diagnostics::Diagnostics;
use crate::lang::symbols::{SymbolId, TypeRef, PrimitiveType};

/// Index into a member's `LocalsTable`, doubling as the stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct LocalEntry {
    pub name: String,
    pub declared_type: TypeRef,
    pub span: InputSpan,
}

/// Locals of a member in declaration order. Parameters are not locals: they
/// are addressed through their ordinal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalsTable {
    entries: Vec<LocalEntry>,
}

impl LocalsTable {
    pub fn new() -> Self {
        Self{ entries: Vec::new() }
    }

    pub(crate) fn push(&mut self, entry: LocalEntry) -> LocalId {
        let id = LocalId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    pub fn get(&self, id: LocalId) -> &LocalEntry {
        &self.entries[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalId, &LocalEntry)> {
        self.entries.iter().enumerate().map(|(idx, entry)| (LocalId(idx as u32), entry))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundError {
    pub span: InputSpan,
    pub message: String,
}

//------------------------------------------------------------------------------
// Members
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BoundMember {
    Method(BoundMethod),
    Constructor(BoundConstructor),
    Error(BoundErrorMember),
}

impl BoundMember {
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            BoundMember::Method(v) => Some(v.symbol),
            BoundMember::Constructor(v) => Some(v.symbol),
            BoundMember::Error(_) => None,
        }
    }

    pub fn span(&self) -> InputSpan {
        match self {
            BoundMember::Method(v) => v.span,
            BoundMember::Constructor(v) => v.span,
            BoundMember::Error(v) => v.span,
        }
    }

    pub fn statements(&self) -> &[BoundStatement] {
        match self {
            BoundMember::Method(v) => &v.statements,
            BoundMember::Constructor(v) => &v.statements,
            BoundMember::Error(_) => &[],
        }
    }

    pub fn locals(&self) -> Option<&LocalsTable> {
        match self {
            BoundMember::Method(v) => Some(&v.locals),
            BoundMember::Constructor(v) => Some(&v.locals),
            BoundMember::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            BoundMember::Error(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundMethod {
    pub span: InputSpan,
    pub symbol: SymbolId,
    pub statements: Vec<BoundStatement>,
    pub locals: LocalsTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundConstructor {
    pub span: InputSpan,
    pub symbol: SymbolId,
    pub statements: Vec<BoundStatement>,
    pub locals: LocalsTable,
}

/// Sentinel produced when the binder is invoked with arguments it cannot
/// make sense of. Emission skips it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundErrorMember {
    pub span: InputSpan,
    pub diagnostics: Diagnostics,
}

//------------------------------------------------------------------------------
// Statements
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Block {
        span: InputSpan,
        statements: Vec<BoundStatement>,
    },
    Local {
        span: InputSpan,
        local: LocalId,
        initializer: BoundExpression,
    },
    Expression {
        span: InputSpan,
        expression: BoundExpression,
    },
    Return {
        span: InputSpan,
        expression: Option<BoundExpression>,
    },
    If {
        span: InputSpan,
        test: BoundExpression,
        true_body: Vec<BoundStatement>,
        false_body: Option<Vec<BoundStatement>>,
    },
    While {
        span: InputSpan,
        test: BoundExpression,
        body: Vec<BoundStatement>,
    },
    Error(BoundError),
}

impl BoundStatement {
    pub fn span(&self) -> InputSpan {
        use BoundStatement as BS;
        match self {
            BS::Block{ span, .. } |
            BS::Local{ span, .. } |
            BS::Expression{ span, .. } |
            BS::Return{ span, .. } |
            BS::If{ span, .. } |
            BS::While{ span, .. } => *span,
            BS::Error(error) => error.span,
        }
    }
}

//------------------------------------------------------------------------------
// Expressions
//------------------------------------------------------------------------------

/// Storage location that can be read and assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Parameter(u16),
    Local(LocalId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpression {
    pub span: InputSpan,
    pub ty: TypeRef,
    pub kind: BoundExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpressionKind {
    Literal(Literal),
    Variable(Variable),
    Binary {
        operator: BinaryOperator,
        left: Box<BoundExpression>,
        right: Box<BoundExpression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<BoundExpression>,
    },
    Assignment {
        target: Variable,
        value: Box<BoundExpression>,
    },
    ElementAssignment {
        target: Variable,
        index: Box<BoundExpression>,
        value: Box<BoundExpression>,
    },
    Call {
        method: SymbolId,
        arguments: Vec<BoundExpression>,
    },
    NewArchive {
        name: Box<BoundExpression>,
    },
    NewArray {
        element: PrimitiveType,
        length: Box<BoundExpression>,
    },
    Index {
        subject: Box<BoundExpression>,
        index: Box<BoundExpression>,
    },
    Length {
        subject: Box<BoundExpression>,
    },
    Copy {
        subject: Box<BoundExpression>,
    },
    Error(BoundError),
}

impl BoundExpression {
    pub(crate) fn error<S: ToString>(span: InputSpan, message: S) -> Self {
        Self{
            span,
            ty: TypeRef::Error,
            kind: BoundExpressionKind::Error(BoundError{ span, message: message.to_string() }),
        }
    }

    /// Visits all error nodes in this expression, depth first.
    pub(crate) fn collect_errors<'a>(&'a self, errors: &mut Vec<&'a BoundError>) {
        use BoundExpressionKind as BEK;
        match &self.kind {
            BEK::Literal(_) | BEK::Variable(_) => {},
            BEK::Binary{ left, right, .. } => {
                left.collect_errors(errors);
                right.collect_errors(errors);
            },
            BEK::Unary{ operand, .. } => operand.collect_errors(errors),
            BEK::Assignment{ value, .. } => value.collect_errors(errors),
            BEK::ElementAssignment{ index, value, .. } => {
                index.collect_errors(errors);
                value.collect_errors(errors);
            },
            BEK::Call{ arguments, .. } => {
                for argument in arguments {
                    argument.collect_errors(errors);
                }
            },
            BEK::NewArchive{ name } => name.collect_errors(errors),
            BEK::NewArray{ length, .. } => length.collect_errors(errors),
            BEK::Index{ subject, index } => {
                subject.collect_errors(errors);
                index.collect_errors(errors);
            },
            BEK::Length{ subject } | BEK::Copy{ subject } => subject.collect_errors(errors),
            BEK::Error(error) => errors.push(error),
        }
    }
}

impl BoundStatement {
    pub(crate) fn collect_errors<'a>(&'a self, errors: &mut Vec<&'a BoundError>) {
        use BoundStatement as BS;
        match self {
            BS::Block{ statements, .. } => {
                for statement in statements {
                    statement.collect_errors(errors);
                }
            },
            BS::Local{ initializer, .. } => initializer.collect_errors(errors),
            BS::Expression{ expression, .. } => expression.collect_errors(errors),
            BS::Return{ expression, .. } => {
                if let Some(expression) = expression {
                    expression.collect_errors(errors);
                }
            },
            BS::If{ test, true_body, false_body, .. } => {
                test.collect_errors(errors);
                for statement in true_body {
                    statement.collect_errors(errors);
                }
                if let Some(false_body) = false_body {
                    for statement in false_body {
                        statement.collect_errors(errors);
                    }
                }
            },
            BS::While{ test, body, .. } => {
                test.collect_errors(errors);
                for statement in body {
                    statement.collect_errors(errors);
                }
            },
            BS::Error(error) => errors.push(error),
        }
    }
}
