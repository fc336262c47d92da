/// ast.rs
///
/// Syntax tree of member bodies as handed to the binder. Producing this tree
/// (lexing, parsing) happens before binding and is not part of this crate:
/// hosts construct the nodes directly. Every node carries the span it was
/// parsed from so diagnostics can point back into the source.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputPosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSpan {
    pub begin: InputPosition,
    pub end: InputPosition,
}

impl InputSpan {
    /// A span covering a single position, the typical case for synthesized
    /// syntax.
    pub fn at(line: u32, column: u32) -> Self {
        let pos = InputPosition{ line, column };
        Self{ begin: pos, end: pos }
    }
}

impl fmt::Display for InputSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.begin.line, self.begin.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub span: InputSpan,
    pub value: String,
}

impl Identifier {
    pub fn new<S: ToString>(span: InputSpan, value: S) -> Self {
        Self{ span, value: value.to_string() }
    }
}

/// Type as written in the source, e.g. `int`, `archive`, `T` or `long[]`.
/// Resolved into a `TypeRef` by the binder.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSyntax {
    pub span: InputSpan,
    pub name: String,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{}", v),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::String(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equality,
    Inequality,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        use BinaryOperator as BO;
        match self {
            BO::Add => "+",
            BO::Subtract => "-",
            BO::Multiply => "*",
            BO::Divide => "/",
            BO::Remainder => "%",
            BO::Equality => "==",
            BO::Inequality => "!=",
            BO::LessThan => "<",
            BO::GreaterThan => ">",
            BO::LessThanEqual => "<=",
            BO::GreaterThanEqual => ">=",
            BO::LogicalAnd => "&&",
            BO::LogicalOr => "||",
            BO::BitwiseAnd => "&",
            BO::BitwiseOr => "|",
            BO::BitwiseXor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Positive,
    Negative,
    LogicalNot,
    BitwiseNot,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Positive => "+",
            UnaryOperator::Negative => "-",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
        }
    }
}

//------------------------------------------------------------------------------
// Members
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MemberSyntax {
    Method(MethodDeclarationSyntax),
    Constructor(ConstructorDeclarationSyntax),
}

impl MemberSyntax {
    pub fn span(&self) -> InputSpan {
        match self {
            MemberSyntax::Method(v) => v.span,
            MemberSyntax::Constructor(v) => v.span,
        }
    }

    pub fn body(&self) -> &BlockSyntax {
        match self {
            MemberSyntax::Method(v) => &v.body,
            MemberSyntax::Constructor(v) => &v.body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclarationSyntax {
    pub span: InputSpan,
    pub identifier: Identifier,
    pub body: BlockSyntax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDeclarationSyntax {
    pub span: InputSpan,
    pub body: BlockSyntax,
}

//------------------------------------------------------------------------------
// Statements
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSyntax {
    pub span: InputSpan,
    pub statements: Vec<StatementSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementSyntax {
    Block(BlockSyntax),
    Local(LocalStatementSyntax),
    Expression(ExpressionStatementSyntax),
    Return(ReturnStatementSyntax),
    If(IfStatementSyntax),
    While(WhileStatementSyntax),
}

impl StatementSyntax {
    pub fn span(&self) -> InputSpan {
        match self {
            StatementSyntax::Block(v) => v.span,
            StatementSyntax::Local(v) => v.span,
            StatementSyntax::Expression(v) => v.span,
            StatementSyntax::Return(v) => v.span,
            StatementSyntax::If(v) => v.span,
            StatementSyntax::While(v) => v.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalStatementSyntax {
    pub span: InputSpan,
    pub type_annotation: TypeSyntax,
    pub identifier: Identifier,
    pub initializer: Option<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatementSyntax {
    pub span: InputSpan,
    pub expression: ExpressionSyntax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatementSyntax {
    pub span: InputSpan,
    pub expression: Option<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatementSyntax {
    pub span: InputSpan,
    pub test: ExpressionSyntax,
    pub true_body: BlockSyntax,
    pub false_body: Option<BlockSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatementSyntax {
    pub span: InputSpan,
    pub test: ExpressionSyntax,
    pub body: BlockSyntax,
}

//------------------------------------------------------------------------------
// Expressions
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionSyntax {
    Literal {
        span: InputSpan,
        value: Literal,
    },
    Name(Identifier),
    Binary {
        span: InputSpan,
        operator: BinaryOperator,
        left: Box<ExpressionSyntax>,
        right: Box<ExpressionSyntax>,
    },
    Unary {
        span: InputSpan,
        operator: UnaryOperator,
        operand: Box<ExpressionSyntax>,
    },
    Assignment {
        span: InputSpan,
        target: Identifier,
        value: Box<ExpressionSyntax>,
    },
    ElementAssignment {
        span: InputSpan,
        target: Identifier,
        index: Box<ExpressionSyntax>,
        value: Box<ExpressionSyntax>,
    },
    // `method(args)` or `Type.method(args)`
    Call {
        span: InputSpan,
        target_type: Option<Identifier>,
        method: Identifier,
        arguments: Vec<ExpressionSyntax>,
    },
    NewArchive {
        span: InputSpan,
        name: Box<ExpressionSyntax>,
    },
    NewArray {
        span: InputSpan,
        element_type: TypeSyntax,
        length: Box<ExpressionSyntax>,
    },
    Index {
        span: InputSpan,
        subject: Box<ExpressionSyntax>,
        index: Box<ExpressionSyntax>,
    },
    Length {
        span: InputSpan,
        subject: Box<ExpressionSyntax>,
    },
    Copy {
        span: InputSpan,
        subject: Box<ExpressionSyntax>,
    },
}

impl ExpressionSyntax {
    pub fn span(&self) -> InputSpan {
        use ExpressionSyntax as ES;
        match self {
            ES::Literal{ span, .. } |
            ES::Binary{ span, .. } |
            ES::Unary{ span, .. } |
            ES::Assignment{ span, .. } |
            ES::ElementAssignment{ span, .. } |
            ES::Call{ span, .. } |
            ES::NewArchive{ span, .. } |
            ES::NewArray{ span, .. } |
            ES::Index{ span, .. } |
            ES::Length{ span, .. } |
            ES::Copy{ span, .. } => *span,
            ES::Name(identifier) => identifier.span,
        }
    }
}
