use crate::common::*;
use crate::lang::eval::{EvalError, RuntimeTypeKind};
use crate::lang::TypeTag;

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    UnknownMember(String),
    WrongNumberOfArguments { member: String, expected: usize, got: usize },
    ArgumentTypeMismatch { member: String, index: usize, expected: TypeTag, got: RuntimeTypeKind },
    /// An `Argument::Object` that does not live on the session's heap
    ForeignObject { member: String, index: usize },
    /// Evaluation started but faulted
    Eval(EvalError),
}
#[derive(Debug, derive_more::From)]
pub enum SaveError {
    #[from(ignore)]
    NotAnArchive,
    Io(std::io::Error),
}
/////////////////////
impl From<EvalError> for InvokeError {
    fn from(e: EvalError) -> Self {
        Self::Eval(e)
    }
}
impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use InvokeError::*;
        match self {
            UnknownMember(name) => write!(f, "image has no member named '{}'", name),
            WrongNumberOfArguments { member, expected, got } => {
                write!(f, "'{}' expects {} argument(s), got {}", member, expected, got)
            }
            ArgumentTypeMismatch { member, index, expected, got } => write!(
                f,
                "argument {} of '{}' must be of type '{}', got '{}'",
                index,
                member,
                expected.name(),
                crate::lang::eval::runtime_type(*got).name
            ),
            ForeignObject { member, index } => {
                write!(f, "argument {} of '{}' is not an object on this session's heap", index, member)
            }
            Eval(e) => std::fmt::Display::fmt(e, f),
        }
    }
}
impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::NotAnArchive => write!(f, "only archives can be saved"),
            SaveError::Io(e) => write!(f, "failed to save archive: {}", e),
        }
    }
}
