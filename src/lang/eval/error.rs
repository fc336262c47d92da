use std::fmt;

use crate::lang::emit::opcode::OpCode;

/// Failure while executing an instruction. A fault aborts the complete call
/// stack, there is no way to recover from one within the running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeFault {
    InvalidOperation {
        opcode: OpCode,
        type_name: &'static str,
        other: Option<&'static str>,
    },
    DivideByZero,
    IndexOutOfBounds { index: i32, length: u32 },
    NegativeArrayLength { length: i32 },
    OutOfMemory { requested: u32, available: u32 },
    UnassignedLocal { index: u32 },
    StackUnderflow,
    MissingReturnValue,
    CallDepthExceeded { max_depth: usize },
    ProgramCounterOutOfRange { pc: usize },
    /// An invocation named a member the image does not have
    UnknownMember { index: u32 },
    ArgumentCountMismatch { expected: usize, got: usize },
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RuntimeFault as RF;
        match self {
            RF::InvalidOperation{ opcode, type_name, other: None } => {
                write!(f, "invalid operation {} for type '{}'", opcode, type_name)
            },
            RF::InvalidOperation{ opcode, type_name, other: Some(other) } => {
                write!(f, "invalid operation {} for type '{}' with operand of type '{}'", opcode, type_name, other)
            },
            RF::DivideByZero => write!(f, "division by zero"),
            RF::IndexOutOfBounds{ index, length } => {
                write!(f, "index {} is out of bounds for an array of length {}", index, length)
            },
            RF::NegativeArrayLength{ length } => write!(f, "cannot create an array of length {}", length),
            RF::OutOfMemory{ requested, available } => {
                write!(f, "out of heap memory: requested {} byte(s), {} available", requested, available)
            },
            RF::UnassignedLocal{ index } => write!(f, "local {} is read before it is assigned", index),
            RF::StackUnderflow => write!(f, "operand stack underflow"),
            RF::MissingReturnValue => write!(f, "member ended without returning a value"),
            RF::CallDepthExceeded{ max_depth } => write!(f, "call depth exceeds the maximum of {}", max_depth),
            RF::ProgramCounterOutOfRange{ pc } => write!(f, "program counter {} is out of range", pc),
            RF::UnknownMember{ index } => write!(f, "image has no member {}", index),
            RF::ArgumentCountMismatch{ expected, got } => {
                write!(f, "expected {} argument(s), got {}", expected, got)
            },
        }
    }
}

/// A frame on the call stack at the time of a fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFrame {
    pub member: String,
    pub instruction: u32,
}

impl fmt::Display for EvalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", &self.member, self.instruction)
    }
}

/// Runtime fault together with the call stack it occurred in, innermost
/// frame last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub fault: RuntimeFault,
    pub frames: Vec<EvalFrame>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", &self.fault)?;
        writeln!(f, " +-  Stack trace:")?;
        for frame in self.frames.iter().rev() {
            write!(f, " | ")?;
            fmt::Display::fmt(frame, f)?;
            writeln!(f)?;
        }

        Ok(())
    }
}
