#[macro_use]
mod macros;

mod common;
pub mod lang;
pub mod runtime;

pub use lang::{compile, CompileOutput, Image, MemberUnit};
pub use runtime::{Argument, DummyLogger, FileLogger, Logger, RuntimeObject, Session, SessionConfig, VecLogger};

#[cfg(feature = "ffi")]
pub mod ffi;
