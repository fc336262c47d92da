/// eval
///
/// Interpreter for emitted images. Execution always happens within a stack
/// frame: the first frame belongs to the member invoked by the host, every
/// `Call` pushes another one. Frames hold their arguments, locals and
/// operands as references to objects in the `Heap`.
///
/// Objects are never mutated once allocated. Operations (including storing
/// an array element) allocate a new object through the frame that executes
/// them and leave their operands as they were. As a consequence the heap
/// only grows while a program runs; memory is given back in bulk, either by
/// the host or (see `ReclaimPolicy`) when a member returns.

mod error;
mod executor;
mod object;
mod store;
mod types;

pub use error::{EvalError, EvalFrame, RuntimeFault};
pub use executor::{EvalConfig, EvalContinuation, Prompt, ReclaimPolicy, StackFrame};
pub use object::{
    Address, Argument, ArchiveObject, ArrayObject, ForeignDocument, OpaqueDocument,
    PrimitiveObject, PrimitiveValue, RuntimeObject, StringObject,
};
pub use store::Heap;
pub use types::{runtime_type, runtime_type_by_name, RuntimeType, RuntimeTypeKind};
