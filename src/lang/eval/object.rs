/// object.rs
///
/// The closed set of runtime objects. Every object lives at an address in
/// the `Heap` and is immutable: operations produce new objects, allocated
/// through the stack frame that executes them. Payloads are shared between
/// clones of the same object, cloning an object never copies it to a new
/// address (that is what `Copy` is for).

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::lang::emit::opcode::OpCode;
use crate::lang::symbols::PrimitiveType;

use super::error::RuntimeFault;
use super::executor::StackFrame;
use super::store::Heap;
use super::types::{runtime_type, RuntimeType, RuntimeTypeKind};

pub type Address = u32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
}

impl PrimitiveValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            PrimitiveValue::Bool(_) => PrimitiveType::Bool,
            PrimitiveValue::Int(_) => PrimitiveType::Int,
            PrimitiveValue::Long(_) => PrimitiveType::Long,
            PrimitiveValue::Float(_) => PrimitiveType::Float,
        }
    }

    pub fn default_of(primitive: PrimitiveType) -> PrimitiveValue {
        match primitive {
            PrimitiveType::Bool => PrimitiveValue::Bool(false),
            PrimitiveType::Int => PrimitiveValue::Int(0),
            PrimitiveType::Long => PrimitiveValue::Long(0),
            PrimitiveType::Float => PrimitiveValue::Float(0.0),
        }
    }

    /// Little-endian heap representation
    pub(crate) fn write_bytes(&self, bytes: &mut Vec<u8>) {
        match self {
            PrimitiveValue::Bool(v) => bytes.push(*v as u8),
            PrimitiveValue::Int(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Long(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Float(v) => bytes.extend_from_slice(&v.to_bits().to_le_bytes()),
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Bool(v) => write!(f, "{}", v),
            PrimitiveValue::Int(v) => write!(f, "{}", v),
            PrimitiveValue::Long(v) => write!(f, "{}", v),
            PrimitiveValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// Document owned by the host that a program can only pass around, compare
/// and persist. Its contents are never interpreted by the runtime.
pub trait ForeignDocument: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn write_data(&self, writer: &mut dyn io::Write) -> io::Result<()>;
}

/// Document holding an uninterpreted byte blob. Used for archives created by
/// programs through `new archive(name)`.
#[derive(Debug, Clone)]
pub struct OpaqueDocument {
    name: String,
    data: Vec<u8>,
}

impl OpaqueDocument {
    pub fn new(name: &str) -> Self {
        Self{ name: name.to_string(), data: Vec::new() }
    }

    pub fn with_data(name: &str, data: Vec<u8>) -> Self {
        Self{ name: name.to_string(), data }
    }
}

impl ForeignDocument for OpaqueDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_data(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        writer.write_all(&self.data)
    }
}

//------------------------------------------------------------------------------
// Objects
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PrimitiveObject {
    pub(crate) address: Address,
    pub(crate) value: PrimitiveValue,
}

#[derive(Debug, Clone)]
pub struct StringObject {
    pub(crate) address: Address,
    pub(crate) value: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct ArrayObject {
    pub(crate) address: Address,
    pub(crate) element: PrimitiveType,
    pub(crate) elements: Arc<[PrimitiveValue]>,
}

#[derive(Debug, Clone)]
pub struct ArchiveObject {
    pub(crate) address: Address,
    pub(crate) document: Arc<dyn ForeignDocument>,
}

#[derive(Debug, Clone)]
pub enum RuntimeObject {
    Primitive(PrimitiveObject),
    String(StringObject),
    Array(ArrayObject),
    Archive(ArchiveObject),
}

impl PrimitiveObject {
    pub fn value(&self) -> PrimitiveValue {
        self.value
    }
}

impl StringObject {
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl ArrayObject {
    pub fn element_type(&self) -> PrimitiveType {
        self.element
    }

    pub fn elements(&self) -> &[PrimitiveValue] {
        &self.elements
    }

    pub(crate) fn element_at(&self, index: i32) -> Result<PrimitiveValue, RuntimeFault> {
        if index < 0 || index as usize >= self.elements.len() {
            return Err(RuntimeFault::IndexOutOfBounds{ index, length: self.elements.len() as u32 });
        }
        Ok(self.elements[index as usize])
    }
}

impl ArchiveObject {
    pub fn document(&self) -> &Arc<dyn ForeignDocument> {
        &self.document
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        self.document.write_data(&mut file)?;
        io::Write::flush(&mut file)
    }
}

impl RuntimeObject {
    pub fn address(&self) -> Address {
        match self {
            RuntimeObject::Primitive(v) => v.address,
            RuntimeObject::String(v) => v.address,
            RuntimeObject::Array(v) => v.address,
            RuntimeObject::Archive(v) => v.address,
        }
    }

    pub fn runtime_type(&self) -> &'static RuntimeType {
        runtime_type(self.kind())
    }

    pub fn kind(&self) -> RuntimeTypeKind {
        match self {
            RuntimeObject::Primitive(v) => RuntimeTypeKind::Primitive(v.value.primitive_type()),
            RuntimeObject::String(_) => RuntimeTypeKind::String,
            RuntimeObject::Array(v) => RuntimeTypeKind::Array(v.element),
            RuntimeObject::Archive(_) => RuntimeTypeKind::Archive,
        }
    }

    /// Number of bytes the object occupies at its address.
    pub fn size(&self) -> u32 {
        let num_elements = match self {
            RuntimeObject::String(v) => v.value.len() as u32,
            RuntimeObject::Array(v) => v.elements.len() as u32,
            RuntimeObject::Primitive(_) | RuntimeObject::Archive(_) => 0,
        };
        self.runtime_type().size_with_elements(num_elements)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveValue> {
        match self {
            RuntimeObject::Primitive(v) => Some(v.value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            RuntimeObject::String(v) => Some(&v.value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayObject> {
        match self {
            RuntimeObject::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_archive(&self) -> Option<&ArchiveObject> {
        match self {
            RuntimeObject::Archive(v) => Some(v),
            _ => None,
        }
    }

    /// Heap representation: primitives little-endian, strings and arrays
    /// prefixed with their element count, archives as a zeroed handle.
    pub(crate) fn write_bytes(&self, bytes: &mut Vec<u8>) {
        match self {
            RuntimeObject::Primitive(v) => v.value.write_bytes(bytes),
            RuntimeObject::String(v) => {
                bytes.extend_from_slice(&(v.value.len() as u32).to_le_bytes());
                bytes.extend_from_slice(v.value.as_bytes());
            },
            RuntimeObject::Array(v) => {
                bytes.extend_from_slice(&(v.elements.len() as u32).to_le_bytes());
                for element in v.elements.iter() {
                    element.write_bytes(bytes);
                }
            },
            RuntimeObject::Archive(_) => {
                bytes.extend_from_slice(&[0; super::types::ARCHIVE_HANDLE_SIZE as usize]);
            },
        }
    }

    /// Whether `other` is this very object: same address, same variant and
    /// the same payload. Handles that survived a heap reset, or that come
    /// from another heap, fail this against whatever lives there now.
    pub fn is_same_object(&self, other: &RuntimeObject) -> bool {
        use RuntimeObject as RO;
        if self.address() != other.address() {
            return false;
        }
        match (self, other) {
            (RO::Primitive(a), RO::Primitive(b)) => match (a.value, b.value) {
                (PrimitiveValue::Float(x), PrimitiveValue::Float(y)) => x.to_bits() == y.to_bits(),
                (x, y) => x == y,
            },
            (RO::String(a), RO::String(b)) => Arc::ptr_eq(&a.value, &b.value),
            (RO::Array(a), RO::Array(b)) => a.element == b.element && Arc::ptr_eq(&a.elements, &b.elements),
            (RO::Archive(a), RO::Archive(b)) => {
                Arc::as_ptr(&a.document) as *const u8 == Arc::as_ptr(&b.document) as *const u8
            },
            _ => false,
        }
    }

    /// Same variant and contents, placed at `address`. The source object is
    /// left untouched. Archives keep referring to the same document.
    pub(crate) fn copy_to(&self, address: Address) -> RuntimeObject {
        match self {
            RuntimeObject::Primitive(v) => RuntimeObject::Primitive(PrimitiveObject{ address, value: v.value }),
            RuntimeObject::String(v) => RuntimeObject::String(StringObject{ address, value: v.value.clone() }),
            RuntimeObject::Array(v) => RuntimeObject::Array(ArrayObject{
                address, element: v.element, elements: v.elements.clone(),
            }),
            RuntimeObject::Archive(v) => RuntimeObject::Archive(ArchiveObject{
                address, document: v.document.clone(),
            }),
        }
    }

    /// Applies `opcode` with `self` as the (left) operand. Binary operators
    /// take the right operand as `other`, unary ones take none. Which opcodes
    /// are supported depends on the variant, anything else is an
    /// `InvalidOperation`.
    pub fn compute_operation(
        &self, opcode: OpCode, other: Option<&RuntimeObject>, frame: &mut StackFrame, heap: &mut Heap
    ) -> Result<RuntimeObject, RuntimeFault> {
        let invalid = || RuntimeFault::InvalidOperation{
            opcode,
            type_name: self.runtime_type().name,
            other: other.map(|v| v.runtime_type().name),
        };

        match (self, other) {
            (RuntimeObject::Primitive(lhs), None) => {
                let result = primitive_unary(opcode, lhs.value).ok_or_else(invalid)?;
                frame.allocate_primitive(heap, result)
            },
            (RuntimeObject::Primitive(lhs), Some(RuntimeObject::Primitive(rhs))) => {
                let result = primitive_binary(opcode, lhs.value, rhs.value)?.ok_or_else(invalid)?;
                frame.allocate_primitive(heap, result)
            },
            (RuntimeObject::String(lhs), Some(RuntimeObject::String(rhs))) => match opcode {
                OpCode::Add => {
                    let mut concatenated = String::with_capacity(lhs.value.len() + rhs.value.len());
                    concatenated.push_str(&lhs.value);
                    concatenated.push_str(&rhs.value);
                    frame.allocate_string(heap, &concatenated)
                },
                OpCode::Ceq => frame.allocate_primitive(heap, PrimitiveValue::Bool(lhs.value == rhs.value)),
                OpCode::Cne => frame.allocate_primitive(heap, PrimitiveValue::Bool(lhs.value != rhs.value)),
                _ => Err(invalid()),
            },
            (RuntimeObject::Array(lhs), Some(RuntimeObject::Array(rhs))) if lhs.element == rhs.element => {
                let equal = identity_comparison(opcode, lhs.address, rhs.address).ok_or_else(invalid)?;
                frame.allocate_primitive(heap, PrimitiveValue::Bool(equal))
            },
            (RuntimeObject::Archive(lhs), Some(RuntimeObject::Archive(rhs))) => {
                let equal = identity_comparison(opcode, lhs.address, rhs.address).ok_or_else(invalid)?;
                frame.allocate_primitive(heap, PrimitiveValue::Bool(equal))
            },
            _ => Err(invalid()),
        }
    }

    /// Form in which the host gets to see the object.
    pub fn display(&self) -> String {
        match self {
            RuntimeObject::Primitive(v) => v.value.to_string(),
            RuntimeObject::String(v) => v.value.to_string(),
            RuntimeObject::Array(v) => {
                let elements: Vec<String> = v.elements.iter().map(|v| v.to_string()).collect();
                format!("[{}]", elements.join(", "))
            },
            RuntimeObject::Archive(v) => v.document.name().to_string(),
        }
    }
}

fn identity_comparison(opcode: OpCode, lhs: Address, rhs: Address) -> Option<bool> {
    match opcode {
        OpCode::Ceq => Some(lhs == rhs),
        OpCode::Cne => Some(lhs != rhs),
        _ => None,
    }
}

fn primitive_unary(opcode: OpCode, value: PrimitiveValue) -> Option<PrimitiveValue> {
    use PrimitiveValue as PV;
    let result = match (opcode, value) {
        (OpCode::Not, PV::Bool(v)) => PV::Bool(!v),
        (OpCode::Neg, PV::Int(v)) => PV::Int(v.wrapping_neg()),
        (OpCode::Not, PV::Int(v)) => PV::Int(!v),
        (OpCode::Neg, PV::Long(v)) => PV::Long(v.wrapping_neg()),
        (OpCode::Not, PV::Long(v)) => PV::Long(!v),
        (OpCode::Neg, PV::Float(v)) => PV::Float(-v),
        _ => return None,
    };

    Some(result)
}

// Integer operations are identical for `int` and `long`, apart from the
// variant they wrap.
macro_rules! integer_binary {
    ($variant:path, $opcode:expr, $lhs:expr, $rhs:expr) => {{
        use PrimitiveValue as PV;
        let (lhs, rhs) = ($lhs, $rhs);
        let result = match $opcode {
            OpCode::Add => $variant(lhs.wrapping_add(rhs)),
            OpCode::Sub => $variant(lhs.wrapping_sub(rhs)),
            OpCode::Mul => $variant(lhs.wrapping_mul(rhs)),
            OpCode::Div => {
                if rhs == 0 { return Err(RuntimeFault::DivideByZero); }
                $variant(lhs.wrapping_div(rhs))
            },
            OpCode::Rem => {
                if rhs == 0 { return Err(RuntimeFault::DivideByZero); }
                $variant(lhs.wrapping_rem(rhs))
            },
            OpCode::And => $variant(lhs & rhs),
            OpCode::Or => $variant(lhs | rhs),
            OpCode::Xor => $variant(lhs ^ rhs),
            OpCode::Ceq => PV::Bool(lhs == rhs),
            OpCode::Cne => PV::Bool(lhs != rhs),
            OpCode::Clt => PV::Bool(lhs < rhs),
            OpCode::Cgt => PV::Bool(lhs > rhs),
            OpCode::Cle => PV::Bool(lhs <= rhs),
            OpCode::Cge => PV::Bool(lhs >= rhs),
            _ => return Ok(None),
        };
        Ok(Some(result))
    }};
}

/// `Ok(None)` if the opcode is not supported for the operand types
fn primitive_binary(opcode: OpCode, lhs: PrimitiveValue, rhs: PrimitiveValue) -> Result<Option<PrimitiveValue>, RuntimeFault> {
    use PrimitiveValue as PV;

    match (lhs, rhs) {
        (PV::Bool(lhs), PV::Bool(rhs)) => {
            let result = match opcode {
                OpCode::Ceq => lhs == rhs,
                OpCode::Cne => lhs != rhs,
                OpCode::And => lhs & rhs,
                OpCode::Or => lhs | rhs,
                OpCode::Xor => lhs ^ rhs,
                _ => return Ok(None),
            };
            Ok(Some(PV::Bool(result)))
        },
        (PV::Int(lhs), PV::Int(rhs)) => integer_binary!(PV::Int, opcode, lhs, rhs),
        (PV::Long(lhs), PV::Long(rhs)) => integer_binary!(PV::Long, opcode, lhs, rhs),
        (PV::Float(lhs), PV::Float(rhs)) => {
            let result = match opcode {
                OpCode::Add => PV::Float(lhs + rhs),
                OpCode::Sub => PV::Float(lhs - rhs),
                OpCode::Mul => PV::Float(lhs * rhs),
                OpCode::Div => PV::Float(lhs / rhs),
                OpCode::Rem => PV::Float(lhs % rhs),
                OpCode::Ceq => PV::Bool(lhs == rhs),
                OpCode::Cne => PV::Bool(lhs != rhs),
                OpCode::Clt => PV::Bool(lhs < rhs),
                OpCode::Cgt => PV::Bool(lhs > rhs),
                OpCode::Cle => PV::Bool(lhs <= rhs),
                OpCode::Cge => PV::Bool(lhs >= rhs),
                _ => return Ok(None),
            };
            Ok(Some(result))
        },
        // Mixed primitive types
        _ => Ok(None),
    }
}

/// Value handed to a member by the host.
#[derive(Debug, Clone)]
pub enum Argument {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    String(String),
    Array(PrimitiveType, Vec<PrimitiveValue>),
    Archive(Arc<dyn ForeignDocument>),
    /// An object previously returned by the runtime, passed as is
    Object(RuntimeObject),
}

impl Argument {
    pub fn kind(&self) -> RuntimeTypeKind {
        match self {
            Argument::Bool(_) => RuntimeTypeKind::Primitive(PrimitiveType::Bool),
            Argument::Int(_) => RuntimeTypeKind::Primitive(PrimitiveType::Int),
            Argument::Long(_) => RuntimeTypeKind::Primitive(PrimitiveType::Long),
            Argument::Float(_) => RuntimeTypeKind::Primitive(PrimitiveType::Float),
            Argument::String(_) => RuntimeTypeKind::String,
            Argument::Array(element, _) => RuntimeTypeKind::Array(*element),
            Argument::Archive(_) => RuntimeTypeKind::Archive,
            Argument::Object(object) => object.kind(),
        }
    }
}
