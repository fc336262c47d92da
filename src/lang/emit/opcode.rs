use std::fmt;

use crate::lang::symbols::{PrimitiveType, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0,
    Ldc,
    Ldarg,
    Starg,
    Ldloc,
    Stloc,
    Pop,
    Dup,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    And,
    Or,
    Xor,
    Ceq,
    Cne,
    Clt,
    Cgt,
    Cle,
    Cge,
    Newarr,
    Ldelem,
    Stelem,
    Ldlen,
    Newarc,
    Copy,
    Call,
    Ret,
    Br,
    Brtrue,
    Brfalse,
}

const ALL_OPCODES: [OpCode; 35] = [
    OpCode::Nop, OpCode::Ldc, OpCode::Ldarg, OpCode::Starg, OpCode::Ldloc, OpCode::Stloc,
    OpCode::Pop, OpCode::Dup, OpCode::Add, OpCode::Sub, OpCode::Mul, OpCode::Div, OpCode::Rem,
    OpCode::Neg, OpCode::Not, OpCode::And, OpCode::Or, OpCode::Xor, OpCode::Ceq, OpCode::Cne,
    OpCode::Clt, OpCode::Cgt, OpCode::Cle, OpCode::Cge, OpCode::Newarr, OpCode::Ldelem,
    OpCode::Stelem, OpCode::Ldlen, OpCode::Newarc, OpCode::Copy, OpCode::Call, OpCode::Ret,
    OpCode::Br, OpCode::Brtrue, OpCode::Brfalse,
];

impl OpCode {
    pub fn from_u8(value: u8) -> Option<OpCode> {
        ALL_OPCODES.get(value as usize).copied()
    }

    /// Whether the opcode is followed by a 4-byte operand in the instruction
    /// stream.
    pub fn has_operand(&self) -> bool {
        use OpCode::*;
        match self {
            Ldc | Ldarg | Starg | Ldloc | Stloc | Newarr | Call | Br | Brtrue | Brfalse => true,
            _ => false,
        }
    }

    pub fn is_branch(&self) -> bool {
        match self {
            OpCode::Br | OpCode::Brtrue | OpCode::Brfalse => true,
            _ => false,
        }
    }

    /// Operators dispatched to the object on top of the stack.
    pub fn is_unary_operator(&self) -> bool {
        match self {
            OpCode::Neg | OpCode::Not => true,
            _ => false,
        }
    }

    pub fn is_binary_operator(&self) -> bool {
        use OpCode::*;
        match self {
            Add | Sub | Mul | Div | Rem | And | Or | Xor | Ceq | Cne | Clt | Cgt | Cle | Cge => true,
            _ => false,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: u32,
}

impl Instruction {
    pub fn new(opcode: OpCode) -> Self {
        debug_assert!(!opcode.has_operand());
        Self{ opcode, operand: 0 }
    }

    pub fn with_operand(opcode: OpCode, operand: u32) -> Self {
        debug_assert!(opcode.has_operand());
        Self{ opcode, operand }
    }

    /// Size of the encoded instruction in bytes.
    pub fn encoded_len(&self) -> usize {
        if self.opcode.has_operand() { 5 } else { 1 }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.has_operand() {
            write!(f, "{} {}", self.opcode, self.operand)
        } else {
            write!(f, "{}", self.opcode)
        }
    }
}

/// Type tags as written for parameter and return types in member headers,
/// and as the operand of `Newarr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(pub u8);

impl TypeTag {
    pub const VOID: TypeTag = TypeTag(0);
    pub const BOOL: TypeTag = TypeTag(1);
    pub const INT: TypeTag = TypeTag(2);
    pub const LONG: TypeTag = TypeTag(3);
    pub const FLOAT: TypeTag = TypeTag(4);
    pub const STRING: TypeTag = TypeTag(5);
    pub const ARCHIVE: TypeTag = TypeTag(6);
    pub const GENERIC: TypeTag = TypeTag(7);
    const ARRAY_FLAG: u8 = 0x10;

    pub fn primitive(primitive: PrimitiveType) -> TypeTag {
        match primitive {
            PrimitiveType::Bool => TypeTag::BOOL,
            PrimitiveType::Int => TypeTag::INT,
            PrimitiveType::Long => TypeTag::LONG,
            PrimitiveType::Float => TypeTag::FLOAT,
        }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match *self {
            TypeTag::BOOL => Some(PrimitiveType::Bool),
            TypeTag::INT => Some(PrimitiveType::Int),
            TypeTag::LONG => Some(PrimitiveType::Long),
            TypeTag::FLOAT => Some(PrimitiveType::Float),
            _ => None,
        }
    }

    pub fn array(element: PrimitiveType) -> TypeTag {
        TypeTag(Self::ARRAY_FLAG | TypeTag::primitive(element).0)
    }

    /// Element type if this is an array tag.
    pub fn array_element(&self) -> Option<PrimitiveType> {
        if self.0 & Self::ARRAY_FLAG == 0 {
            return None;
        }
        TypeTag(self.0 & !Self::ARRAY_FLAG).as_primitive()
    }

    pub fn from_type_ref(ty: &TypeRef) -> TypeTag {
        match ty {
            TypeRef::Void | TypeRef::Error => TypeTag::VOID,
            TypeRef::Primitive(v) => TypeTag::primitive(*v),
            TypeRef::String => TypeTag::STRING,
            TypeRef::Archive => TypeTag::ARCHIVE,
            TypeRef::Array(v) => TypeTag::array(*v),
            TypeRef::Generic(_) => TypeTag::GENERIC,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0 <= TypeTag::GENERIC.0 || self.array_element().is_some()
    }

    pub fn name(&self) -> String {
        match *self {
            TypeTag::VOID => String::from("void"),
            TypeTag::STRING => String::from("string"),
            TypeTag::ARCHIVE => String::from("archive"),
            TypeTag::GENERIC => String::from("generic"),
            tag => match (tag.as_primitive(), tag.array_element()) {
                (Some(v), _) => String::from(v.name()),
                (None, Some(v)) => format!("{}[]", v.name()),
                (None, None) => format!("<invalid type tag {}>", tag.0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbering() {
        for (idx, opcode) in ALL_OPCODES.iter().enumerate() {
            assert_eq!(*opcode as u8 as usize, idx);
            assert_eq!(OpCode::from_u8(idx as u8), Some(*opcode));
        }
        assert_eq!(OpCode::from_u8(ALL_OPCODES.len() as u8), None);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(TypeTag::array(PrimitiveType::Long), TypeTag(0x13));
        assert_eq!(TypeTag(0x13).array_element(), Some(PrimitiveType::Long));
        assert_eq!(TypeTag::INT.array_element(), None);
        assert!(TypeTag::GENERIC.is_valid());
        assert!(!TypeTag(0x08).is_valid());
        assert!(!TypeTag(0x15).is_valid());
        assert_eq!(TypeTag(0x14).name(), "float[]");
    }
}
