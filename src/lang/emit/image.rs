/// image.rs
///
/// In-memory form of an emitted program and its binary encoding. The binary
/// layout is a fixed header, the constant records, the string pool and then
/// every member as a header, its parameter type tags and its code. All
/// integers are little-endian and records are packed without padding:
///
///   ImageHeader    magic "QIMG", version u16, constant_count u32,
///                  string_pool_len u32, member_count u32
///   ConstantRecord tag u8, payload u64
///   MemberHeader   name u32, kind u8, return_type u8, parameter_count u16,
///                  local_count u16, code_len u32
///
/// Loading validates everything the interpreter relies on, so a loaded image
/// never refers to constants, slots, members or branch targets that do not
/// exist.

use std::fmt;
use std::convert::TryFrom;

use bincode::Options;
use serde::{Serialize, Deserialize};

use crate::lang::ast::Literal;
use super::opcode::{Instruction, OpCode, TypeTag};

pub const IMAGE_MAGIC: [u8; 4] = *b"QIMG";
pub const IMAGE_VERSION: u16 = 1;

const TAG_BOOL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;

#[derive(Debug, Serialize, Deserialize)]
struct ImageHeader {
    magic: [u8; 4],
    version: u16,
    constant_count: u32,
    string_pool_len: u32,
    member_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConstantRecord {
    tag: u8,
    payload: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MemberHeader {
    name: u32,
    kind: u8,
    return_type: u8,
    parameter_count: u16,
    local_count: u16,
    code_len: u32,
}

fn bincode_opts() -> impl bincode::Options {
    // fixed width integers, so records have the documented sizes
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method = 0,
    Constructor = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberCode {
    /// Index of the string constant holding `Type.member`
    pub name: u32,
    pub kind: MemberKind,
    pub return_type: TypeTag,
    pub parameters: Vec<TypeTag>,
    pub num_locals: u16,
    pub instructions: Vec<Instruction>,
}

impl MemberCode {
    /// Whether a `Ret` of this member hands a value to the caller.
    /// Constructors return whatever is left on the stack, if anything.
    pub fn returns_value(&self) -> Option<bool> {
        match self.kind {
            MemberKind::Method => Some(self.return_type != TypeTag::VOID),
            MemberKind::Constructor => None,
        }
    }

    fn code_len(&self) -> usize {
        self.instructions.iter().map(|v| v.encoded_len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    constants: Vec<Literal>,
    members: Vec<MemberCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Truncated,
    BadMagic,
    UnsupportedVersion(u16),
    TrailingBytes,
    InvalidConstant{ index: u32 },
    InvalidMember{ member: u32, reason: &'static str },
    InvalidOpcode{ member: u32, offset: u32, opcode: u8 },
    InvalidOperand{ member: u32, instruction: u32, opcode: OpCode, operand: u32 },
    MissingReturn{ member: u32 },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LoadError as LE;
        match self {
            LE::Truncated => write!(f, "image is truncated"),
            LE::BadMagic => write!(f, "not an image (bad magic)"),
            LE::UnsupportedVersion(v) => write!(f, "unsupported image version {}", v),
            LE::TrailingBytes => write!(f, "unexpected bytes after the last member"),
            LE::InvalidConstant{ index } => write!(f, "constant {} is malformed", index),
            LE::InvalidMember{ member, reason } => write!(f, "member {} is malformed: {}", member, reason),
            LE::InvalidOpcode{ member, offset, opcode } => write!(
                f, "member {} has an invalid opcode 0x{:02x} at byte {}", member, opcode, offset
            ),
            LE::InvalidOperand{ member, instruction, opcode, operand } => write!(
                f, "member {} instruction {} ({}) has an invalid operand {}", member, instruction, opcode, operand
            ),
            LE::MissingReturn{ member } => write!(f, "member {} does not end in Ret", member),
        }
    }
}

impl Image {
    /// Creates an image from its parts, validating it the same way
    /// `from_bytes` does.
    pub fn new(constants: Vec<Literal>, members: Vec<MemberCode>) -> Result<Image, LoadError> {
        let image = Image{ constants, members };
        image.validate()?;
        Ok(image)
    }

    pub(crate) fn empty() -> Image {
        Image{ constants: Vec::new(), members: Vec::new() }
    }

    pub fn constants(&self) -> &[Literal] {
        &self.constants
    }

    pub fn members(&self) -> &[MemberCode] {
        &self.members
    }

    pub fn member(&self, index: u32) -> &MemberCode {
        &self.members[index as usize]
    }

    pub fn member_name(&self, index: u32) -> &str {
        match self.constants.get(self.members[index as usize].name as usize) {
            Some(Literal::String(name)) => name,
            _ => "<unnamed>",
        }
    }

    /// Finds a member by its qualified name, e.g. `Program.main`.
    pub fn member_index(&self, name: &str) -> Option<u32> {
        (0..self.members.len() as u32).find(|idx| self.member_name(*idx) == name)
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = Vec::new();
        let mut records = Vec::with_capacity(self.constants.len());
        for constant in &self.constants {
            let (tag, payload) = match constant {
                Literal::Bool(v) => (TAG_BOOL, *v as u64),
                Literal::Int(v) => (TAG_INT, *v as i64 as u64),
                Literal::Long(v) => (TAG_LONG, *v as u64),
                Literal::Float(v) => (TAG_FLOAT, v.to_bits()),
                Literal::String(v) => {
                    let offset = pool.len() as u64;
                    pool.extend_from_slice(v.as_bytes());
                    (TAG_STRING, offset | ((v.len() as u64) << 32))
                },
            };
            records.push(ConstantRecord{ tag, payload });
        }

        let mut bytes = Vec::new();
        write_record(&mut bytes, &ImageHeader{
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            constant_count: records.len() as u32,
            string_pool_len: pool.len() as u32,
            member_count: self.members.len() as u32,
        });
        for record in &records {
            write_record(&mut bytes, record);
        }
        bytes.extend_from_slice(&pool);

        for member in &self.members {
            write_record(&mut bytes, &MemberHeader{
                name: member.name,
                kind: member.kind as u8,
                return_type: member.return_type.0,
                parameter_count: member.parameters.len() as u16,
                local_count: member.num_locals,
                code_len: member.code_len() as u32,
            });
            bytes.extend(member.parameters.iter().map(|v| v.0));
            for instruction in &member.instructions {
                bytes.push(instruction.opcode as u8);
                if instruction.opcode.has_operand() {
                    bytes.extend_from_slice(&instruction.operand.to_le_bytes());
                }
            }
        }

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Image, LoadError> {
        let mut reader = bytes;
        let header: ImageHeader = read_record(&mut reader)?;
        if header.magic != IMAGE_MAGIC {
            return Err(LoadError::BadMagic);
        }
        if header.version != IMAGE_VERSION {
            return Err(LoadError::UnsupportedVersion(header.version));
        }

        let mut records = Vec::with_capacity(header.constant_count.min(1024) as usize);
        for _ in 0..header.constant_count {
            let record: ConstantRecord = read_record(&mut reader)?;
            records.push(record);
        }
        let pool = take(&mut reader, header.string_pool_len as usize)?;

        let mut constants = Vec::with_capacity(records.len());
        let mut pool_offset = 0;
        for (index, record) in records.iter().enumerate() {
            let index = index as u32;
            let invalid = LoadError::InvalidConstant{ index };
            let constant = match record.tag {
                TAG_BOOL => match record.payload {
                    0 => Literal::Bool(false),
                    1 => Literal::Bool(true),
                    _ => return Err(invalid),
                },
                TAG_INT => {
                    let value = i32::try_from(record.payload as i64).map_err(|_| invalid.clone())?;
                    Literal::Int(value)
                },
                TAG_LONG => Literal::Long(record.payload as i64),
                TAG_FLOAT => Literal::Float(f64::from_bits(record.payload)),
                TAG_STRING => {
                    // strings are stored back to back, in constant order
                    let offset = (record.payload & 0xFFFF_FFFF) as usize;
                    let len = (record.payload >> 32) as usize;
                    if offset != pool_offset || offset + len > pool.len() {
                        return Err(invalid);
                    }
                    pool_offset += len;
                    match std::str::from_utf8(&pool[offset..offset + len]) {
                        Ok(v) => Literal::String(v.to_string()),
                        Err(_) => return Err(invalid),
                    }
                },
                _ => return Err(invalid),
            };
            constants.push(constant);
        }
        if pool_offset != pool.len() {
            return Err(LoadError::InvalidConstant{ index: header.constant_count });
        }

        let mut members = Vec::with_capacity(header.member_count.min(1024) as usize);
        for member_index in 0..header.member_count {
            let member_header: MemberHeader = read_record(&mut reader)?;
            let kind = match member_header.kind {
                0 => MemberKind::Method,
                1 => MemberKind::Constructor,
                _ => return Err(LoadError::InvalidMember{ member: member_index, reason: "unknown member kind" }),
            };
            let parameters = take(&mut reader, member_header.parameter_count as usize)?
                .iter()
                .map(|v| TypeTag(*v))
                .collect();
            let code = take(&mut reader, member_header.code_len as usize)?;
            let instructions = decode_instructions(member_index, code)?;

            members.push(MemberCode{
                name: member_header.name,
                kind,
                return_type: TypeTag(member_header.return_type),
                parameters,
                num_locals: member_header.local_count,
                instructions,
            });
        }

        if !reader.is_empty() {
            return Err(LoadError::TrailingBytes);
        }

        Image::new(constants, members)
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate(&self) -> Result<(), LoadError> {
        let num_members = self.members.len();
        for (member_index, member) in self.members.iter().enumerate() {
            let member_index = member_index as u32;
            let invalid_member = |reason| LoadError::InvalidMember{ member: member_index, reason };

            match self.constants.get(member.name as usize) {
                Some(Literal::String(_)) => {},
                _ => return Err(invalid_member("name is not a string constant")),
            }
            if !member.return_type.is_valid() {
                return Err(invalid_member("invalid return type"));
            }
            if member.kind == MemberKind::Constructor && member.return_type != TypeTag::VOID {
                return Err(invalid_member("constructors have no declared return type"));
            }
            if member.parameters.len() > u16::MAX as usize {
                return Err(invalid_member("too many parameters"));
            }
            if member.parameters.iter().any(|v| !v.is_valid() || *v == TypeTag::VOID) {
                return Err(invalid_member("invalid parameter type"));
            }

            let num_instructions = member.instructions.len();
            for (instruction_index, instruction) in member.instructions.iter().enumerate() {
                let operand = instruction.operand as usize;
                let valid = match instruction.opcode {
                    OpCode::Ldc => operand < self.constants.len(),
                    OpCode::Ldarg | OpCode::Starg => operand < member.parameters.len(),
                    OpCode::Ldloc | OpCode::Stloc => operand < member.num_locals as usize,
                    OpCode::Newarr => operand <= 0xFF && TypeTag(operand as u8).as_primitive().is_some(),
                    OpCode::Call => operand < num_members,
                    OpCode::Br | OpCode::Brtrue | OpCode::Brfalse => operand < num_instructions,
                    _ => operand == 0,
                };
                if !valid {
                    return Err(LoadError::InvalidOperand{
                        member: member_index,
                        instruction: instruction_index as u32,
                        opcode: instruction.opcode,
                        operand: instruction.operand,
                    });
                }
            }

            match member.instructions.last() {
                Some(last) if last.opcode == OpCode::Ret => {},
                _ => return Err(LoadError::MissingReturn{ member: member_index }),
            }
        }

        Ok(())
    }
}

fn write_record<T: Serialize>(bytes: &mut Vec<u8>, record: &T) {
    bincode_opts().serialize_into(bytes, record).expect("Serialize failed!");
}

fn read_record<T: serde::de::DeserializeOwned>(reader: &mut &[u8]) -> Result<T, LoadError> {
    bincode_opts().deserialize_from(reader).map_err(|_| LoadError::Truncated)
}

fn take<'a>(reader: &mut &'a [u8], len: usize) -> Result<&'a [u8], LoadError> {
    if reader.len() < len {
        return Err(LoadError::Truncated);
    }
    let (taken, rest) = reader.split_at(len);
    *reader = rest;
    Ok(taken)
}

fn decode_instructions(member: u32, mut code: &[u8]) -> Result<Vec<Instruction>, LoadError> {
    let code_len = code.len();
    let mut instructions = Vec::new();
    while let Some((&byte, rest)) = code.split_first() {
        let offset = (code_len - code.len()) as u32;
        let opcode = OpCode::from_u8(byte)
            .ok_or(LoadError::InvalidOpcode{ member, offset, opcode: byte })?;
        code = rest;

        let instruction = if opcode.has_operand() {
            let operand = take(&mut code, 4)?;
            let operand = u32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
            Instruction::with_operand(opcode, operand)
        } else {
            Instruction::new(opcode)
        };
        instructions.push(instruction);
    }

    Ok(instructions)
}

impl fmt::Display for Image {
    /// Disassembly listing, mostly for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constants:")?;
        for (idx, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  [{}] {}", idx, constant)?;
        }
        for (idx, member) in self.members.iter().enumerate() {
            let parameters: Vec<String> = member.parameters.iter().map(|v| v.name()).collect();
            writeln!(
                f, "{} {}({}) -> {}, {} local(s):",
                match member.kind { MemberKind::Method => "method", MemberKind::Constructor => "ctor" },
                self.member_name(idx as u32), parameters.join(", "), member.return_type.name(), member.num_locals
            )?;
            for (pc, instruction) in member.instructions.iter().enumerate() {
                writeln!(f, "  {:4}: {}", pc, instruction)?;
            }
        }

        Ok(())
    }
}
