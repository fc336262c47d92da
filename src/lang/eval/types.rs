use std::collections::HashMap;

use crate::common::hashmap;
use crate::lang::symbols::PrimitiveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeTypeKind {
    Primitive(PrimitiveType),
    String,
    Array(PrimitiveType),
    Archive,
}

/// Descriptor of a builtin runtime type. An object of this type occupies
/// `base_size` bytes plus `element_size` bytes per element (strings count
/// their UTF-8 bytes as elements).
#[derive(Debug, PartialEq, Eq)]
pub struct RuntimeType {
    pub name: &'static str,
    pub kind: RuntimeTypeKind,
    pub base_size: u32,
    pub element_size: u32,
}

/// Size of the length header in front of string and array contents
pub const LENGTH_HEADER_SIZE: u32 = 4;
/// Size of the handle stored for a foreign archive
pub const ARCHIVE_HANDLE_SIZE: u32 = 8;

impl RuntimeType {
    fn primitive(name: &'static str, primitive: PrimitiveType) -> Self {
        Self{ name, kind: RuntimeTypeKind::Primitive(primitive), base_size: primitive.size(), element_size: 0 }
    }

    fn array(name: &'static str, element: PrimitiveType) -> Self {
        Self{ name, kind: RuntimeTypeKind::Array(element), base_size: LENGTH_HEADER_SIZE, element_size: element.size() }
    }

    pub fn size_with_elements(&self, num_elements: u32) -> u32 {
        self.base_size + self.element_size * num_elements
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN_TYPES: HashMap<RuntimeTypeKind, RuntimeType> = {
        use PrimitiveType as PT;
        use RuntimeTypeKind as RTK;

        hashmap!{
            RTK::Primitive(PT::Bool) => RuntimeType::primitive("bool", PT::Bool),
            RTK::Primitive(PT::Int) => RuntimeType::primitive("int", PT::Int),
            RTK::Primitive(PT::Long) => RuntimeType::primitive("long", PT::Long),
            RTK::Primitive(PT::Float) => RuntimeType::primitive("float", PT::Float),
            RTK::String => RuntimeType{
                name: "string", kind: RTK::String, base_size: LENGTH_HEADER_SIZE, element_size: 1,
            },
            RTK::Array(PT::Bool) => RuntimeType::array("bool[]", PT::Bool),
            RTK::Array(PT::Int) => RuntimeType::array("int[]", PT::Int),
            RTK::Array(PT::Long) => RuntimeType::array("long[]", PT::Long),
            RTK::Array(PT::Float) => RuntimeType::array("float[]", PT::Float),
            RTK::Archive => RuntimeType{
                name: "archive", kind: RTK::Archive, base_size: ARCHIVE_HANDLE_SIZE, element_size: 0,
            },
        }
    };
}

/// Every `RuntimeTypeKind` has exactly one registered descriptor.
pub fn runtime_type(kind: RuntimeTypeKind) -> &'static RuntimeType {
    &BUILTIN_TYPES[&kind]
}

pub fn runtime_type_by_name(name: &str) -> Option<&'static RuntimeType> {
    BUILTIN_TYPES.values().find(|v| v.name == name)
}
