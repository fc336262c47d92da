use std::collections::BTreeMap;
use std::sync::Arc;

use crate::lang::symbols::PrimitiveType;

use super::error::RuntimeFault;
use super::object::*;

/// Bump allocated heap with a linear address space. Every object occupies
/// exactly `size()` bytes starting at its address, the bytes mirror the
/// object's contents. Memory is only given back in bulk: either everything
/// (`reset`) or everything allocated after a mark (`release_to`).
#[derive(Debug)]
pub struct Heap {
    capacity: u32,
    memory: Vec<u8>,
    objects: BTreeMap<Address, RuntimeObject>,
}

impl Heap {
    pub fn new(capacity: u32) -> Self {
        Self{
            capacity,
            memory: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of bytes in use, which is also the address of the next object.
    pub fn used(&self) -> u32 {
        self.memory.len() as u32
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn object_at(&self, address: Address) -> Option<&RuntimeObject> {
        self.objects.get(&address)
    }

    /// The bytes of the object at `address`.
    pub fn bytes_at(&self, address: Address) -> Option<&[u8]> {
        let object = self.objects.get(&address)?;
        let begin = address as usize;
        Some(&self.memory[begin..begin + object.size() as usize])
    }

    pub(crate) fn mark(&self) -> Address {
        self.used()
    }

    /// Drops all objects at or above `mark`. Objects below it keep their
    /// addresses.
    pub(crate) fn release_to(&mut self, mark: Address) {
        debug_assert!(mark <= self.used());
        self.objects.split_off(&mark);
        self.memory.truncate(mark as usize);
    }

    /// Fails unless `size` more bytes fit. Callers use it before building
    /// large payloads on the host side.
    pub(crate) fn ensure_room(&self, size: u64) -> Result<(), RuntimeFault> {
        let available = self.capacity - self.used();
        if size > available as u64 {
            let requested = size.min(u32::MAX as u64) as u32;
            return Err(RuntimeFault::OutOfMemory{ requested, available });
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.objects.clear();
        self.memory.clear();
    }

    // -------------------------------------------------------------------------
    // Allocation, only to be used through a `StackFrame`
    // -------------------------------------------------------------------------

    fn place(&mut self, size: u32, create: impl FnOnce(Address) -> RuntimeObject) -> Result<RuntimeObject, RuntimeFault> {
        let address = self.used();
        let available = self.capacity - address;
        if size > available {
            return Err(RuntimeFault::OutOfMemory{ requested: size, available });
        }

        let object = create(address);
        debug_assert_eq!(object.size(), size);
        object.write_bytes(&mut self.memory);
        debug_assert_eq!(self.memory.len(), (address + size) as usize);
        self.objects.insert(address, object.clone());

        Ok(object)
    }

    pub(crate) fn allocate_primitive(&mut self, value: PrimitiveValue) -> Result<RuntimeObject, RuntimeFault> {
        let size = value.primitive_type().size();
        self.place(size, |address| RuntimeObject::Primitive(PrimitiveObject{ address, value }))
    }

    pub(crate) fn allocate_string(&mut self, value: &str) -> Result<RuntimeObject, RuntimeFault> {
        let size = checked_size(4, value.len(), 1)?;
        self.place(size, |address| RuntimeObject::String(StringObject{ address, value: Arc::from(value) }))
    }

    pub(crate) fn allocate_array(&mut self, element: PrimitiveType, elements: Vec<PrimitiveValue>) -> Result<RuntimeObject, RuntimeFault> {
        debug_assert!(elements.iter().all(|v| v.primitive_type() == element));
        let size = checked_size(4, elements.len(), element.size())?;
        self.place(size, |address| RuntimeObject::Array(ArrayObject{
            address, element, elements: Arc::from(elements),
        }))
    }

    pub(crate) fn allocate_archive(&mut self, document: Arc<dyn ForeignDocument>) -> Result<RuntimeObject, RuntimeFault> {
        self.place(super::types::ARCHIVE_HANDLE_SIZE, |address| RuntimeObject::Archive(ArchiveObject{ address, document }))
    }

    pub(crate) fn allocate_copy(&mut self, source: &RuntimeObject) -> Result<RuntimeObject, RuntimeFault> {
        self.place(source.size(), |address| source.copy_to(address))
    }
}

/// Heap size of an array with `length` elements.
pub(crate) fn array_size(element: PrimitiveType, length: u32) -> u64 {
    4 + (length as u64) * (element.size() as u64)
}

fn checked_size(header: u32, num_elements: usize, element_size: u32) -> Result<u32, RuntimeFault> {
    let size = (num_elements as u64) * (element_size as u64) + header as u64;
    if size > u32::MAX as u64 {
        return Err(RuntimeFault::OutOfMemory{ requested: u32::MAX, available: 0 });
    }
    Ok(size as u32)
}
