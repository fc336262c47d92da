use std::sync::Arc;

use crate::lang::ast::Literal;
use crate::lang::emit::image::{Image, MemberCode};
use crate::lang::emit::opcode::{Instruction, OpCode, TypeTag};
use crate::lang::symbols::PrimitiveType;

use super::error::*;
use super::object::*;
use super::store::{array_size, Heap};

macro_rules! debug_log {
    ($format:literal) => {
        enabled_debug_print!(false, "exec", $format);
    };
    ($format:literal, $($args:expr),*) => {
        enabled_debug_print!(false, "exec", $format, $($args),*);
    };
}

/// State of a single member invocation. The frame does not own the heap it
/// allocates on, but all allocations made while executing the member go
/// through it.
#[derive(Debug)]
pub struct StackFrame {
    pub(crate) member: u32,
    pub(crate) pc: usize,
    pub(crate) arguments: Vec<RuntimeObject>,
    pub(crate) locals: Vec<Option<RuntimeObject>>,
    pub(crate) operands: Vec<RuntimeObject>,
    // Heap usage when the frame was entered
    pub(crate) heap_mark: Address,
    pub(crate) num_allocations: u32,
}

impl StackFrame {
    pub(crate) fn new(member: u32, code: &MemberCode, arguments: Vec<RuntimeObject>, heap_mark: Address) -> Self {
        Self{
            member,
            pc: 0,
            arguments,
            locals: vec![None; code.num_locals as usize],
            operands: Vec::with_capacity(16),
            heap_mark,
            num_allocations: 0,
        }
    }

    fn allocated(&mut self, object: RuntimeObject) -> RuntimeObject {
        self.num_allocations += 1;
        object
    }

    pub fn allocate_primitive(&mut self, heap: &mut Heap, value: PrimitiveValue) -> Result<RuntimeObject, RuntimeFault> {
        let object = heap.allocate_primitive(value)?;
        Ok(self.allocated(object))
    }

    pub fn allocate_string(&mut self, heap: &mut Heap, value: &str) -> Result<RuntimeObject, RuntimeFault> {
        let object = heap.allocate_string(value)?;
        Ok(self.allocated(object))
    }

    pub fn allocate_array(
        &mut self, heap: &mut Heap, element: PrimitiveType, elements: Vec<PrimitiveValue>
    ) -> Result<RuntimeObject, RuntimeFault> {
        let object = heap.allocate_array(element, elements)?;
        Ok(self.allocated(object))
    }

    pub fn allocate_archive(&mut self, heap: &mut Heap, document: Arc<dyn ForeignDocument>) -> Result<RuntimeObject, RuntimeFault> {
        let object = heap.allocate_archive(document)?;
        Ok(self.allocated(object))
    }

    pub fn copy_object(&mut self, heap: &mut Heap, source: &RuntimeObject) -> Result<RuntimeObject, RuntimeFault> {
        let object = heap.allocate_copy(source)?;
        Ok(self.allocated(object))
    }

    fn allocate_literal(&mut self, heap: &mut Heap, literal: &Literal) -> Result<RuntimeObject, RuntimeFault> {
        match literal {
            Literal::Bool(v) => self.allocate_primitive(heap, PrimitiveValue::Bool(*v)),
            Literal::Int(v) => self.allocate_primitive(heap, PrimitiveValue::Int(*v)),
            Literal::Long(v) => self.allocate_primitive(heap, PrimitiveValue::Long(*v)),
            Literal::Float(v) => self.allocate_primitive(heap, PrimitiveValue::Float(*v)),
            Literal::String(v) => self.allocate_string(heap, v),
        }
    }

    /// Places a host provided argument on the heap. Objects that already
    /// live there are passed as they are.
    pub(crate) fn allocate_argument(&mut self, heap: &mut Heap, argument: Argument) -> Result<RuntimeObject, RuntimeFault> {
        match argument {
            Argument::Bool(v) => self.allocate_primitive(heap, PrimitiveValue::Bool(v)),
            Argument::Int(v) => self.allocate_primitive(heap, PrimitiveValue::Int(v)),
            Argument::Long(v) => self.allocate_primitive(heap, PrimitiveValue::Long(v)),
            Argument::Float(v) => self.allocate_primitive(heap, PrimitiveValue::Float(v)),
            Argument::String(v) => self.allocate_string(heap, &v),
            Argument::Array(element, elements) => {
                if let Some(mismatch) = elements.iter().find(|v| v.primitive_type() != element) {
                    return Err(RuntimeFault::InvalidOperation{
                        opcode: OpCode::Newarr,
                        type_name: super::types::runtime_type(super::types::RuntimeTypeKind::Array(element)).name,
                        other: Some(mismatch.primitive_type().name()),
                    });
                }
                self.allocate_array(heap, element, elements)
            },
            Argument::Archive(document) => self.allocate_archive(heap, document),
            Argument::Object(object) => Ok(object),
        }
    }

    fn pop(&mut self) -> Result<RuntimeObject, RuntimeFault> {
        self.operands.pop().ok_or(RuntimeFault::StackUnderflow)
    }

    fn peek(&self) -> Result<&RuntimeObject, RuntimeFault> {
        self.operands.last().ok_or(RuntimeFault::StackUnderflow)
    }
}

fn expect_primitive(object: &RuntimeObject, opcode: OpCode, expected: PrimitiveType) -> Result<PrimitiveValue, RuntimeFault> {
    match object.as_primitive() {
        Some(value) if value.primitive_type() == expected => Ok(value),
        _ => Err(RuntimeFault::InvalidOperation{ opcode, type_name: object.runtime_type().name, other: None }),
    }
}

fn expect_int(object: &RuntimeObject, opcode: OpCode) -> Result<i32, RuntimeFault> {
    match expect_primitive(object, opcode, PrimitiveType::Int)? {
        PrimitiveValue::Int(v) => Ok(v),
        _ => unreachable!(),
    }
}

fn expect_bool(object: &RuntimeObject, opcode: OpCode) -> Result<bool, RuntimeFault> {
    match expect_primitive(object, opcode, PrimitiveType::Bool)? {
        PrimitiveValue::Bool(v) => Ok(v),
        _ => unreachable!(),
    }
}

fn expect_array(object: &RuntimeObject, opcode: OpCode) -> Result<&ArrayObject, RuntimeFault> {
    object.as_array()
        .ok_or(RuntimeFault::InvalidOperation{ opcode, type_name: object.runtime_type().name, other: None })
}

#[derive(Debug)]
pub enum EvalContinuation {
    Stepping,
    /// The entry member returned, with its return value if it has one
    Terminal(Option<RuntimeObject>),
}

/// When memory allocated by a member is given back to the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Only when the owner of the heap resets it
    Bulk,
    /// Additionally whenever a member returns, unless its return value was
    /// allocated while it ran.
    OnReturn,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    pub max_call_depth: usize,
    pub reclaim_policy: ReclaimPolicy,
}

enum PromptState {
    Running,
    Finished(Option<RuntimeObject>),
    Aborted(EvalError),
}

/// Execution of a single member invocation (and everything it calls) on a
/// loaded image.
pub struct Prompt<'i> {
    image: &'i Image,
    config: EvalConfig,
    frames: Vec<StackFrame>,
    state: PromptState,
}

impl<'i> Prompt<'i> {
    /// Prepares the invocation of `member`. The arguments are allocated on
    /// the heap through the entry frame. Their number must match the
    /// member's parameters.
    pub fn new(
        image: &'i Image, member: u32, arguments: Vec<Argument>, heap: &mut Heap, config: EvalConfig
    ) -> Result<Self, EvalError> {
        let code = image.members().get(member as usize).ok_or_else(|| EvalError{
            fault: RuntimeFault::UnknownMember{ index: member },
            frames: Vec::new(),
        })?;
        if arguments.len() != code.parameters.len() {
            return Err(EvalError{
                fault: RuntimeFault::ArgumentCountMismatch{ expected: code.parameters.len(), got: arguments.len() },
                frames: vec![EvalFrame{ member: image.member_name(member).to_string(), instruction: 0 }],
            });
        }

        let mut frame = StackFrame::new(member, code, Vec::new(), heap.mark());
        for argument in arguments {
            let object = frame.allocate_argument(heap, argument).map_err(|fault| EvalError{
                fault,
                frames: vec![EvalFrame{ member: image.member_name(member).to_string(), instruction: 0 }],
            })?;
            frame.arguments.push(object);
        }
        frame.heap_mark = heap.mark();

        Ok(Self{
            image,
            config,
            frames: vec![frame],
            state: PromptState::Running,
        })
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Executes a single instruction.
    pub fn step(&mut self, heap: &mut Heap) -> Result<EvalContinuation, EvalError> {
        match &self.state {
            PromptState::Running => {},
            PromptState::Finished(result) => return Ok(EvalContinuation::Terminal(result.clone())),
            PromptState::Aborted(error) => return Err(error.clone()),
        }

        match self.execute(heap) {
            Ok(EvalContinuation::Terminal(result)) => {
                self.state = PromptState::Finished(result.clone());
                Ok(EvalContinuation::Terminal(result))
            },
            Ok(EvalContinuation::Stepping) => Ok(EvalContinuation::Stepping),
            Err(fault) => {
                let error = EvalError{ fault, frames: self.trace() };
                self.frames.clear();
                self.state = PromptState::Aborted(error.clone());
                Err(error)
            },
        }
    }

    /// Steps until the entry member returns.
    pub fn run(&mut self, heap: &mut Heap) -> Result<Option<RuntimeObject>, EvalError> {
        loop {
            if let EvalContinuation::Terminal(result) = self.step(heap)? {
                return Ok(result);
            }
        }
    }

    fn trace(&self) -> Vec<EvalFrame> {
        self.frames.iter()
            .map(|frame| EvalFrame{
                member: self.image.member_name(frame.member).to_string(),
                instruction: frame.pc.saturating_sub(1) as u32,
            })
            .collect()
    }

    fn execute(&mut self, heap: &mut Heap) -> Result<EvalContinuation, RuntimeFault> {
        let image = self.image;
        let depth = self.frames.len();
        let frame = match self.frames.last_mut() {
            Some(frame) => frame,
            None => return Err(RuntimeFault::StackUnderflow),
        };
        let code = image.member(frame.member);
        let instruction: Instruction = *code.instructions.get(frame.pc)
            .ok_or(RuntimeFault::ProgramCounterOutOfRange{ pc: frame.pc })?;
        frame.pc += 1;

        debug_log!("[{}] {} @ {}: {}", depth, image.member_name(frame.member), frame.pc - 1, instruction);

        let opcode = instruction.opcode;
        let operand = instruction.operand as usize;
        match opcode {
            OpCode::Nop => {},
            OpCode::Ldc => {
                let object = frame.allocate_literal(heap, &image.constants()[operand])?;
                frame.operands.push(object);
            },
            OpCode::Ldarg => {
                let object = frame.arguments[operand].clone();
                frame.operands.push(object);
            },
            OpCode::Starg => {
                frame.arguments[operand] = frame.pop()?;
            },
            OpCode::Ldloc => {
                let object = frame.locals[operand].clone()
                    .ok_or(RuntimeFault::UnassignedLocal{ index: operand as u32 })?;
                frame.operands.push(object);
            },
            OpCode::Stloc => {
                frame.locals[operand] = Some(frame.pop()?);
            },
            OpCode::Pop => {
                frame.pop()?;
            },
            OpCode::Dup => {
                let object = frame.peek()?.clone();
                frame.operands.push(object);
            },
            OpCode::Neg | OpCode::Not => {
                let value = frame.pop()?;
                let result = value.compute_operation(opcode, None, frame, heap)?;
                frame.operands.push(result);
            },
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem |
            OpCode::And | OpCode::Or | OpCode::Xor |
            OpCode::Ceq | OpCode::Cne | OpCode::Clt | OpCode::Cgt | OpCode::Cle | OpCode::Cge => {
                let rhs = frame.pop()?;
                let lhs = frame.pop()?;
                let result = lhs.compute_operation(opcode, Some(&rhs), frame, heap)?;
                frame.operands.push(result);
            },
            OpCode::Newarr => {
                let length = frame.pop()?;
                let length = expect_int(&length, opcode)?;
                if length < 0 {
                    return Err(RuntimeFault::NegativeArrayLength{ length });
                }
                let element = TypeTag(operand as u8).as_primitive()
                    .ok_or(RuntimeFault::InvalidOperation{ opcode, type_name: "int", other: None })?;
                heap.ensure_room(array_size(element, length as u32))?;
                let elements = vec![PrimitiveValue::default_of(element); length as usize];
                let array = frame.allocate_array(heap, element, elements)?;
                frame.operands.push(array);
            },
            OpCode::Ldelem => {
                let index = frame.pop()?;
                let array = frame.pop()?;
                let index = expect_int(&index, opcode)?;
                let value = expect_array(&array, opcode)?.element_at(index)?;
                let element = frame.allocate_primitive(heap, value)?;
                frame.operands.push(element);
            },
            OpCode::Stelem => {
                let value = frame.pop()?;
                let index = frame.pop()?;
                let array = frame.pop()?;
                let index = expect_int(&index, opcode)?;
                let array = expect_array(&array, opcode)?;
                array.element_at(index)?;
                let value = expect_primitive(&value, opcode, array.element)?;

                let mut elements = array.elements().to_vec();
                elements[index as usize] = value;
                let updated = frame.allocate_array(heap, array.element, elements)?;
                frame.operands.push(updated);
            },
            OpCode::Ldlen => {
                let subject = frame.pop()?;
                let length = match &subject {
                    RuntimeObject::Array(array) => array.elements.len(),
                    RuntimeObject::String(string) => string.value.len(),
                    _ => return Err(RuntimeFault::InvalidOperation{
                        opcode, type_name: subject.runtime_type().name, other: None,
                    }),
                };
                let length = frame.allocate_primitive(heap, PrimitiveValue::Int(length as i32))?;
                frame.operands.push(length);
            },
            OpCode::Newarc => {
                let name = frame.pop()?;
                let name = name.as_string().ok_or(RuntimeFault::InvalidOperation{
                    opcode, type_name: name.runtime_type().name, other: None,
                })?;
                let archive = frame.allocate_archive(heap, Arc::new(OpaqueDocument::new(name)))?;
                frame.operands.push(archive);
            },
            OpCode::Copy => {
                let source = frame.pop()?;
                let copy = frame.copy_object(heap, &source)?;
                frame.operands.push(copy);
            },
            OpCode::Call => {
                if depth >= self.config.max_call_depth {
                    return Err(RuntimeFault::CallDepthExceeded{ max_depth: self.config.max_call_depth });
                }
                let callee = image.member(instruction.operand);
                let num_arguments = callee.parameters.len();
                if frame.operands.len() < num_arguments {
                    return Err(RuntimeFault::StackUnderflow);
                }
                let arguments = frame.operands.split_off(frame.operands.len() - num_arguments);
                debug_log!("calling {} with {} argument(s)", image.member_name(instruction.operand), arguments.len());
                let callee_frame = StackFrame::new(instruction.operand, callee, arguments, heap.mark());
                self.frames.push(callee_frame);
            },
            OpCode::Ret => {
                let result = match code.returns_value() {
                    Some(true) => Some(frame.pop().map_err(|_| RuntimeFault::MissingReturnValue)?),
                    Some(false) => None,
                    None => frame.operands.pop(),
                };
                let finished = self.frames.pop().ok_or(RuntimeFault::StackUnderflow)?;
                debug_log!("returning from {} after {} allocation(s)", image.member_name(finished.member), finished.num_allocations);
                self.reclaim(&finished, result.as_ref(), heap);

                match self.frames.last_mut() {
                    Some(caller) => {
                        if let Some(result) = result {
                            caller.operands.push(result);
                        }
                    },
                    None => return Ok(EvalContinuation::Terminal(result)),
                }
            },
            OpCode::Br => {
                frame.pc = operand;
            },
            OpCode::Brtrue | OpCode::Brfalse => {
                let test = frame.pop()?;
                let test = expect_bool(&test, opcode)?;
                if test == (opcode == OpCode::Brtrue) {
                    frame.pc = operand;
                }
            },
        }

        Ok(EvalContinuation::Stepping)
    }

    /// Everything a returning frame allocated can only be reached through
    /// its return value. If that value is older than the frame, all of it
    /// can go.
    fn reclaim(&self, finished: &StackFrame, result: Option<&RuntimeObject>, heap: &mut Heap) {
        if self.config.reclaim_policy != ReclaimPolicy::OnReturn {
            return;
        }

        let escapes = result.map(|v| v.address() >= finished.heap_mark).unwrap_or(false);
        if !escapes {
            heap.release_to(finished.heap_mark);
        }
    }
}
