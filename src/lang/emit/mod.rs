/// emit
///
/// Turns bound members into an `Image`. Members are emitted in the order in
/// which they are given, constants are numbered in order of first use while
/// walking those members. Nothing in here iterates over a hash map, so
/// emitting the same members twice produces byte-identical images.
///
/// A member that failed to bind, or that calls a member that could not be
/// emitted, is left out of the image and reported as an `EmitError`. The
/// remaining members are still emitted.

pub(crate) mod constant_table;
pub(crate) mod image;
pub(crate) mod opcode;

use std::collections::HashMap;
use std::fmt;

use crate::lang::ast::{InputSpan, BinaryOperator, UnaryOperator};
use crate::lang::binder::bound::*;
use crate::lang::symbols::{SymbolId, SymbolKind, SymbolTable, TypeRef};

use constant_table::ConstantTable;
use image::{Image, MemberCode, MemberKind};
use opcode::{Instruction, OpCode, TypeTag};

#[derive(Debug, Clone, PartialEq)]
pub struct EmitError {
    /// Qualified name of the member, if it is known
    pub member: String,
    pub span: InputSpan,
    pub message: String,
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot emit '{}': {}\n +- at {}", &self.member, &self.message, self.span)
    }
}

pub struct EmitOutput {
    pub image: Image,
    pub errors: Vec<EmitError>,
}

pub struct Emitter<'t> {
    table: &'t SymbolTable,
    constants: ConstantTable,
}

impl<'t> Emitter<'t> {
    pub fn new(table: &'t SymbolTable) -> Self {
        Self{ table, constants: ConstantTable::new() }
    }

    pub fn emit(mut self, members: &[BoundMember]) -> EmitOutput {
        let mut errors = Vec::new();

        // Determine which members can be emitted before emitting anything,
        // so rejected members leave no constants behind.
        let mut emittable: Vec<bool> = Vec::with_capacity(members.len());
        let mut member_positions: HashMap<SymbolId, usize> = HashMap::new();
        for (idx, member) in members.iter().enumerate() {
            let mut valid = self.check_member(member, &mut errors);
            if let Some(symbol) = member.symbol() {
                if member_positions.contains_key(&symbol) {
                    errors.push(EmitError{
                        member: self.member_name(member),
                        span: member.span(),
                        message: String::from("member is emitted more than once"),
                    });
                    valid = false;
                } else {
                    member_positions.insert(symbol, idx);
                }
            }
            emittable.push(valid);
        }

        // Calls into rejected members are only found once the callee has
        // been rejected, so repeat until nothing changes.
        loop {
            let mut changed = false;
            for (idx, member) in members.iter().enumerate() {
                if !emittable[idx] {
                    continue;
                }
                if let Some((callee, span)) = first_unavailable_call(member, &member_positions, &emittable) {
                    emittable[idx] = false;
                    changed = true;
                    errors.push(EmitError{
                        member: self.member_name(member),
                        span,
                        message: format!("calls '{}' which could not be emitted", self.table.qualified_name(callee)),
                    });
                }
            }
            if !changed {
                break;
            }
        }

        let mut member_indices = HashMap::new();
        for (idx, member) in members.iter().enumerate() {
            if let (true, Some(symbol)) = (emittable[idx], member.symbol()) {
                let index = member_indices.len() as u32;
                member_indices.insert(symbol, index);
            }
        }

        let mut codes = Vec::with_capacity(member_indices.len());
        for (idx, member) in members.iter().enumerate() {
            if emittable[idx] {
                codes.push(self.emit_member(member, &member_indices));
            }
        }

        let image = match Image::new(self.constants.into_constants(), codes) {
            Ok(image) => image,
            Err(err) => {
                errors.push(EmitError{
                    member: String::from("<image>"),
                    span: InputSpan::default(),
                    message: format!("emitted image is invalid: {}", err),
                });
                Image::empty()
            },
        };
        EmitOutput{ image, errors }
    }

    fn member_name(&self, member: &BoundMember) -> String {
        match member.symbol() {
            Some(symbol) => self.table.qualified_name(symbol),
            None => String::from("<unbound>"),
        }
    }

    fn check_member(&self, member: &BoundMember, errors: &mut Vec<EmitError>) -> bool {
        if let BoundMember::Error(error) = member {
            let message = match error.diagnostics.iter().next() {
                Some(diagnostic) => format!("member failed to bind: {}", &diagnostic.message),
                None => String::from("member failed to bind"),
            };
            errors.push(EmitError{ member: self.member_name(member), span: member.span(), message });
            return false;
        }

        if let Some(message) = self.exceeded_limit(member) {
            errors.push(EmitError{ member: self.member_name(member), span: member.span(), message });
            return false;
        }

        let mut found = Vec::new();
        for statement in member.statements() {
            statement.collect_errors(&mut found);
        }
        if found.is_empty() {
            return true;
        }

        for error in found {
            errors.push(EmitError{
                member: self.member_name(member),
                span: error.span,
                message: error.message.clone(),
            });
        }
        false
    }

    /// Member headers store these counts as `u16`.
    fn exceeded_limit(&self, member: &BoundMember) -> Option<String> {
        let limit = u16::MAX as usize;
        let num_parameters = member.symbol()
            .and_then(|v| self.table.get(v))
            .map(|v| v.parameters().len())
            .unwrap_or(0);
        let num_locals = member.locals().map(|v| v.len()).unwrap_or(0);

        if num_parameters > limit {
            Some(format!("{} parameters exceed the limit of {}", num_parameters, limit))
        } else if num_locals > limit {
            Some(format!("{} locals exceed the limit of {}", num_locals, limit))
        } else {
            None
        }
    }

    fn emit_member(&mut self, member: &BoundMember, member_indices: &HashMap<SymbolId, u32>) -> MemberCode {
        let table = self.table;
        let symbol_id = member.symbol().expect("emitting an error member");
        let symbol = &table[symbol_id];
        let name = self.constants.add_string(&table.qualified_name(symbol_id));

        let mut code = CodeBuilder{
            constants: &mut self.constants,
            member_indices,
            instructions: Vec::new(),
        };
        for statement in member.statements() {
            code.statement(statement);
        }
        code.push(OpCode::Ret);

        let kind = match symbol.kind {
            SymbolKind::Constructor(_) => MemberKind::Constructor,
            _ => MemberKind::Method,
        };
        MemberCode{
            name,
            kind,
            return_type: TypeTag::from_type_ref(&symbol.declared_type),
            parameters: symbol.parameters().iter()
                .map(|v| TypeTag::from_type_ref(&table[*v].declared_type))
                .collect(),
            num_locals: member.locals().map(|v| v.len()).unwrap_or(0) as u16,
            instructions: code.instructions,
        }
    }
}

fn first_unavailable_call(
    member: &BoundMember, positions: &HashMap<SymbolId, usize>, emittable: &[bool]
) -> Option<(SymbolId, InputSpan)> {
    let mut calls = Vec::new();
    for statement in member.statements() {
        collect_calls_in_statement(statement, &mut calls);
    }

    calls.into_iter().find(|(callee, _)| {
        match positions.get(callee) {
            Some(idx) => !emittable[*idx],
            None => true,
        }
    })
}

fn collect_calls_in_statement(statement: &BoundStatement, calls: &mut Vec<(SymbolId, InputSpan)>) {
    use BoundStatement as BS;
    match statement {
        BS::Block{ statements, .. } => {
            for statement in statements {
                collect_calls_in_statement(statement, calls);
            }
        },
        BS::Local{ initializer, .. } => collect_calls_in_expression(initializer, calls),
        BS::Expression{ expression, .. } => collect_calls_in_expression(expression, calls),
        BS::Return{ expression, .. } => {
            if let Some(expression) = expression {
                collect_calls_in_expression(expression, calls);
            }
        },
        BS::If{ test, true_body, false_body, .. } => {
            collect_calls_in_expression(test, calls);
            for statement in true_body.iter().chain(false_body.iter().flatten()) {
                collect_calls_in_statement(statement, calls);
            }
        },
        BS::While{ test, body, .. } => {
            collect_calls_in_expression(test, calls);
            for statement in body {
                collect_calls_in_statement(statement, calls);
            }
        },
        BS::Error(_) => {},
    }
}

fn collect_calls_in_expression(expression: &BoundExpression, calls: &mut Vec<(SymbolId, InputSpan)>) {
    use BoundExpressionKind as BEK;
    match &expression.kind {
        BEK::Literal(_) | BEK::Variable(_) | BEK::Error(_) => {},
        BEK::Binary{ left, right, .. } => {
            collect_calls_in_expression(left, calls);
            collect_calls_in_expression(right, calls);
        },
        BEK::Unary{ operand, .. } => collect_calls_in_expression(operand, calls),
        BEK::Assignment{ value, .. } => collect_calls_in_expression(value, calls),
        BEK::ElementAssignment{ index, value, .. } => {
            collect_calls_in_expression(index, calls);
            collect_calls_in_expression(value, calls);
        },
        BEK::Call{ method, arguments } => {
            calls.push((*method, expression.span));
            for argument in arguments {
                collect_calls_in_expression(argument, calls);
            }
        },
        BEK::NewArchive{ name } => collect_calls_in_expression(name, calls),
        BEK::NewArray{ length, .. } => collect_calls_in_expression(length, calls),
        BEK::Index{ subject, index } => {
            collect_calls_in_expression(subject, calls);
            collect_calls_in_expression(index, calls);
        },
        BEK::Length{ subject } | BEK::Copy{ subject } => collect_calls_in_expression(subject, calls),
    }
}

/// Instruction stream of a single member under construction.
struct CodeBuilder<'c> {
    constants: &'c mut ConstantTable,
    member_indices: &'c HashMap<SymbolId, u32>,
    instructions: Vec<Instruction>,
}

impl<'c> CodeBuilder<'c> {
    fn push(&mut self, opcode: OpCode) {
        self.instructions.push(Instruction::new(opcode));
    }

    fn push_with(&mut self, opcode: OpCode, operand: u32) {
        self.instructions.push(Instruction::with_operand(opcode, operand));
    }

    /// Pushes a branch with a target that is patched later.
    fn push_branch(&mut self, opcode: OpCode) -> usize {
        let at = self.instructions.len();
        self.push_with(opcode, u32::MAX);
        at
    }

    fn patch_branch_to_here(&mut self, at: usize) {
        let target = self.instructions.len() as u32;
        self.instructions[at].operand = target;
    }

    fn load(&mut self, variable: Variable) {
        match variable {
            Variable::Parameter(ordinal) => self.push_with(OpCode::Ldarg, ordinal as u32),
            Variable::Local(local) => self.push_with(OpCode::Ldloc, local.0),
        }
    }

    fn store(&mut self, variable: Variable) {
        match variable {
            Variable::Parameter(ordinal) => self.push_with(OpCode::Starg, ordinal as u32),
            Variable::Local(local) => self.push_with(OpCode::Stloc, local.0),
        }
    }

    fn statement(&mut self, statement: &BoundStatement) {
        use BoundStatement as BS;
        match statement {
            BS::Block{ statements, .. } => {
                for statement in statements {
                    self.statement(statement);
                }
            },
            BS::Local{ local, initializer, .. } => {
                self.expression(initializer);
                self.push_with(OpCode::Stloc, local.0);
            },
            BS::Expression{ expression, .. } => {
                self.expression(expression);
                if expression.ty != TypeRef::Void {
                    self.push(OpCode::Pop);
                }
            },
            BS::Return{ expression, .. } => {
                if let Some(expression) = expression {
                    self.expression(expression);
                }
                self.push(OpCode::Ret);
            },
            BS::If{ test, true_body, false_body, .. } => {
                self.expression(test);
                let to_false = self.push_branch(OpCode::Brfalse);
                for statement in true_body {
                    self.statement(statement);
                }
                match false_body {
                    Some(false_body) => {
                        let to_end = self.push_branch(OpCode::Br);
                        self.patch_branch_to_here(to_false);
                        for statement in false_body {
                            self.statement(statement);
                        }
                        self.patch_branch_to_here(to_end);
                    },
                    None => self.patch_branch_to_here(to_false),
                }
            },
            BS::While{ test, body, .. } => {
                let start = self.instructions.len() as u32;
                self.expression(test);
                let to_end = self.push_branch(OpCode::Brfalse);
                for statement in body {
                    self.statement(statement);
                }
                self.push_with(OpCode::Br, start);
                self.patch_branch_to_here(to_end);
            },
            BS::Error(_) => unreachable!("emitting a statement that failed to bind"),
        }
    }

    fn expression(&mut self, expression: &BoundExpression) {
        use BoundExpressionKind as BEK;
        match &expression.kind {
            BEK::Literal(literal) => {
                let index = self.constants.add(literal);
                self.push_with(OpCode::Ldc, index);
            },
            BEK::Variable(variable) => self.load(*variable),
            BEK::Binary{ operator: BinaryOperator::LogicalAnd, left, right } => {
                self.short_circuit(left, right, OpCode::Brfalse);
            },
            BEK::Binary{ operator: BinaryOperator::LogicalOr, left, right } => {
                self.short_circuit(left, right, OpCode::Brtrue);
            },
            BEK::Binary{ operator, left, right } => {
                self.expression(left);
                self.expression(right);
                self.push(binary_opcode(*operator));
            },
            BEK::Unary{ operator, operand } => {
                self.expression(operand);
                match operator {
                    UnaryOperator::Positive => {},
                    UnaryOperator::Negative => self.push(OpCode::Neg),
                    UnaryOperator::LogicalNot | UnaryOperator::BitwiseNot => self.push(OpCode::Not),
                }
            },
            BEK::Assignment{ target, value } => {
                self.expression(value);
                self.push(OpCode::Dup);
                self.store(*target);
            },
            BEK::ElementAssignment{ target, index, value } => {
                self.load(*target);
                self.expression(index);
                self.expression(value);
                self.push(OpCode::Stelem);
                self.store(*target);
            },
            BEK::Call{ method, arguments } => {
                for argument in arguments {
                    self.expression(argument);
                }
                let index = self.member_indices[method];
                self.push_with(OpCode::Call, index);
            },
            BEK::NewArchive{ name } => {
                self.expression(name);
                self.push(OpCode::Newarc);
            },
            BEK::NewArray{ element, length } => {
                self.expression(length);
                self.push_with(OpCode::Newarr, TypeTag::primitive(*element).0 as u32);
            },
            BEK::Index{ subject, index } => {
                self.expression(subject);
                self.expression(index);
                self.push(OpCode::Ldelem);
            },
            BEK::Length{ subject } => {
                self.expression(subject);
                self.push(OpCode::Ldlen);
            },
            BEK::Copy{ subject } => {
                self.expression(subject);
                self.push(OpCode::Copy);
            },
            BEK::Error(_) => unreachable!("emitting an expression that failed to bind"),
        }
    }

    /// `left && right` and `left || right`: the left value decides the
    /// result unless `branch` does not jump.
    fn short_circuit(&mut self, left: &BoundExpression, right: &BoundExpression, branch: OpCode) {
        self.expression(left);
        self.push(OpCode::Dup);
        let to_end = self.push_branch(branch);
        self.push(OpCode::Pop);
        self.expression(right);
        self.patch_branch_to_here(to_end);
    }
}

fn binary_opcode(operator: BinaryOperator) -> OpCode {
    use BinaryOperator as BO;
    match operator {
        BO::Add => OpCode::Add,
        BO::Subtract => OpCode::Sub,
        BO::Multiply => OpCode::Mul,
        BO::Divide => OpCode::Div,
        BO::Remainder => OpCode::Rem,
        BO::Equality => OpCode::Ceq,
        BO::Inequality => OpCode::Cne,
        BO::LessThan => OpCode::Clt,
        BO::GreaterThan => OpCode::Cgt,
        BO::LessThanEqual => OpCode::Cle,
        BO::GreaterThanEqual => OpCode::Cge,
        BO::BitwiseAnd | BO::LogicalAnd => OpCode::And,
        BO::BitwiseOr | BO::LogicalOr => OpCode::Or,
        BO::BitwiseXor => OpCode::Xor,
    }
}
