use crate::lang::ast::*;
use crate::lang::diagnostics::Diagnostics;
use crate::lang::symbols::{SymbolId, SymbolKind, SymbolTable, TypeRef, PrimitiveType};

use super::bound::*;
use super::scope::{Scope, ScopeEntry};

/// Binds the statements of a single member body. Borrows the member's scope,
/// owns its own diagnostics and the locals table. Both are handed back to
/// the owner through `finish`.
pub(crate) struct StatementBinder<'s, 't> {
    scope: &'s mut Scope<'t>,
    // The method or constructor whose body is being bound
    context: SymbolId,
    locals: LocalsTable,
    diagnostics: Diagnostics,
}

impl<'s, 't> StatementBinder<'s, 't> {
    pub(crate) fn new(scope: &'s mut Scope<'t>, context: SymbolId) -> Self {
        Self{
            scope,
            context,
            locals: LocalsTable::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub(crate) fn finish(self) -> (LocalsTable, Diagnostics) {
        (self.locals, self.diagnostics)
    }

    fn table(&self) -> &'t SymbolTable {
        self.scope.table()
    }

    fn type_name(&self, ty: &TypeRef) -> String {
        ty.display_name(self.table())
    }

    fn error_statement(&mut self, span: InputSpan, message: String) -> BoundStatement {
        self.diagnostics.error(span, &message);
        BoundStatement::Error(BoundError{ span, message })
    }

    fn error_expression(&mut self, span: InputSpan, message: String) -> BoundExpression {
        self.diagnostics.error(span, &message);
        BoundExpression::error(span, message)
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    pub(crate) fn bind_statement(&mut self, statement: &StatementSyntax) -> BoundStatement {
        match statement {
            StatementSyntax::Block(block) => {
                let statements = self.bind_block(block);
                BoundStatement::Block{ span: block.span, statements }
            },
            StatementSyntax::Local(local) => self.bind_local(local),
            StatementSyntax::Expression(stmt) => {
                let expression = self.bind_expression(&stmt.expression);
                BoundStatement::Expression{ span: stmt.span, expression }
            },
            StatementSyntax::Return(stmt) => self.bind_return(stmt),
            StatementSyntax::If(stmt) => {
                let test = self.bind_condition(&stmt.test);
                let true_body = self.bind_block(&stmt.true_body);
                let false_body = stmt.false_body.as_ref().map(|v| self.bind_block(v));
                BoundStatement::If{ span: stmt.span, test, true_body, false_body }
            },
            StatementSyntax::While(stmt) => {
                let test = self.bind_condition(&stmt.test);
                let body = self.bind_block(&stmt.body);
                BoundStatement::While{ span: stmt.span, test, body }
            },
        }
    }

    fn bind_block(&mut self, block: &BlockSyntax) -> Vec<BoundStatement> {
        self.scope.push_frame();
        let statements = block.statements.iter()
            .map(|v| self.bind_statement(v))
            .collect();
        self.scope.pop_frame();

        statements
    }

    fn bind_condition(&mut self, test: &ExpressionSyntax) -> BoundExpression {
        let bound = self.bind_expression(test);
        if bound.ty.is_error() || bound.ty == TypeRef::BOOL {
            return bound;
        }

        let message = format!("condition must be of type 'bool', found '{}'", self.type_name(&bound.ty));
        self.error_expression(bound.span, message)
    }

    fn bind_local(&mut self, local: &LocalStatementSyntax) -> BoundStatement {
        let declared_type = match self.resolve_type(&local.type_annotation) {
            Ok(v) => v,
            Err(message) => return self.error_statement(local.type_annotation.span, message),
        };
        if declared_type == TypeRef::Void {
            let message = format!("local '{}' cannot be of type 'void'", &local.identifier.value);
            return self.error_statement(local.span, message);
        }

        // Initializer is bound before the name is visible
        let initializer = match &local.initializer {
            Some(initializer) => {
                let bound = self.bind_expression(initializer);
                self.check_assignable(bound, &declared_type)
            },
            None => match default_value(&declared_type) {
                Some(literal) => BoundExpression{
                    span: local.span,
                    ty: declared_type,
                    kind: BoundExpressionKind::Literal(literal),
                },
                None => {
                    let message = format!(
                        "local '{}' of type '{}' must be initialized",
                        &local.identifier.value, self.type_name(&declared_type)
                    );
                    return self.error_statement(local.span, message);
                }
            }
        };

        let local_id = LocalId(self.locals.len() as u32);
        if let Err(existing) = self.scope.register(&local.identifier.value, ScopeEntry::Local(local_id)) {
            let message = format!(
                "'{}' is already defined in this scope{}",
                &local.identifier.value, self.describe_entry(existing)
            );
            return self.error_statement(local.identifier.span, message);
        }
        let pushed = self.locals.push(LocalEntry{
            name: local.identifier.value.clone(),
            declared_type,
            span: local.identifier.span,
        });
        debug_assert_eq!(pushed, local_id);

        BoundStatement::Local{ span: local.span, local: local_id, initializer }
    }

    fn bind_return(&mut self, stmt: &ReturnStatementSyntax) -> BoundStatement {
        let table = self.table();
        let context = &table[self.context];
        let expression = stmt.expression.as_ref().map(|v| self.bind_expression(v));

        if let SymbolKind::Constructor(_) = context.kind {
            return BoundStatement::Return{ span: stmt.span, expression };
        }

        let return_type = context.declared_type;
        let expression = match (expression, return_type) {
            (None, TypeRef::Void) => None,
            (Some(expression), TypeRef::Void) => {
                let message = format!("method '{}' does not return a value", &context.name);
                Some(self.error_expression(expression.span, message))
            },
            (None, _) => {
                let message = format!(
                    "method '{}' must return a value of type '{}'",
                    &context.name, self.type_name(&return_type)
                );
                return self.error_statement(stmt.span, message);
            },
            (Some(expression), _) => Some(self.check_assignable(expression, &return_type)),
        };

        BoundStatement::Return{ span: stmt.span, expression }
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    pub(crate) fn bind_expression(&mut self, expression: &ExpressionSyntax) -> BoundExpression {
        use ExpressionSyntax as ES;

        match expression {
            ES::Literal{ span, value } => BoundExpression{
                span: *span,
                ty: literal_type(value),
                kind: BoundExpressionKind::Literal(value.clone()),
            },
            ES::Name(identifier) => match self.resolve_variable(identifier) {
                Ok((variable, ty)) => BoundExpression{
                    span: identifier.span,
                    ty,
                    kind: BoundExpressionKind::Variable(variable),
                },
                Err(message) => self.error_expression(identifier.span, message),
            },
            ES::Binary{ span, operator, left, right } => self.bind_binary(*span, *operator, left, right),
            ES::Unary{ span, operator, operand } => self.bind_unary(*span, *operator, operand),
            ES::Assignment{ span, target, value } => {
                let value = self.bind_expression(value);
                let (target, ty) = match self.resolve_variable(target) {
                    Ok(v) => v,
                    Err(message) => return self.error_expression(target.span, message),
                };
                let value = self.check_assignable(value, &ty);
                BoundExpression{
                    span: *span,
                    ty,
                    kind: BoundExpressionKind::Assignment{ target, value: Box::new(value) },
                }
            },
            ES::ElementAssignment{ span, target, index, value } => {
                let index = self.bind_index_operand(index);
                let value = self.bind_expression(value);
                let (target, ty) = match self.resolve_variable(target) {
                    Ok(v) => v,
                    Err(message) => return self.error_expression(target.span, message),
                };
                let element = match ty {
                    TypeRef::Array(element) => element,
                    TypeRef::Error => return BoundExpression::error(*span, "invalid element assignment target"),
                    _ => {
                        let message = format!("cannot assign elements of type '{}'", self.type_name(&ty));
                        return self.error_expression(*span, message);
                    }
                };
                let value = self.check_assignable(value, &TypeRef::Primitive(element));
                BoundExpression{
                    span: *span,
                    ty: TypeRef::Void,
                    kind: BoundExpressionKind::ElementAssignment{
                        target,
                        index: Box::new(index),
                        value: Box::new(value),
                    },
                }
            },
            ES::Call{ span, target_type, method, arguments } => {
                self.bind_call(*span, target_type.as_ref(), method, arguments)
            },
            ES::NewArchive{ span, name } => {
                let name = self.bind_expression(name);
                let name = self.check_assignable(name, &TypeRef::String);
                BoundExpression{
                    span: *span,
                    ty: TypeRef::Archive,
                    kind: BoundExpressionKind::NewArchive{ name: Box::new(name) },
                }
            },
            ES::NewArray{ span, element_type, length } => {
                let length = self.bind_index_operand(length);
                let element = match PrimitiveType::from_name(&element_type.name) {
                    Some(v) if !element_type.is_array => v,
                    _ => {
                        let message = format!("arrays of '{}' are not supported", &element_type.name);
                        return self.error_expression(element_type.span, message);
                    }
                };
                BoundExpression{
                    span: *span,
                    ty: TypeRef::Array(element),
                    kind: BoundExpressionKind::NewArray{ element, length: Box::new(length) },
                }
            },
            ES::Index{ span, subject, index } => {
                let subject = self.bind_expression(subject);
                let index = self.bind_index_operand(index);
                let ty = match subject.ty {
                    TypeRef::Array(element) => TypeRef::Primitive(element),
                    TypeRef::Error => TypeRef::Error,
                    _ => {
                        let message = format!("cannot index into a value of type '{}'", self.type_name(&subject.ty));
                        return self.error_expression(*span, message);
                    }
                };
                BoundExpression{
                    span: *span,
                    ty,
                    kind: BoundExpressionKind::Index{ subject: Box::new(subject), index: Box::new(index) },
                }
            },
            ES::Length{ span, subject } => {
                let subject = self.bind_expression(subject);
                match subject.ty {
                    TypeRef::Array(_) | TypeRef::String | TypeRef::Error => {},
                    _ => {
                        let message = format!("cannot take the length of a value of type '{}'", self.type_name(&subject.ty));
                        return self.error_expression(*span, message);
                    }
                }
                BoundExpression{
                    span: *span,
                    ty: TypeRef::INT,
                    kind: BoundExpressionKind::Length{ subject: Box::new(subject) },
                }
            },
            ES::Copy{ span, subject } => {
                let subject = self.bind_expression(subject);
                if subject.ty == TypeRef::Void {
                    return self.error_expression(*span, String::from("cannot copy a value of type 'void'"));
                }
                BoundExpression{
                    span: *span,
                    ty: subject.ty,
                    kind: BoundExpressionKind::Copy{ subject: Box::new(subject) },
                }
            },
        }
    }

    fn bind_index_operand(&mut self, expression: &ExpressionSyntax) -> BoundExpression {
        let bound = self.bind_expression(expression);
        self.check_assignable(bound, &TypeRef::INT)
    }

    fn bind_binary(
        &mut self, span: InputSpan, operator: BinaryOperator,
        left: &ExpressionSyntax, right: &ExpressionSyntax
    ) -> BoundExpression {
        let left = self.bind_expression(left);
        let right = self.bind_expression(right);

        let ty = if left.ty.is_error() || right.ty.is_error() {
            Some(TypeRef::Error)
        } else {
            binary_result_type(operator, &left.ty, &right.ty)
        };
        match ty {
            Some(ty) => BoundExpression{
                span,
                ty,
                kind: BoundExpressionKind::Binary{ operator, left: Box::new(left), right: Box::new(right) },
            },
            None => {
                let message = format!(
                    "operator '{}' cannot be applied to '{}' and '{}'",
                    operator.as_str(), self.type_name(&left.ty), self.type_name(&right.ty)
                );
                self.error_expression(span, message)
            }
        }
    }

    fn bind_unary(&mut self, span: InputSpan, operator: UnaryOperator, operand: &ExpressionSyntax) -> BoundExpression {
        use UnaryOperator as UO;

        let operand = self.bind_expression(operand);
        let valid = operand.ty.is_error() || match operator {
            UO::Positive | UO::Negative => operand.ty.is_numeric(),
            UO::LogicalNot => operand.ty == TypeRef::BOOL,
            UO::BitwiseNot => operand.ty.is_integer(),
        };
        if !valid {
            let message = format!(
                "operator '{}' cannot be applied to '{}'",
                operator.as_str(), self.type_name(&operand.ty)
            );
            return self.error_expression(span, message);
        }

        BoundExpression{
            span,
            ty: operand.ty,
            kind: BoundExpressionKind::Unary{ operator, operand: Box::new(operand) },
        }
    }

    fn bind_call(
        &mut self, span: InputSpan, target_type: Option<&Identifier>,
        method: &Identifier, arguments: &[ExpressionSyntax]
    ) -> BoundExpression {
        let arguments: Vec<BoundExpression> = arguments.iter()
            .map(|v| self.bind_expression(v))
            .collect();

        let table = self.table();
        let callee = match self.resolve_method(target_type, method) {
            Ok(callee) => callee,
            Err(message) => return self.error_expression(method.span, message),
        };
        let symbol = &table[callee];
        let parameters = symbol.parameters();
        if parameters.len() != arguments.len() {
            let message = format!(
                "'{}' expects {} argument(s), but {} were given",
                table.qualified_name(callee), parameters.len(), arguments.len()
            );
            return self.error_expression(span, message);
        }

        // Type parameters are inferred from the first argument passed for
        // them, later arguments must agree.
        let num_type_parameters = symbol.as_method().map(|v| v.type_parameters.len()).unwrap_or(0);
        let mut inferred: Vec<Option<TypeRef>> = vec![None; num_type_parameters];
        let mut bound_arguments = Vec::with_capacity(arguments.len());
        for (argument, parameter) in arguments.into_iter().zip(parameters.iter()) {
            let parameter_type = table[*parameter].declared_type;
            let argument = match type_parameter_ordinal(table, &parameter_type) {
                Some(ordinal) => match inferred[ordinal].clone() {
                    Some(expected) => self.check_assignable(argument, &expected),
                    None if argument.ty == TypeRef::Void => {
                        let message = String::from("cannot pass a value of type 'void'");
                        self.error_expression(argument.span, message)
                    },
                    None => {
                        if !argument.ty.is_error() {
                            inferred[ordinal] = Some(argument.ty);
                        }
                        argument
                    }
                },
                None => self.check_assignable(argument, &parameter_type),
            };
            bound_arguments.push(argument);
        }

        let ty = match type_parameter_ordinal(table, &symbol.declared_type) {
            Some(ordinal) => match inferred[ordinal] {
                Some(ty) => ty,
                None => {
                    let message = format!(
                        "cannot infer the return type of '{}'",
                        table.qualified_name(callee)
                    );
                    return self.error_expression(span, message);
                }
            },
            None => symbol.declared_type,
        };

        BoundExpression{
            span,
            ty,
            kind: BoundExpressionKind::Call{ method: callee, arguments: bound_arguments },
        }
    }

    fn resolve_method(&self, target_type: Option<&Identifier>, method: &Identifier) -> Result<SymbolId, String> {
        let table = self.table();
        match target_type {
            Some(target_type) => {
                let type_id = table.lookup_type(&target_type.value)
                    .ok_or_else(|| format!("unknown type '{}'", &target_type.value))?;
                let type_symbol = table[type_id].as_type()
                    .ok_or_else(|| format!("'{}' is not a type", &target_type.value))?;
                type_symbol.methods.iter()
                    .copied()
                    .find(|id| table[*id].name == method.value)
                    .ok_or_else(|| format!("type '{}' has no method '{}'", &target_type.value, &method.value))
            },
            None => match self.scope.lookup(&method.value) {
                Some(ScopeEntry::Symbol(id)) if table[id].as_method().is_some() => Ok(id),
                Some(_) => Err(format!("'{}' is not a method", &method.value)),
                None => Err(format!("unknown method '{}'", &method.value)),
            }
        }
    }

    fn resolve_variable(&self, identifier: &Identifier) -> Result<(Variable, TypeRef), String> {
        match self.scope.lookup(&identifier.value) {
            Some(ScopeEntry::Local(id)) => {
                Ok((Variable::Local(id), self.locals.get(id).declared_type))
            },
            Some(ScopeEntry::Symbol(id)) => {
                let symbol = &self.table()[id];
                match symbol.kind {
                    SymbolKind::Parameter{ ordinal } => Ok((Variable::Parameter(ordinal), symbol.declared_type)),
                    _ => Err(format!("'{}' is not a variable", &identifier.value)),
                }
            },
            None => Err(format!("unknown name '{}'", &identifier.value)),
        }
    }

    fn resolve_type(&self, syntax: &TypeSyntax) -> Result<TypeRef, String> {
        if let Some(builtin) = TypeRef::from_builtin_name(&syntax.name, syntax.is_array) {
            return Ok(builtin);
        }

        if !syntax.is_array {
            if let Some(ScopeEntry::Symbol(id)) = self.scope.lookup(&syntax.name) {
                if let SymbolKind::TypeParameter{ .. } = self.table()[id].kind {
                    return Ok(TypeRef::Generic(id));
                }
            }
        }

        let suffix = if syntax.is_array { "[]" } else { "" };
        Err(format!("unknown type '{}{}'", &syntax.name, suffix))
    }

    /// Returns the expression if its type matches `expected`, otherwise an
    /// error node in its place. Error types match anything, the original
    /// problem has been reported already.
    fn check_assignable(&mut self, expression: BoundExpression, expected: &TypeRef) -> BoundExpression {
        if expression.ty.is_error() || expected.is_error() || expression.ty == *expected {
            return expression;
        }

        let message = format!(
            "expected a value of type '{}', found '{}'",
            self.type_name(expected), self.type_name(&expression.ty)
        );
        self.error_expression(expression.span, message)
    }

    fn describe_entry(&self, entry: ScopeEntry) -> &'static str {
        match entry {
            ScopeEntry::Local(_) => " as a local",
            ScopeEntry::Symbol(id) => match self.table()[id].kind {
                SymbolKind::Parameter{ .. } => " as a parameter",
                SymbolKind::TypeParameter{ .. } => " as a type parameter",
                _ => "",
            },
        }
    }
}

fn literal_type(literal: &Literal) -> TypeRef {
    match literal {
        Literal::Bool(_) => TypeRef::BOOL,
        Literal::Int(_) => TypeRef::INT,
        Literal::Long(_) => TypeRef::LONG,
        Literal::Float(_) => TypeRef::FLOAT,
        Literal::String(_) => TypeRef::String,
    }
}

fn default_value(ty: &TypeRef) -> Option<Literal> {
    match ty {
        TypeRef::Primitive(PrimitiveType::Bool) => Some(Literal::Bool(false)),
        TypeRef::Primitive(PrimitiveType::Int) => Some(Literal::Int(0)),
        TypeRef::Primitive(PrimitiveType::Long) => Some(Literal::Long(0)),
        TypeRef::Primitive(PrimitiveType::Float) => Some(Literal::Float(0.0)),
        TypeRef::String => Some(Literal::String(String::new())),
        _ => None,
    }
}

fn type_parameter_ordinal(table: &SymbolTable, ty: &TypeRef) -> Option<usize> {
    match ty {
        TypeRef::Generic(id) => match table[*id].kind {
            SymbolKind::TypeParameter{ ordinal } => Some(ordinal as usize),
            _ => None,
        },
        _ => None,
    }
}

/// Result type of a binary operator, `None` if the operand types do not
/// support it. Operands always have to be of the same type.
fn binary_result_type(operator: BinaryOperator, left: &TypeRef, right: &TypeRef) -> Option<TypeRef> {
    use BinaryOperator as BO;

    if left != right || *left == TypeRef::Void {
        return None;
    }

    let valid = match operator {
        BO::Add => left.is_numeric() || *left == TypeRef::String,
        BO::Subtract | BO::Multiply | BO::Divide | BO::Remainder => left.is_numeric(),
        BO::Equality | BO::Inequality => return Some(TypeRef::BOOL),
        BO::LessThan | BO::GreaterThan | BO::LessThanEqual | BO::GreaterThanEqual => {
            return if left.is_numeric() { Some(TypeRef::BOOL) } else { None };
        },
        BO::LogicalAnd | BO::LogicalOr => *left == TypeRef::BOOL,
        BO::BitwiseAnd | BO::BitwiseOr | BO::BitwiseXor => *left == TypeRef::BOOL || left.is_integer(),
    };

    if valid { Some(*left) } else { None }
}
