use crate::lang::{
    *,
    ast::*,
    eval::*,
    symbols::{SymbolId, SymbolTable},
};

//------------------------------------------------------------------------------
// Building syntax
//------------------------------------------------------------------------------

// Synthesized syntax does not come from a source, spans only need to be
// distinguishable where a test looks at them.
fn span() -> InputSpan {
    InputSpan::default()
}

pub(crate) fn ident(name: &str) -> Identifier {
    Identifier::new(span(), name)
}

pub(crate) fn int(value: i32) -> ExpressionSyntax {
    ExpressionSyntax::Literal{ span: span(), value: Literal::Int(value) }
}

pub(crate) fn long(value: i64) -> ExpressionSyntax {
    ExpressionSyntax::Literal{ span: span(), value: Literal::Long(value) }
}

pub(crate) fn float(value: f64) -> ExpressionSyntax {
    ExpressionSyntax::Literal{ span: span(), value: Literal::Float(value) }
}

pub(crate) fn boolean(value: bool) -> ExpressionSyntax {
    ExpressionSyntax::Literal{ span: span(), value: Literal::Bool(value) }
}

pub(crate) fn string(value: &str) -> ExpressionSyntax {
    ExpressionSyntax::Literal{ span: span(), value: Literal::String(value.to_string()) }
}

pub(crate) fn name(name: &str) -> ExpressionSyntax {
    ExpressionSyntax::Name(ident(name))
}

pub(crate) fn binary(left: ExpressionSyntax, operator: BinaryOperator, right: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Binary{ span: span(), operator, left: Box::new(left), right: Box::new(right) }
}

pub(crate) fn unary(operator: UnaryOperator, operand: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Unary{ span: span(), operator, operand: Box::new(operand) }
}

pub(crate) fn assign(target: &str, value: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Assignment{ span: span(), target: ident(target), value: Box::new(value) }
}

pub(crate) fn assign_element(target: &str, index: ExpressionSyntax, value: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::ElementAssignment{
        span: span(), target: ident(target), index: Box::new(index), value: Box::new(value),
    }
}

pub(crate) fn call(method: &str, arguments: Vec<ExpressionSyntax>) -> ExpressionSyntax {
    ExpressionSyntax::Call{ span: span(), target_type: None, method: ident(method), arguments }
}

pub(crate) fn call_on(target_type: &str, method: &str, arguments: Vec<ExpressionSyntax>) -> ExpressionSyntax {
    ExpressionSyntax::Call{ span: span(), target_type: Some(ident(target_type)), method: ident(method), arguments }
}

pub(crate) fn new_archive(name: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::NewArchive{ span: span(), name: Box::new(name) }
}

pub(crate) fn new_array(element: &str, length: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::NewArray{ span: span(), element_type: type_syntax(element), length: Box::new(length) }
}

pub(crate) fn index(subject: ExpressionSyntax, index: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Index{ span: span(), subject: Box::new(subject), index: Box::new(index) }
}

pub(crate) fn length(subject: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Length{ span: span(), subject: Box::new(subject) }
}

pub(crate) fn copy(subject: ExpressionSyntax) -> ExpressionSyntax {
    ExpressionSyntax::Copy{ span: span(), subject: Box::new(subject) }
}

/// `int`, `T` or `long[]`
pub(crate) fn type_syntax(written: &str) -> TypeSyntax {
    match written.strip_suffix("[]") {
        Some(element) => TypeSyntax{ span: span(), name: element.to_string(), is_array: true },
        None => TypeSyntax{ span: span(), name: written.to_string(), is_array: false },
    }
}

pub(crate) fn local(type_name: &str, name: &str, initializer: ExpressionSyntax) -> StatementSyntax {
    StatementSyntax::Local(LocalStatementSyntax{
        span: span(),
        type_annotation: type_syntax(type_name),
        identifier: ident(name),
        initializer: Some(initializer),
    })
}

pub(crate) fn local_default(type_name: &str, name: &str) -> StatementSyntax {
    StatementSyntax::Local(LocalStatementSyntax{
        span: span(),
        type_annotation: type_syntax(type_name),
        identifier: ident(name),
        initializer: None,
    })
}

pub(crate) fn expr(expression: ExpressionSyntax) -> StatementSyntax {
    StatementSyntax::Expression(ExpressionStatementSyntax{ span: span(), expression })
}

pub(crate) fn ret(expression: ExpressionSyntax) -> StatementSyntax {
    StatementSyntax::Return(ReturnStatementSyntax{ span: span(), expression: Some(expression) })
}

pub(crate) fn ret_void() -> StatementSyntax {
    StatementSyntax::Return(ReturnStatementSyntax{ span: span(), expression: None })
}

pub(crate) fn block(statements: Vec<StatementSyntax>) -> BlockSyntax {
    BlockSyntax{ span: span(), statements }
}

pub(crate) fn nested(statements: Vec<StatementSyntax>) -> StatementSyntax {
    StatementSyntax::Block(block(statements))
}

pub(crate) fn if_else(test: ExpressionSyntax, true_body: Vec<StatementSyntax>, false_body: Option<Vec<StatementSyntax>>) -> StatementSyntax {
    StatementSyntax::If(IfStatementSyntax{
        span: span(),
        test,
        true_body: block(true_body),
        false_body: false_body.map(block),
    })
}

pub(crate) fn while_loop(test: ExpressionSyntax, body: Vec<StatementSyntax>) -> StatementSyntax {
    StatementSyntax::While(WhileStatementSyntax{ span: span(), test, body: block(body) })
}

pub(crate) fn method_syntax(name: &str, body: Vec<StatementSyntax>) -> MemberSyntax {
    MemberSyntax::Method(MethodDeclarationSyntax{ span: span(), identifier: ident(name), body: block(body) })
}

pub(crate) fn constructor_syntax(body: Vec<StatementSyntax>) -> MemberSyntax {
    MemberSyntax::Constructor(ConstructorDeclarationSyntax{ span: span(), body: block(body) })
}

//------------------------------------------------------------------------------
// Interface for declaring and compiling
//------------------------------------------------------------------------------

pub(crate) struct Tester {
    test_name: String,
    table: SymbolTable,
    units: Vec<MemberUnit>,
}

impl Tester {
    pub(crate) fn new<S: ToString>(test_name: S) -> Self {
        Self{
            test_name: test_name.to_string(),
            table: SymbolTable::new(),
            units: Vec::new(),
        }
    }

    /// Utility for the common case of a single `Program` type whose members
    /// are all expected to compile.
    pub(crate) fn new_program<S: ToString>(test_name: S) -> Self {
        Self::new(test_name).with_type("Program")
    }

    pub(crate) fn with_type(mut self, name: &str) -> Self {
        if let Err(err) = self.table.declare_type(name) {
            panic!("[{}] failed to declare type '{}': {}", self.test_name, name, err);
        }
        self
    }

    pub(crate) fn with_method(
        self, owner: &str, name: &str, return_type: &str,
        parameters: &[(&str, &str)], body: Vec<StatementSyntax>
    ) -> Self {
        self.with_generic_method(owner, name, return_type, &[], parameters, body)
    }

    pub(crate) fn with_generic_method(
        mut self, owner: &str, name: &str, return_type: &str,
        type_parameters: &[&str], parameters: &[(&str, &str)], body: Vec<StatementSyntax>
    ) -> Self {
        let owner_id = self.owner(owner);
        let symbol = match self.table.declare_method(owner_id, name, return_type, type_parameters, parameters) {
            Ok(symbol) => symbol,
            Err(err) => panic!("[{}] failed to declare '{}.{}': {}", self.test_name, owner, name, err),
        };
        self.units.push(MemberUnit::new(method_syntax(name, body), symbol));
        self
    }

    pub(crate) fn with_constructor(mut self, owner: &str, parameters: &[(&str, &str)], body: Vec<StatementSyntax>) -> Self {
        let owner_id = self.owner(owner);
        let symbol = match self.table.declare_constructor(owner_id, parameters) {
            Ok(symbol) => symbol,
            Err(err) => panic!("[{}] failed to declare constructor of '{}': {}", self.test_name, owner, err),
        };
        self.units.push(MemberUnit::new(constructor_syntax(body), symbol));
        self
    }

    fn owner(&self, name: &str) -> SymbolId {
        match self.table.lookup_type(name) {
            Some(id) => id,
            None => panic!("[{}] type '{}' is not declared", self.test_name, name),
        }
    }

    pub(crate) fn compile(self) -> CompiledTester {
        let output = compile(&self.table, &self.units);
        CompiledTester{
            test_name: self.test_name,
            table: self.table,
            units: self.units,
            output,
        }
    }

    /// Compiles and expects every member to make it into the image
    pub(crate) fn compile_ok(self) -> CompiledTester {
        self.compile().expect_ok()
    }
}

//------------------------------------------------------------------------------
// Interface for compiled members
//------------------------------------------------------------------------------

pub(crate) struct CompiledTester {
    test_name: String,
    table: SymbolTable,
    units: Vec<MemberUnit>,
    output: CompileOutput,
}

impl CompiledTester {
    pub(crate) fn expect_ok(self) -> Self {
        if !self.output.is_complete() {
            println!("DEBUG: Diagnostics:\n{}", &self.output.diagnostics);
            for error in &self.output.emit_errors {
                println!("DEBUG: {}", error);
            }
            panic!("[{}] Expected compilation to succeed, but it failed", self.test_name);
        }
        self
    }

    pub(crate) fn expect_err(self) -> Self {
        assert!(
            !self.output.is_complete(),
            "[{}] Expected compilation to fail, but it succeeded", self.test_name
        );
        self
    }

    pub(crate) fn image(&self) -> &Image {
        &self.output.image
    }

    pub(crate) fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub(crate) fn units(&self) -> &[MemberUnit] {
        &self.units
    }

    pub(crate) fn assert_diagnostic_containing(self, text: &str) -> Self {
        let found = self.output.diagnostics.iter().any(|v| v.message.contains(text));
        assert!(
            found, "[{}] Expected a diagnostic containing '{}', got:\n{}",
            self.test_name, text, &self.output.diagnostics
        );
        self
    }

    pub(crate) fn assert_num_emit_errors(self, num: usize) -> Self {
        assert_eq!(
            self.output.emit_errors.len(), num,
            "[{}] Expected {} emission error(s), got {:?}", self.test_name, num, &self.output.emit_errors
        );
        self
    }

    pub(crate) fn assert_emit_error(self, member: &str, text: &str) -> Self {
        let found = self.output.emit_errors.iter()
            .any(|v| v.member == member && v.message.contains(text));
        assert!(
            found, "[{}] Expected an emission error for '{}' containing '{}', got {:?}",
            self.test_name, member, text, &self.output.emit_errors
        );
        self
    }

    pub(crate) fn assert_emitted(self, members: &[&str]) -> Self {
        let emitted: Vec<&str> = (0..self.image().members().len() as u32)
            .map(|idx| self.image().member_name(idx))
            .collect();
        assert_eq!(emitted, members, "[{}] Unexpected set of emitted members", self.test_name);
        self
    }

    pub(crate) fn for_member<F: Fn(MemberTester)>(self, name: &str, f: F) -> Self {
        let position = self.units.iter()
            .position(|unit| self.table.qualified_name(unit.symbol) == name);
        let position = match position {
            Some(position) => position,
            None => panic!("[{}] No member named '{}'", self.test_name, name),
        };

        let code = self.image().member_index(name).map(|idx| self.image().member(idx));
        f(MemberTester{
            test_name: &self.test_name,
            name,
            bound: &self.output.bound[position],
            code,
        });
        self
    }

    /// Runs a member on a fresh heap with the default configuration
    pub(crate) fn call(&self, member: &str, arguments: Vec<Argument>) -> CallTester {
        self.call_with(member, arguments, Heap::new(1 << 16), default_config())
    }

    pub(crate) fn call_with(&self, member: &str, arguments: Vec<Argument>, heap: Heap, config: EvalConfig) -> CallTester {
        let index = match self.image().member_index(member) {
            Some(index) => index,
            None => panic!("[{}] Image has no member '{}'", self.test_name, member),
        };
        run_member(&self.test_name, self.image(), index, arguments, heap, config)
    }
}

pub(crate) fn default_config() -> EvalConfig {
    EvalConfig{ max_call_depth: 64, reclaim_policy: ReclaimPolicy::Bulk }
}

pub(crate) fn run_member(
    test_name: &str, image: &Image, index: u32, arguments: Vec<Argument>, mut heap: Heap, config: EvalConfig
) -> CallTester {
    let result = Prompt::new(image, index, arguments, &mut heap, config)
        .and_then(|mut prompt| prompt.run(&mut heap));
    CallTester{ test_name: test_name.to_string(), result, heap }
}

/// Runs a single hand assembled method `T.m` without parameters. Its name
/// takes constant 0, so `constants` are numbered from 1.
pub(crate) fn run_code(
    constants: Vec<Literal>, return_type: TypeTag, num_locals: u16, instructions: Vec<Instruction>
) -> CallTester {
    let mut all = vec![Literal::String(String::from("T.m"))];
    all.extend(constants);
    let code = MemberCode{
        name: 0,
        kind: MemberKind::Method,
        return_type,
        parameters: Vec::new(),
        num_locals,
        instructions,
    };
    let image = match Image::new(all, vec![code]) {
        Ok(image) => image,
        Err(err) => panic!("[hand assembled] invalid image: {}", err),
    };
    run_member("hand assembled", &image, 0, Vec::new(), Heap::new(1024), default_config())
}

pub(crate) struct MemberTester<'a> {
    test_name: &'a str,
    name: &'a str,
    bound: &'a BoundMember,
    code: Option<&'a MemberCode>,
}

impl<'a> MemberTester<'a> {
    pub(crate) fn bound(&self) -> &BoundMember {
        self.bound
    }

    pub(crate) fn code(&self) -> &MemberCode {
        match self.code {
            Some(code) => code,
            None => panic!("[{}] Member '{}' was not emitted", self.test_name, self.name),
        }
    }

    pub(crate) fn assert_num_statements(self, num: usize) -> Self {
        assert_eq!(
            self.bound.statements().len(), num,
            "[{}] Expected {} bound statement(s) in '{}'", self.test_name, num, self.name
        );
        self
    }

    pub(crate) fn assert_num_locals(self, num: usize) -> Self {
        let locals = self.bound.locals().map(|v| v.len());
        assert_eq!(locals, Some(num), "[{}] Expected {} local(s) in '{}'", self.test_name, num, self.name);
        self
    }

    pub(crate) fn assert_opcodes(self, expected: &[OpCode]) -> Self {
        let opcodes: Vec<OpCode> = self.code().instructions.iter().map(|v| v.opcode).collect();
        assert_eq!(opcodes, expected, "[{}] Unexpected code for '{}'", self.test_name, self.name);
        self
    }
}

pub(crate) struct CallTester {
    test_name: String,
    result: Result<Option<RuntimeObject>, EvalError>,
    heap: Heap,
}

impl CallTester {
    pub(crate) fn result(&self) -> &Result<Option<RuntimeObject>, EvalError> {
        &self.result
    }

    pub(crate) fn heap(&self) -> &Heap {
        &self.heap
    }

    pub(crate) fn object(&self) -> &RuntimeObject {
        match &self.result {
            Ok(Some(object)) => object,
            Ok(None) => panic!("[{}] Expected a returned object, got nothing", self.test_name),
            Err(err) => panic!("[{}] Expected a returned object, got:\n{}", self.test_name, err),
        }
    }

    /// Asserts the display form of the returned object
    pub(crate) fn expect_display(self, expected: &str) -> Self {
        assert_eq!(self.object().display(), expected, "[{}] Unexpected result", self.test_name);
        self
    }

    pub(crate) fn expect_value(self, expected: PrimitiveValue) -> Self {
        assert_eq!(self.object().as_primitive(), Some(expected), "[{}] Unexpected result", self.test_name);
        self
    }

    pub(crate) fn expect_nothing(self) -> Self {
        match &self.result {
            Ok(None) => {},
            other => panic!("[{}] Expected no returned object, got {:?}", self.test_name, other),
        }
        self
    }

    pub(crate) fn expect_fault(self, expected: RuntimeFault) -> Self {
        match &self.result {
            Err(err) => assert_eq!(err.fault, expected, "[{}] Unexpected fault", self.test_name),
            Ok(v) => panic!("[{}] Expected fault {}, got {:?}", self.test_name, expected, v),
        }
        self
    }

    pub(crate) fn error(&self) -> &EvalError {
        match &self.result {
            Err(err) => err,
            Ok(v) => panic!("[{}] Expected a fault, got {:?}", self.test_name, v),
        }
    }
}
