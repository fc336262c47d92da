use super::*;
use crate::lang::{
    BoundExpressionKind, BoundMember, BoundStatement, MethodBinder, Scope, Variable,
    symbols::{SymbolTable, TypeRef},
};

#[test]
fn test_signature_and_statement_counts() {
    let mut table = SymbolTable::new();
    let program = table.declare_type("Program").unwrap();
    let method = table.declare_method(
        program, "pick", "T", &["T", "U"], &[("first", "T"), ("second", "U"), ("flag", "bool")]
    ).unwrap();
    let root = table[program].as_type().unwrap().members_scope;

    let syntax = method_syntax("pick", vec![
        expr(name("second")),
        if_else(name("flag"), vec![ret(name("first"))], None),
        ret(name("first")),
    ]);

    let mut scope = Scope::new(&table, root);
    let mut binder = MethodBinder::new(&mut scope);
    let bound = binder.bind(&syntax, &[method]);
    assert!(!binder.diagnostics().has_errors(), "{}", binder.diagnostics());
    drop(binder);

    // Two type parameters and three parameters
    assert_eq!(scope.num_entries(), 5);
    assert_eq!(bound.statements().len(), 3);
    assert!(bound.locals().unwrap().is_empty());
    match &bound {
        BoundMember::Method(method) => assert_eq!(method.statements.len(), 3),
        other => panic!("expected a bound method, got {:?}", other),
    }
}

#[test]
fn test_constructor_returning_parameter() {
    Tester::new_program("constructor returning x")
        .with_constructor("Program", &[("x", "int"), ("y", "int")], vec![ret(name("x"))])
        .compile_ok()
        .for_member("Program.ctor", |m| {
            let m = m.assert_num_statements(1).assert_num_locals(0);
            match m.bound() {
                BoundMember::Constructor(ctor) => match &ctor.statements[0] {
                    BoundStatement::Return{ expression: Some(expression), .. } => {
                        assert_eq!(expression.kind, BoundExpressionKind::Variable(Variable::Parameter(0)));
                        assert_eq!(expression.ty, TypeRef::INT);
                    },
                    other => panic!("expected a return statement, got {:?}", other),
                },
                other => panic!("expected a bound constructor, got {:?}", other),
            }
        });
}

#[test]
fn test_malformed_bind_calls() {
    let mut table = SymbolTable::new();
    let program = table.declare_type("Program").unwrap();
    let method = table.declare_method(program, "main", "void", &[], &[]).unwrap();
    let ctor = table.declare_constructor(program, &[]).unwrap();
    let root = table[program].as_type().unwrap().members_scope;

    let method_node = method_syntax("main", vec![]);
    let ctor_node = constructor_syntax(vec![]);
    let cases: Vec<(&str, &crate::lang::ast::MemberSyntax, Vec<_>)> = vec![
        ("no symbol", &method_node, vec![]),
        ("two symbols", &method_node, vec![method, ctor]),
        ("type symbol", &method_node, vec![program]),
        ("method syntax, constructor symbol", &method_node, vec![ctor]),
        ("constructor syntax, method symbol", &ctor_node, vec![method]),
    ];

    for (case, node, args) in cases {
        let mut scope = Scope::new(&table, root);
        let mut binder = MethodBinder::new(&mut scope);
        let bound = binder.bind(node, &args);
        match &bound {
            BoundMember::Error(error) => assert!(error.diagnostics.has_errors(), "[{}] no diagnostics", case),
            other => panic!("[{}] expected an error member, got {:?}", case, other),
        }
        assert!(binder.diagnostics().has_errors(), "[{}] diagnostics not reported", case);
        assert!(bound.symbol().is_none());
        drop(binder);
        assert_eq!(scope.num_entries(), 0, "[{}] signature was registered", case);
    }
}

#[test]
fn test_symbol_from_another_table() {
    let mut table = SymbolTable::new();
    let program = table.declare_type("Program").unwrap();
    table.declare_method(program, "a", "void", &[], &[]).unwrap();
    let elsewhere = table.declare_method(program, "b", "void", &[], &[]).unwrap();

    let mut small = SymbolTable::new();
    small.declare_type("Program").unwrap();
    let root = small.global_scope();

    let mut scope = Scope::new(&small, root);
    let mut binder = MethodBinder::new(&mut scope);
    let bound = binder.bind(&method_syntax("b", vec![]), &[elsewhere]);
    match &bound {
        BoundMember::Error(error) => assert!(error.diagnostics.has_errors()),
        other => panic!("expected an error member, got {:?}", other),
    }
    drop(binder);
    assert_eq!(scope.num_entries(), 0);
}

#[test]
fn test_unresolved_names_become_error_nodes() {
    Tester::new_program("unresolved names")
        .with_method("Program", "main", "int", &[], vec![
            local("int", "a", name("missing")),
            expr(call("nothing", vec![])),
            ret(name("a")),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("unknown name 'missing'")
        .assert_diagnostic_containing("unknown method 'nothing'")
        .assert_emit_error("Program.main", "unknown name 'missing'")
        .assert_emitted(&[])
        .for_member("Program.main", |m| {
            // Every statement still produces exactly one bound statement
            let m = m.assert_num_statements(3).assert_num_locals(1);
            match &m.bound().statements()[1] {
                BoundStatement::Expression{ expression, .. } => assert!(expression.ty.is_error()),
                other => panic!("expected an expression statement, got {:?}", other),
            }
        });
}

#[test]
fn test_duplicate_names() {
    Tester::new_program("duplicate local")
        .with_method("Program", "main", "void", &[("x", "int")], vec![
            local("int", "x", int(1)),
            local("int", "y", int(2)),
            local("long", "y", long(3)),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("'x' is already defined in this scope as a parameter")
        .assert_diagnostic_containing("'y' is already defined in this scope as a local")
        .for_member("Program.main", |m| {
            let m = m.assert_num_statements(3).assert_num_locals(1);
            assert!(matches!(m.bound().statements()[0], BoundStatement::Error(_)));
            assert!(matches!(m.bound().statements()[2], BoundStatement::Error(_)));
        });

    Tester::new_program("duplicate in signature")
        .with_generic_method("Program", "twice", "void", &["T"], &[("T", "int")], vec![])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("'T' is declared more than once in the signature of 'Program.twice'");

    // The parameter keeps a name it shares with a type parameter
    Tester::new_program("parameter and type parameter")
        .with_generic_method("Program", "f", "int", &["x"], &[("x", "int")], vec![ret(name("x"))])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("'x' is declared more than once in the signature of 'Program.f'")
        .for_member("Program.f", |m| {
            let m = m.assert_num_statements(1);
            match &m.bound().statements()[0] {
                BoundStatement::Return{ expression: Some(expression), .. } => {
                    assert_eq!(expression.kind, BoundExpressionKind::Variable(Variable::Parameter(0)));
                    assert_eq!(expression.ty, TypeRef::INT);
                },
                other => panic!("expected a return of the parameter, got {:?}", other),
            }
        });
}

#[test]
fn test_shadowing_in_nested_blocks() {
    Tester::new_program("shadowing")
        .with_method("Program", "main", "long", &[], vec![
            local("int", "value", int(1)),
            nested(vec![
                local("long", "value", long(2)),
                ret(name("value")),
            ]),
            ret(binary(name("value"), BO::Add, int(0))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("expected a value of type 'long', found 'int'")
        .for_member("Program.main", |m| {
            m.assert_num_statements(3).assert_num_locals(2);
        });
}

#[test]
fn test_return_checks() {
    Tester::new_program("wrong return type")
        .with_method("Program", "main", "int", &[], vec![ret(boolean(true))])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("expected a value of type 'int', found 'bool'");

    Tester::new_program("missing return value")
        .with_method("Program", "main", "string", &[], vec![ret_void()])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("must return a value of type 'string'");

    Tester::new_program("value from void method")
        .with_method("Program", "main", "void", &[], vec![ret(int(1))])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("does not return a value");

    Tester::new_program("constructor returns")
        .with_constructor("Program", &[], vec![
            if_else(boolean(false), vec![ret_void()], None),
            ret(string("made")),
        ])
        .compile_ok();
}

#[test]
fn test_operator_typing() {
    Tester::new_program("valid operators")
        .with_method("Program", "main", "bool", &[("a", "int"), ("b", "float"), ("s", "string")], vec![
            local("int", "i", binary(name("a"), BO::BitwiseXor, unary(UO::BitwiseNot, name("a")))),
            local("float", "f", unary(UO::Negative, binary(name("b"), BO::Remainder, float(2.0)))),
            local("string", "t", binary(name("s"), BO::Add, string("!"))),
            ret(binary(
                binary(name("i"), BO::LessThan, int(3)),
                BO::LogicalOr,
                binary(name("t"), BO::Equality, name("s")),
            )),
        ])
        .compile_ok();

    Tester::new_program("mixed operands")
        .with_method("Program", "main", "int", &[("a", "int"), ("b", "long")], vec![
            ret(binary(name("a"), BO::Add, name("b"))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("operator '+' cannot be applied to 'int' and 'long'");

    Tester::new_program("logical on integers")
        .with_method("Program", "main", "bool", &[("a", "int")], vec![
            ret(binary(name("a"), BO::LogicalAnd, name("a"))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("operator '&&' cannot be applied to 'int' and 'int'");

    Tester::new_program("not on floats")
        .with_method("Program", "main", "float", &[("a", "float")], vec![
            ret(unary(UO::LogicalNot, name("a"))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("operator '!' cannot be applied to 'float'");

    Tester::new_program("arithmetic on archives")
        .with_method("Program", "main", "archive", &[("a", "archive")], vec![
            ret(binary(name("a"), BO::Multiply, name("a"))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("operator '*' cannot be applied to 'archive' and 'archive'");
}

#[test]
fn test_locals_and_defaults() {
    Tester::new_program("defaults")
        .with_method("Program", "main", "string", &[], vec![
            local_default("int", "count"),
            local_default("string", "text"),
            local_default("bool[]", "flags"),
            local_default("void", "nothing"),
            local_default("Program", "program"),
            ret(name("text")),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("local 'flags' of type 'bool[]' must be initialized")
        .assert_diagnostic_containing("local 'nothing' cannot be of type 'void'")
        .assert_diagnostic_containing("unknown type 'Program'")
        .for_member("Program.main", |m| {
            m.assert_num_statements(6).assert_num_locals(2);
        });

    Tester::new_program("initializer sees outer name")
        .with_method("Program", "main", "void", &[], vec![
            local("int", "x", name("x")),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("unknown name 'x'");
}

#[test]
fn test_array_expressions() {
    Tester::new_program("arrays")
        .with_method("Program", "main", "int", &[("n", "int")], vec![
            local("long[]", "values", new_array("long", name("n"))),
            expr(assign_element("values", int(0), long(7))),
            local("long", "first", index(name("values"), int(0))),
            ret(length(name("values"))),
        ])
        .compile_ok();

    Tester::new_program("array errors")
        .with_method("Program", "main", "void", &[("s", "string"), ("a", "int[]")], vec![
            local("string[]", "names", new_array("string", int(1))),
            expr(index(name("s"), int(0))),
            expr(assign_element("a", int(0), boolean(true))),
            expr(index(name("a"), long(0))),
            expr(length(int(3))),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("unknown type 'string[]'")
        .assert_diagnostic_containing("cannot index into a value of type 'string'")
        .assert_diagnostic_containing("expected a value of type 'int', found 'bool'")
        .assert_diagnostic_containing("expected a value of type 'int', found 'long'")
        .assert_diagnostic_containing("cannot take the length of a value of type 'int'");
}

#[test]
fn test_calls_and_inference() {
    Tester::new_program("calls")
        .with_generic_method("Program", "identity", "T", &["T"], &[("value", "T")], vec![ret(name("value"))])
        .with_method("Program", "twice", "int", &[("x", "int")], vec![
            ret(binary(name("x"), BO::Multiply, int(2))),
        ])
        .with_method("Program", "main", "int", &[], vec![
            local("string", "s", call("identity", vec![string("text")])),
            ret(call_on("Program", "twice", vec![call("identity", vec![int(21)])])),
        ])
        .compile_ok();

    Tester::new_program("inference conflict")
        .with_generic_method("Program", "same", "bool", &["T"], &[("a", "T"), ("b", "T")], vec![
            ret(binary(name("a"), BO::Equality, name("b"))),
        ])
        .with_method("Program", "main", "bool", &[], vec![ret(call("same", vec![int(1), long(1)]))])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("expected a value of type 'int', found 'long'");

    Tester::new_program("bad calls")
        .with_type("Other")
        .with_method("Program", "one", "void", &[("x", "int")], vec![])
        .with_method("Program", "main", "void", &[], vec![
            expr(call("one", vec![])),
            expr(call_on("Missing", "one", vec![int(1)])),
            expr(call_on("Other", "one", vec![int(1)])),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("'Program.one' expects 1 argument(s), but 0 were given")
        .assert_diagnostic_containing("unknown type 'Missing'")
        .assert_diagnostic_containing("type 'Other' has no method 'one'");
}

#[test]
fn test_conditions_must_be_bool() {
    Tester::new_program("conditions")
        .with_method("Program", "main", "void", &[("x", "int")], vec![
            if_else(name("x"), vec![], None),
            while_loop(string("forever"), vec![]),
        ])
        .compile()
        .expect_err()
        .assert_diagnostic_containing("condition must be of type 'bool', found 'int'")
        .assert_diagnostic_containing("condition must be of type 'bool', found 'string'");
}

#[test]
fn test_renamed_method_is_reported_as_info() {
    let mut table = SymbolTable::new();
    let program = table.declare_type("Program").unwrap();
    let method = table.declare_method(program, "main", "void", &[], &[]).unwrap();

    let (bound, diagnostics) = crate::lang::bind_member(&table, &method_syntax("start", vec![]), method);
    assert!(!bound.is_error());
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.len(), 1);
}
