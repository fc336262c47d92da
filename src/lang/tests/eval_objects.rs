use super::*;
use crate::lang::{
    ast::Literal,
    eval::{EvalFrame, OpaqueDocument},
    symbols::PrimitiveType,
    Instruction, OpCode, TypeTag,
};
use std::sync::Arc;

fn op(opcode: OpCode) -> Instruction {
    Instruction::new(opcode)
}

fn ldc(index: u32) -> Instruction {
    Instruction::with_operand(OpCode::Ldc, index)
}

fn invalid(opcode: OpCode, type_name: &'static str, other: Option<&'static str>) -> RuntimeFault {
    RuntimeFault::InvalidOperation{ opcode, type_name, other }
}

#[test]
fn test_archive_identity() {
    let compiled = Tester::new_program("archive identity")
        .with_method("Program", "compare", "bool", &[], vec![
            local("archive", "a", new_archive(string("doc"))),
            local("archive", "b", copy(name("a"))),
            local("archive", "c", name("a")),
            ret(binary(
                binary(name("a"), BO::Equality, name("c")),
                BO::LogicalAnd,
                binary(name("a"), BO::Inequality, name("b")),
            )),
        ])
        .with_method("Program", "same_name", "bool", &[], vec![
            ret(binary(new_archive(string("doc")), BO::Equality, new_archive(string("doc")))),
        ])
        .with_method("Program", "copied", "archive", &[], vec![
            ret(copy(new_archive(string("notes")))),
        ])
        .compile_ok();

    compiled.call("Program.compare", vec![]).expect_value(PV::Bool(true));
    compiled.call("Program.same_name", vec![]).expect_value(PV::Bool(false));

    let tester = compiled.call("Program.copied", vec![]).expect_display("notes");
    let copy = tester.object();
    // "notes" (9 bytes) and the original handle come first
    assert_eq!(copy.address(), 9 + 8);
    let original = tester.heap().object_at(9).unwrap().as_archive().unwrap();
    let copied = copy.as_archive().unwrap();
    assert!(Arc::ptr_eq(original.document(), copied.document()));
}

#[test]
fn test_archives_reject_arithmetic() {
    let tester = run_code(
        vec![Literal::String(String::from("doc"))], TypeTag::ARCHIVE, 0,
        vec![ldc(1), op(OpCode::Newarc), ldc(1), op(OpCode::Newarc), op(OpCode::Add), op(OpCode::Ret)],
    ).expect_fault(invalid(OpCode::Add, "archive", Some("archive")));

    assert_eq!(tester.error().frames, vec![EvalFrame{ member: String::from("T.m"), instruction: 4 }]);
    assert!(tester.error().to_string().contains("invalid operation Add for type 'archive' with operand of type 'archive'"));

    run_code(
        vec![Literal::String(String::from("doc"))], TypeTag::ARCHIVE, 0,
        vec![ldc(1), op(OpCode::Newarc), op(OpCode::Neg), op(OpCode::Ret)],
    ).expect_fault(invalid(OpCode::Neg, "archive", None));
}

#[test]
fn test_mixed_operands_are_rejected() {
    let constants = vec![Literal::Int(1), Literal::Long(2), Literal::String(String::from("s")), Literal::Bool(true)];

    run_code(constants.clone(), TypeTag::INT, 0, vec![ldc(1), ldc(2), op(OpCode::Add), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Add, "int", Some("long")));
    run_code(constants.clone(), TypeTag::STRING, 0, vec![ldc(3), ldc(1), op(OpCode::Add), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Add, "string", Some("int")));
    run_code(constants.clone(), TypeTag::STRING, 0, vec![ldc(3), ldc(3), op(OpCode::Sub), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Sub, "string", Some("string")));
    run_code(constants.clone(), TypeTag::BOOL, 0, vec![ldc(4), ldc(4), op(OpCode::Clt), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Clt, "bool", Some("bool")));
    run_code(constants.clone(), TypeTag::BOOL, 0, vec![ldc(4), op(OpCode::Neg), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Neg, "bool", None));
    run_code(constants.clone(), TypeTag::INT, 0, vec![ldc(3), op(OpCode::Ldlen), ldc(2), op(OpCode::Ldlen), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Ldlen, "long", None));
    run_code(constants, TypeTag::VOID, 0, vec![ldc(1), Instruction::with_operand(OpCode::Brtrue, 0), op(OpCode::Ret)])
        .expect_fault(invalid(OpCode::Brtrue, "int", None));
}

#[test]
fn test_string_operations() {
    let compiled = Tester::new_program("strings")
        .with_method("Program", "greet", "string", &[("s", "string")], vec![
            local("string", "t", binary(name("s"), BO::Add, string("!"))),
            if_else(binary(name("t"), BO::Equality, string("hi!")), vec![
                ret(binary(name("t"), BO::Add, name("t"))),
            ], None),
            ret(string("no")),
        ])
        .with_method("Program", "bytes", "int", &[("s", "string")], vec![ret(length(name("s")))])
        .with_method("Program", "differ", "bool", &[("a", "string"), ("b", "string")], vec![
            ret(binary(name("a"), BO::Inequality, name("b"))),
        ])
        .compile_ok();

    compiled.call("Program.greet", vec![Argument::String(String::from("hi"))]).expect_display("hi!hi!");
    compiled.call("Program.greet", vec![Argument::String(String::from("yo"))]).expect_display("no");
    compiled.call("Program.bytes", vec![Argument::String(String::from("päper"))]).expect_value(PV::Int(6));
    compiled.call("Program.bytes", vec![Argument::String(String::new())]).expect_value(PV::Int(0));

    // Strings compare by content, not by address
    let same = vec![Argument::String(String::from("x")), Argument::String(String::from("x"))];
    compiled.call("Program.differ", same).expect_value(PV::Bool(false));
    let different = vec![Argument::String(String::from("x")), Argument::String(String::from("y"))];
    compiled.call("Program.differ", different).expect_value(PV::Bool(true));
}

#[test]
fn test_arrays_are_values_with_identity() {
    let compiled = Tester::new_program("array identity")
        .with_method("Program", "alias", "bool", &[], vec![
            local("int[]", "a", new_array("int", int(2))),
            local("int[]", "b", name("a")),
            ret(binary(name("a"), BO::Equality, name("b"))),
        ])
        .with_method("Program", "store", "bool", &[], vec![
            local("int[]", "a", new_array("int", int(2))),
            local("int[]", "b", name("a")),
            expr(assign_element("a", int(0), int(1))),
            ret(binary(name("a"), BO::Equality, name("b"))),
        ])
        .with_method("Program", "updated", "int[]", &[], vec![
            local("int[]", "a", new_array("int", int(3))),
            local("int[]", "b", name("a")),
            expr(assign_element("a", int(1), int(7))),
            ret(name("a")),
        ])
        .with_method("Program", "untouched", "int[]", &[], vec![
            local("int[]", "a", new_array("int", int(3))),
            local("int[]", "b", name("a")),
            expr(assign_element("a", int(1), int(7))),
            ret(name("b")),
        ])
        .with_method("Program", "other_type", "bool", &[("a", "int[]"), ("b", "int[]")], vec![
            ret(binary(name("a"), BO::Equality, name("b"))),
        ])
        .compile_ok();

    compiled.call("Program.alias", vec![]).expect_value(PV::Bool(true));
    // Storing an element produces a new array
    compiled.call("Program.store", vec![]).expect_value(PV::Bool(false));
    compiled.call("Program.updated", vec![]).expect_display("[0, 7, 0]");
    compiled.call("Program.untouched", vec![]).expect_display("[0, 0, 0]");

    let equal_contents = vec![
        Argument::Array(PrimitiveType::Int, vec![PV::Int(1)]),
        Argument::Array(PrimitiveType::Int, vec![PV::Int(1)]),
    ];
    compiled.call("Program.other_type", equal_contents).expect_value(PV::Bool(false));
}

#[test]
fn test_display_forms() {
    let compiled = Tester::new_program("display")
        .with_method("Program", "truth", "bool", &[], vec![ret(unary(UO::LogicalNot, boolean(false)))])
        .with_method("Program", "negative", "long", &[], vec![ret(unary(UO::Negative, long(5)))])
        .with_method("Program", "whole", "float", &[], vec![ret(binary(float(1.5), BO::Multiply, float(2.0)))])
        .with_method("Program", "floats", "float[]", &[], vec![
            local("float[]", "a", new_array("float", int(2))),
            expr(assign_element("a", int(0), float(0.5))),
            ret(name("a")),
        ])
        .with_method("Program", "empty", "bool[]", &[], vec![ret(new_array("bool", int(0)))])
        .with_method("Program", "document", "archive", &[("a", "archive")], vec![ret(name("a"))])
        .compile_ok();

    compiled.call("Program.truth", vec![]).expect_display("true");
    compiled.call("Program.negative", vec![]).expect_display("-5");
    compiled.call("Program.whole", vec![]).expect_display("3.0");
    compiled.call("Program.floats", vec![]).expect_display("[0.5, 0.0]");
    compiled.call("Program.empty", vec![]).expect_display("[]");

    let document = Arc::new(OpaqueDocument::with_data("external", vec![1, 2, 3]));
    let tester = compiled.call("Program.document", vec![Argument::Archive(document)]).expect_display("external");
    assert_eq!(tester.object().as_archive().unwrap().document().name(), "external");
}

#[test]
fn test_heap_layout_of_results() {
    let compiled = Tester::new_program("heap layout")
        .with_method("Program", "one", "int", &[], vec![ret(int(1))])
        .with_method("Program", "same", "long", &[("x", "long")], vec![ret(name("x"))])
        .with_method("Program", "text", "string", &[("s", "string")], vec![ret(name("s"))])
        .with_method("Program", "sum", "int", &[("a", "int")], vec![
            ret(binary(name("a"), BO::Add, int(2))),
        ])
        .compile_ok();

    let tester = compiled.call("Program.one", vec![]).expect_value(PV::Int(1));
    assert_eq!(tester.heap().used(), 4);
    assert_eq!(tester.heap().num_objects(), 1);
    assert_eq!(tester.heap().bytes_at(tester.object().address()).unwrap(), &1i32.to_le_bytes());

    let tester = compiled.call("Program.same", vec![Argument::Long(-9)]).expect_value(PV::Long(-9));
    assert_eq!(tester.heap().used(), 8);
    assert_eq!(tester.object().address(), 0);

    let tester = compiled.call("Program.text", vec![Argument::String(String::from("abc"))]).expect_display("abc");
    assert_eq!(tester.object().size(), 7);
    assert_eq!(tester.heap().bytes_at(0).unwrap(), &[3, 0, 0, 0, b'a', b'b', b'c']);

    // argument, literal and result
    let tester = compiled.call("Program.sum", vec![Argument::Int(40)]).expect_value(PV::Int(42));
    assert_eq!(tester.heap().num_objects(), 3);
    assert_eq!(tester.object().address(), 8);
}

#[test]
fn test_invalid_arguments() {
    let compiled = Tester::new_program("invalid arguments")
        .with_method("Program", "count", "int", &[("a", "int[]")], vec![ret(length(name("a")))])
        .compile_ok();

    compiled.call("Program.count", vec![Argument::Array(PrimitiveType::Int, vec![PV::Int(1), PV::Int(2)])])
        .expect_value(PV::Int(2));

    let tester = compiled.call("Program.count", vec![Argument::Array(PrimitiveType::Int, vec![PV::Long(1)])])
        .expect_fault(invalid(OpCode::Newarr, "int[]", Some("long")));
    assert_eq!(tester.error().frames, vec![EvalFrame{ member: String::from("Program.count"), instruction: 0 }]);

    let tester = compiled.call_with(
        "Program.count", vec![Argument::Array(PrimitiveType::Long, vec![PV::Long(1); 4])],
        crate::lang::eval::Heap::new(16), default_config(),
    );
    match &tester.error().fault {
        RuntimeFault::OutOfMemory{ requested: 36, available: 16 } => {},
        other => panic!("unexpected fault {:?}", other),
    }
}
