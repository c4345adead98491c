//! Tests for the bytecode compiler.

use super::*;
use crate::ast::build::*;
use crate::compiler::bytecode::Operand;
use crate::diagnostics::DiagnosticCode;

fn compiler_for(body: Vec<Statement>) -> Compiler {
    let mut compiler = Compiler::new(CompileOptions::default());
    compiler
        .compile(&program(body))
        .expect("compilation should not fail internally");
    compiler
}

fn compile_ok(body: Vec<Statement>) -> Vec<Instruction> {
    let compiler = compiler_for(body);
    assert!(
        compiler.diagnostics().is_empty(),
        "unexpected diagnostics: {:?}",
        compiler.diagnostics()
    );
    compiler.into_instructions().expect("compilation should succeed")
}

fn codes(body: Vec<Statement>) -> Vec<DiagnosticCode> {
    compiler_for(body)
        .diagnostics()
        .iter()
        .map(|d| d.code)
        .collect()
}

fn opcodes(instructions: &[Instruction]) -> Vec<OpCode> {
    instructions.iter().map(|i| i.opcode).collect()
}

fn syscalls(instructions: &[Instruction]) -> Vec<String> {
    instructions
        .iter()
        .filter_map(|i| match &i.operand {
            Operand::Name(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn pushes_string(instructions: &[Instruction], value: &str) -> bool {
    instructions
        .iter()
        .any(|i| matches!(&i.operand, Operand::Data(data) if data.as_slice() == value.as_bytes()))
}

fn contract(name: &str, members: Vec<ClassMember>) -> Statement {
    class(name, Some("SmartContract"), members)
}

#[test]
fn test_compile_empty_program() {
    let instructions = compile_ok(vec![]);
    assert_eq!(instructions.first().map(|i| i.opcode), Some(OpCode::Swap));
    assert_eq!(instructions.last().map(|i| i.opcode), Some(OpCode::Ret));
}

#[test]
fn test_module_statements_compile() {
    compile_ok(vec![
        let_("x", Some(Type::Number), Some(num(1))),
        expr_stmt(assign(ident("x"), binary(BinaryOperator::Add, ident("x"), num(2)))),
        expr_stmt(update(UpdateOperator::Increment, ident("x"), false)),
        if_(
            binary(BinaryOperator::LessThan, ident("x"), num(10)),
            vec![expr_stmt(assign_op(AssignmentOperator::MultiplyAssign, ident("x"), num(3)))],
            None,
        ),
    ]);
}

#[test]
fn test_fractional_literal_rejected() {
    let body = vec![expr_stmt(Expression::Literal(Literal::Number(1.5)))];
    assert_eq!(codes(body), vec![DiagnosticCode::InvalidLiteral]);
}

#[test]
fn test_oversized_literal_rejected() {
    let body = vec![expr_stmt(Expression::Literal(Literal::Number(1e300)))];
    assert_eq!(codes(body), vec![DiagnosticCode::InvalidLiteral]);
    let big = Expression::Literal(Literal::BigInt(format!("{}n", "9".repeat(80))));
    assert_eq!(
        codes(vec![let_("big", Some(Type::Number), Some(big))]),
        vec![DiagnosticCode::InvalidLiteral]
    );
}

#[test]
fn test_bigint_literal_accepted() {
    let big = Expression::Literal(Literal::BigInt("123456789012345678901234567890n".into()));
    let instructions = compile_ok(vec![let_("big", Some(Type::Number), Some(big))]);
    assert!(instructions
        .iter()
        .any(|i| matches!(&i.operand, Operand::Data(data) if data.len() > 8)));
}

#[test]
fn test_unknown_identifier_reported() {
    let body = vec![expr_stmt(ident("missing"))];
    assert_eq!(codes(body), vec![DiagnosticCode::UnknownIdentifier]);
}

#[test]
fn test_const_reassignment_reported() {
    let body = vec![
        const_("limit", Some(Type::Number), num(3)),
        expr_stmt(assign(ident("limit"), num(4))),
    ];
    assert_eq!(codes(body), vec![DiagnosticCode::InvalidAssignment]);
}

#[test]
fn test_errors_fail_finish() {
    let compiler = compiler_for(vec![expr_stmt(ident("missing"))]);
    match compiler.finish() {
        Err(Error::Diagnostics(diagnostics)) => assert_eq!(diagnostics.len(), 1),
        other => panic!("expected diagnostics, got {:?}", other.map(|(i, _)| i.len())),
    }
}

#[test]
fn test_loose_equality_requires_matching_static_tags() {
    let known = vec![
        let_("a", Some(Type::Number), Some(num(1))),
        expr_stmt(binary(BinaryOperator::Equal, ident("a"), num(1))),
    ];
    assert!(codes(known).is_empty());

    let unknown = vec![
        let_("a", None, Some(num(1))),
        let_("b", Some(Type::String), Some(string("1"))),
        expr_stmt(binary(BinaryOperator::Equal, ident("a"), ident("b"))),
    ];
    assert_eq!(codes(unknown), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_unsupported_operators_reported() {
    for operator in [
        BinaryOperator::Exponent,
        BinaryOperator::UnsignedRightShift,
        BinaryOperator::In,
        BinaryOperator::InstanceOf,
    ] {
        let body = vec![expr_stmt(binary(operator, num(2), num(3)))];
        assert_eq!(codes(body), vec![DiagnosticCode::UnsupportedSyntax], "{:?}", operator);
    }
}

#[test]
fn test_string_concatenation_uses_cat() {
    let instructions = compile_ok(vec![let_(
        "greeting",
        Some(Type::String),
        Some(binary(BinaryOperator::Add, string("hello "), string("world"))),
    )]);
    assert!(opcodes(&instructions).contains(&OpCode::Cat));
    assert!(!opcodes(&instructions).contains(&OpCode::Add));
}

#[test]
fn test_numeric_addition_uses_add() {
    let instructions = compile_ok(vec![let_(
        "sum",
        Some(Type::Number),
        Some(binary(BinaryOperator::Add, num(1), num(2))),
    )]);
    assert!(opcodes(&instructions).contains(&OpCode::Add));
    assert!(!opcodes(&instructions).contains(&OpCode::Cat));
}

#[test]
fn test_regexp_reported_in_statement_position() {
    let regexp = Expression::Literal(Literal::RegExp {
        pattern: "a+".into(),
        flags: String::new(),
    });
    assert_eq!(codes(vec![expr_stmt(regexp)]), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_storage_syscalls_emitted() {
    let put = syscall(
        "Neo.Storage.Put",
        vec![syscall("Neo.Storage.GetContext", vec![]), string("key"), string("value")],
    );
    let instructions = compile_ok(vec![expr_stmt(put)]);
    assert_eq!(
        syscalls(&instructions),
        vec![
            "Neo.Storage.GetContext".to_string(),
            "Neo.Runtime.Serialize".to_string(),
            "Neo.Storage.Put".to_string(),
        ]
    );
}

#[test]
fn test_unknown_syscall_reported() {
    let body = vec![expr_stmt(syscall("Neo.Nope", vec![]))];
    assert_eq!(codes(body), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_function_dispatch_only_when_called() {
    let define = let_("f", None, Some(arrow(vec![], num(1))));
    let without_call = compile_ok(vec![define.clone()]);
    assert!(!opcodes(&without_call).contains(&OpCode::Throw));

    let with_call = compile_ok(vec![define, expr_stmt(call(ident("f"), vec![]))]);
    let ops = opcodes(&with_call);
    assert!(ops.contains(&OpCode::Call));
    assert!(ops.contains(&OpCode::NumEqual));
}

#[test]
fn test_closure_captures_outer_variable() {
    let body = vec![
        let_("count", Some(Type::Number), Some(num(0))),
        let_(
            "next",
            None,
            Some(arrow_block(
                vec![],
                vec![
                    expr_stmt(update(UpdateOperator::Increment, ident("count"), true)),
                    ret(Some(ident("count"))),
                ],
            )),
        ),
        expr_stmt(call(ident("next"), vec![])),
    ];
    compile_ok(body);
}

#[test]
fn test_rest_parameter_reported() {
    let mut rest = param("items", None);
    rest.rest = true;
    let body = vec![let_("f", None, Some(arrow(vec![rest], num(0))))];
    assert_eq!(codes(body), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_module_level_return_reported() {
    assert_eq!(codes(vec![ret(None)]), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_return_across_finally_reported() {
    let body = vec![let_(
        "f",
        None,
        Some(arrow_block(
            vec![],
            vec![try_(vec![ret(Some(num(1)))], None, Some(vec![]))],
        )),
    )];
    assert_eq!(codes(body), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_try_catch_compiles() {
    compile_ok(vec![try_(
        vec![throw(string("boom"))],
        Some((Some("e"), vec![expr_stmt(ident("e"))])),
        Some(vec![let_("done", None, Some(boolean(true)))]),
    )]);
}

#[test]
fn test_contract_dispatch_names_public_methods() {
    let body = vec![contract(
        "Token",
        vec![
            method("symbol", vec![], Some(Type::String), vec![ret(Some(string("TKN")))]),
            method(
                "add",
                vec![param("a", Some(Type::Number)), param("b", Some(Type::Number))],
                Some(Type::Number),
                vec![ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))],
            ),
        ],
    )];
    let instructions = compile_ok(body);
    assert!(pushes_string(&instructions, "symbol"));
    assert!(pushes_string(&instructions, "add"));
    assert!(opcodes(&instructions).contains(&OpCode::ThrowIfNot));
}

#[test]
fn test_contract_parameter_without_type_reported() {
    let body = vec![contract(
        "Echo",
        vec![method("echo", vec![param("value", None)], None, vec![ret(Some(ident("value")))])],
    )];
    assert_eq!(codes(body), vec![DiagnosticCode::UnknownType]);
}

#[test]
fn test_contract_constructor_needs_transpiling() {
    let body = vec![contract("Raw", vec![constructor(vec![], vec![])])];
    let mut compiler = Compiler::new(CompileOptions::default());
    match compiler.compile(&program(body)) {
        Err(Error::NoCompiler(what)) => assert_eq!(what, "smart contract constructor"),
        other => panic!("expected a missing compiler error, got {:?}", other),
    }
}

#[test]
fn test_multiple_leaf_contracts_reported() {
    let body = vec![contract("One", vec![]), contract("Two", vec![])];
    assert_eq!(codes(body), vec![DiagnosticCode::UnsupportedSyntax]);
}

#[test]
fn test_plain_class_instantiation() {
    let point = class(
        "Point",
        None,
        vec![
            ClassMember::Property(property("x", Some(Type::Number), Some(num(0)))),
            method(
                "bump",
                vec![],
                Some(Type::Number),
                vec![
                    expr_stmt(assign_op(
                        AssignmentOperator::AddAssign,
                        member(this(), "x"),
                        num(1),
                    )),
                    ret(Some(member(this(), "x"))),
                ],
            ),
        ],
    );
    let body = vec![
        point,
        let_("p", Some(Type::Reference("Point".into())), Some(new("Point", vec![]))),
        expr_stmt(method_call(ident("p"), "bump", vec![])),
    ];
    compile_ok(body);
}

#[test]
fn test_unknown_member_of_known_class_reported() {
    let body = vec![
        class("Empty", None, vec![]),
        let_("e", Some(Type::Reference("Empty".into())), Some(new("Empty", vec![]))),
        expr_stmt(member(ident("e"), "nothing")),
    ];
    assert_eq!(codes(body), vec![DiagnosticCode::UnknownIdentifier]);
}

#[test]
fn test_unsupported_statements_reported() {
    let body = vec![Statement::Debugger, Statement::BreakLabel("outer".into())];
    assert_eq!(
        codes(body),
        vec![DiagnosticCode::UnsupportedSyntax, DiagnosticCode::UnsupportedSyntax]
    );
}
