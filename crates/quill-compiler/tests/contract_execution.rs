//! End-to-end tests: compile contracts, then run them on the reference VM.

use num_bigint::BigInt;
use quill_compiler::ast::build::*;
use quill_compiler::ast::{BinaryOperator, ClassMember, Expression, Statement, Type, UpdateOperator};
use quill_compiler::{
    CompileOptions, DiagnosticCode, Error, ExecutionEngine, StackItem, VmError, compile,
    disassembler,
};

fn contract(members: Vec<ClassMember>) -> Vec<u8> {
    let module = program(vec![class("Token", Some("SmartContract"), members)]);
    match compile(&module, &CompileOptions::default()) {
        Ok(output) => output.script,
        Err(e) => panic!("compilation failed: {}", e),
    }
}

fn numeric(name: &str) -> quill_compiler::ast::Parameter {
    param(name, Some(Type::Number))
}

fn integer(item: Option<StackItem>) -> BigInt {
    item.expect("a result").to_integer().expect("an integer")
}

fn text(item: Option<StackItem>) -> String {
    item.expect("a result").to_string_lossy().expect("a primitive")
}

fn adder() -> ClassMember {
    method(
        "add",
        vec![numeric("a"), numeric("b")],
        Some(Type::Number),
        vec![ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))],
    )
}

#[test]
fn test_method_returns_raw_result() {
    let script = contract(vec![adder()]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "add", vec![2.into(), 3.into()]).unwrap();
    assert_eq!(integer(result), BigInt::from(5));
}

#[test]
fn test_unknown_method_faults() {
    let script = contract(vec![adder()]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "transfer", vec![]);
    assert!(matches!(result, Err(VmError::Throw { .. })), "{:?}", result);
}

fn owned_token() -> Vec<u8> {
    contract(vec![
        ClassMember::Property(property("owner", Some(Type::String), None)),
        constructor(
            vec![param("owner", Some(Type::String))],
            vec![
                expr_stmt(call(Expression::Super, vec![])),
                expr_stmt(assign(member(this(), "owner"), ident("owner"))),
            ],
        ),
    ])
}

#[test]
fn test_deploy_stores_property_once() {
    let script = owned_token();
    let mut engine = ExecutionEngine::new();

    let deployed = engine.invoke(&script, "deploy", vec!["alice".into()]).unwrap();
    assert!(deployed.expect("a result").to_bool());
    assert!(engine.storage().contains_key(b"owner".as_slice()));

    let owner = engine.invoke(&script, "owner", vec![]).unwrap();
    assert_eq!(text(owner), "alice");

    let again = engine.invoke(&script, "deploy", vec!["mallory".into()]);
    assert!(matches!(again, Err(VmError::Throw { .. })), "{:?}", again);
    let owner = engine.invoke(&script, "owner", vec![]).unwrap();
    assert_eq!(text(owner), "alice");
}

#[test]
fn test_unguarded_deploy_runs_twice() {
    let module = program(vec![class(
        "Token",
        Some("SmartContract"),
        vec![
            ClassMember::Property(property("owner", Some(Type::String), None)),
            constructor(
                vec![param("owner", Some(Type::String))],
                vec![expr_stmt(assign(member(this(), "owner"), ident("owner")))],
            ),
        ],
    )]);
    let options = CompileOptions {
        guard_deploy: false,
        ..CompileOptions::default()
    };
    let script = compile(&module, &options).unwrap().script;
    let mut engine = ExecutionEngine::new();
    engine.invoke(&script, "deploy", vec!["alice".into()]).unwrap();
    engine.invoke(&script, "deploy", vec!["bob".into()]).unwrap();
    let owner = engine.invoke(&script, "owner", vec![]).unwrap();
    assert_eq!(text(owner), "bob");
}

fn counter_body(result: Expression) -> Vec<Statement> {
    vec![
        let_("n", Some(Type::Number), Some(num(0))),
        const_(
            "next",
            None,
            arrow_block(
                vec![],
                vec![
                    expr_stmt(update(UpdateOperator::Increment, ident("n"), false)),
                    ret(Some(ident("n"))),
                ],
            ),
        ),
        expr_stmt(call(ident("next"), vec![])),
        expr_stmt(call(ident("next"), vec![])),
        ret(Some(result)),
    ]
}

#[test]
fn test_closure_keeps_captured_state_between_calls() {
    let script = contract(vec![method(
        "count",
        vec![],
        Some(Type::Number),
        counter_body(call(ident("next"), vec![])),
    )]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "count", vec![]).unwrap();
    assert_eq!(integer(result), BigInt::from(3));
}

#[test]
fn test_closure_captures_a_copy() {
    let script = contract(vec![method(
        "outer",
        vec![],
        Some(Type::Number),
        counter_body(ident("n")),
    )]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "outer", vec![]).unwrap();
    assert_eq!(integer(result), BigInt::from(0));
}

#[test]
fn test_caught_throw_resumes_after_handler() {
    let script = contract(vec![method(
        "safe",
        vec![],
        Some(Type::Number),
        vec![
            let_("r", Some(Type::Number), Some(num(1))),
            try_(
                vec![throw(string("boom")), expr_stmt(assign(ident("r"), num(2)))],
                Some((Some("e"), vec![expr_stmt(assign(ident("r"), num(7)))])),
                None,
            ),
            ret(Some(ident("r"))),
        ],
    )]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "safe", vec![]).unwrap();
    assert_eq!(integer(result), BigInt::from(7));
}

#[test]
fn test_uncaught_throw_faults() {
    let script = contract(vec![method(
        "fail",
        vec![],
        Some(Type::Number),
        vec![throw(string("boom"))],
    )]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "fail", vec![]);
    assert!(matches!(result, Err(VmError::Throw { .. })), "{:?}", result);
}

#[test]
fn test_boolean_concatenation() {
    let script = contract(vec![method(
        "describe",
        vec![param("flag", Some(Type::Boolean))],
        Some(Type::String),
        vec![ret(Some(binary(BinaryOperator::Add, string("flag:"), ident("flag"))))],
    )]);
    let mut engine = ExecutionEngine::new();
    let on = engine.invoke(&script, "describe", vec![true.into()]).unwrap();
    assert_eq!(text(on), "flag:true");
    let off = engine.invoke(&script, "describe", vec![false.into()]).unwrap();
    assert_eq!(text(off), "flag:false");
}

#[test]
fn test_number_to_string_faults() {
    let script = contract(vec![method(
        "label",
        vec![numeric("n")],
        Some(Type::String),
        vec![ret(Some(binary(BinaryOperator::Add, string("n="), ident("n"))))],
    )]);
    let mut engine = ExecutionEngine::new();
    let result = engine.invoke(&script, "label", vec![5.into()]);
    assert!(matches!(result, Err(VmError::Throw { .. })), "{:?}", result);
}

#[test]
fn test_untyped_property_reported() {
    let module = program(vec![class(
        "Token",
        Some("SmartContract"),
        vec![ClassMember::Property(property("supply", None, None))],
    )]);
    let Err(Error::Diagnostics(diagnostics)) = compile(&module, &CompileOptions::default()) else {
        panic!("expected diagnostics");
    };
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::UnknownType));
}

#[test]
fn test_compiled_script_disassembles() {
    let module = program(vec![class("Token", Some("SmartContract"), vec![adder()])]);
    let output = compile(&module, &CompileOptions::default()).unwrap();
    let listing = disassembler::disassemble(&output.script).unwrap();
    assert_eq!(listing.len(), output.instructions.len());
    let text = disassembler::listing(&output.script).unwrap();
    assert!(text.contains("PACK"));
    assert!(text.contains(&format!("0x{}", hex::encode("add"))));
}
