//! Terse constructors for AST nodes.
//!
//! Used by the transpiler to synthesize members and by tests to write
//! programs without a front end.

use super::*;

/// `name`
pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

/// Integer literal.
pub fn num(value: i64) -> Expression {
    Expression::Literal(Literal::Number(value as f64))
}

/// String literal.
pub fn string(value: &str) -> Expression {
    Expression::Literal(Literal::String(value.to_string()))
}

/// Boolean literal.
pub fn boolean(value: bool) -> Expression {
    Expression::Literal(Literal::Boolean(value))
}

/// `undefined`
pub fn undefined() -> Expression {
    Expression::Literal(Literal::Undefined)
}

/// `null`
pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

/// `this`
pub fn this() -> Expression {
    Expression::This
}

/// `object.name`
pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(Identifier::new(name)),
    })
}

/// `callee(args...)`
pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
    })
}

/// `this.method(args...)`
pub fn method_call(object: Expression, method: &str, arguments: Vec<Expression>) -> Expression {
    call(member(object, method), arguments)
}

/// `super.method(args...)`
pub fn super_call(method: &str, arguments: Vec<Expression>) -> Expression {
    call(member(Expression::Super, method), arguments)
}

/// `syscall('name', args...)`
pub fn syscall(name: &str, arguments: Vec<Expression>) -> Expression {
    let mut all = vec![string(name)];
    all.extend(arguments);
    call(ident("syscall"), all)
}

/// `new Class(args...)`
pub fn new(class: &str, arguments: Vec<Expression>) -> Expression {
    Expression::New(NewExpression {
        callee: Box::new(ident(class)),
        arguments,
    })
}

/// `left = right`
pub fn assign(left: Expression, right: Expression) -> Expression {
    assign_op(AssignmentOperator::Assign, left, right)
}

/// `left op= right`
pub fn assign_op(operator: AssignmentOperator, left: Expression, right: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `left op right`
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `op argument`
pub fn unary(operator: UnaryOperator, argument: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        operator,
        argument: Box::new(argument),
    })
}

/// `argument++` / `++argument` and friends.
pub fn update(operator: UpdateOperator, argument: Expression, prefix: bool) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        argument: Box::new(argument),
        prefix,
    })
}

/// `test ? consequent : alternate`
pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

/// `expression as ty`
pub fn cast(expression: Expression, ty: Type) -> Expression {
    Expression::As(AsExpression {
        expression: Box::new(expression),
        ty,
    })
}

/// `(params) => body`
pub fn arrow(params: Vec<Parameter>, body: Expression) -> Expression {
    Expression::Arrow(ArrowFunctionExpression {
        params,
        return_type: None,
        body: ArrowBody::Expression(Box::new(body)),
    })
}

/// `(params) => { body }`
pub fn arrow_block(params: Vec<Parameter>, body: Vec<Statement>) -> Expression {
    Expression::Arrow(ArrowFunctionExpression {
        params,
        return_type: None,
        body: ArrowBody::Block(body),
    })
}

/// A plain parameter.
pub fn param(name: &str, ty: Option<Type>) -> Parameter {
    Parameter {
        name: Identifier::new(name),
        ty,
        init: None,
        rest: false,
        accessibility: None,
        readonly: false,
    }
}

/// `expression;`
pub fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        span: Span::default(),
    })
}

/// `let name: ty = init;`
pub fn let_(name: &str, ty: Option<Type>, init: Option<Expression>) -> Statement {
    declare(VariableKind::Let, name, ty, init)
}

/// `const name: ty = init;`
pub fn const_(name: &str, ty: Option<Type>, init: Expression) -> Statement {
    declare(VariableKind::Const, name, ty, Some(init))
}

fn declare(kind: VariableKind, name: &str, ty: Option<Type>, init: Option<Expression>) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id: Identifier::new(name),
            ty,
            init,
        }],
        span: Span::default(),
    })
}

/// `return argument;`
pub fn ret(argument: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        argument,
        span: Span::default(),
    })
}

/// `throw argument;`
pub fn throw(argument: Expression) -> Statement {
    Statement::Throw(ThrowStatement {
        argument,
        span: Span::default(),
    })
}

/// `{ body }`
pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(BlockStatement { body })
}

/// `if (test) consequent else alternate`
pub fn if_(test: Expression, consequent: Vec<Statement>, alternate: Option<Vec<Statement>>) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(block(consequent)),
        alternate: alternate.map(|body| Box::new(block(body))),
        span: Span::default(),
    })
}

/// `while (test) { body }`
pub fn while_(test: Expression, body: Vec<Statement>) -> Statement {
    Statement::While(WhileStatement {
        test,
        body: Box::new(block(body)),
    })
}

/// `try { block } catch (param) { handler } finally { finalizer }`
pub fn try_(
    body: Vec<Statement>,
    handler: Option<(Option<&str>, Vec<Statement>)>,
    finalizer: Option<Vec<Statement>>,
) -> Statement {
    Statement::Try(TryStatement {
        block: BlockStatement { body },
        handler: handler.map(|(param, body)| CatchClause {
            param: param.map(Identifier::new),
            body: BlockStatement { body },
        }),
        finalizer: finalizer.map(|body| BlockStatement { body }),
        span: Span::default(),
    })
}

/// `class name extends super_class { members }`
pub fn class(name: &str, super_class: Option<&str>, members: Vec<ClassMember>) -> Statement {
    Statement::ClassDeclaration(ClassDeclaration {
        id: Identifier::new(name),
        super_class: super_class.map(Identifier::new),
        members,
        is_abstract: false,
        span: Span::default(),
    })
}

/// A public instance method.
pub fn method(name: &str, params: Vec<Parameter>, return_type: Option<Type>, body: Vec<Statement>) -> ClassMember {
    ClassMember::Method(MethodDefinition {
        key: Identifier::new(name),
        params,
        return_type,
        body,
        accessibility: Accessibility::Public,
        is_static: false,
        span: Span::default(),
    })
}

/// `constructor(params) { body }`
pub fn constructor(params: Vec<Parameter>, body: Vec<Statement>) -> ClassMember {
    ClassMember::Constructor(Constructor {
        params,
        body,
        span: Span::default(),
    })
}

/// `name: ty = value;`
pub fn property(name: &str, ty: Option<Type>, value: Option<Expression>) -> PropertyDefinition {
    PropertyDefinition {
        key: Identifier::new(name),
        ty,
        value,
        accessibility: Accessibility::Public,
        readonly: false,
        is_static: false,
        is_abstract: false,
        span: Span::default(),
    }
}

/// Wraps statements into a program.
pub fn program(body: Vec<Statement>) -> Program {
    Program { body }
}
