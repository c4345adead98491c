//! Abstract Syntax Tree (AST) definitions for the contract source subset.
//!
//! These structures are ESTree-shaped with the TypeScript additions the
//! compiler needs: type annotations, classes with modifiers, parameter
//! properties and `as` casts. The tree is produced by an external front end
//! and read as JSON, so every node is serde-(de)serializable. Nodes the
//! compiler does not translate are still representable so they can be
//! reported with a location instead of being rejected while loading.

pub mod build;

use serde::{Deserialize, Serialize};

pub use crate::diagnostics::Span;
pub use crate::types::Type;

/// A complete module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// The statements in the module
    pub body: Vec<Statement>,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Function declaration
    FunctionDeclaration(FunctionDeclaration),
    /// Class declaration
    ClassDeclaration(ClassDeclaration),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// Switch statement
    Switch(SwitchStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// For-in statement
    ForIn(ForInStatement),
    /// For-of statement
    ForOf(ForOfStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Break statement
    Break,
    /// Break with label
    BreakLabel(String),
    /// Continue statement
    Continue,
    /// Continue with label
    ContinueLabel(String),
    /// Throw statement
    Throw(ThrowStatement),
    /// Try statement
    Try(TryStatement),
    /// With statement
    With(WithStatement),
    /// Labeled statement
    Labeled(LabeledStatement),
    /// Debugger statement
    Debugger,
    /// Empty statement (;)
    Empty,
}

impl Statement {
    /// The location of the statement, when the node carries one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Statement::VariableDeclaration(decl) => Some(decl.span),
            Statement::FunctionDeclaration(decl) => Some(decl.span),
            Statement::ClassDeclaration(decl) => Some(decl.span),
            Statement::Expression(stmt) => Some(stmt.span),
            Statement::If(stmt) => Some(stmt.span),
            Statement::Return(stmt) => Some(stmt.span),
            Statement::Throw(stmt) => Some(stmt.span),
            Statement::Try(stmt) => Some(stmt.span),
            _ => None,
        }
    }
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclarator {
    /// The identifier being declared
    pub id: Identifier,
    /// Declared type
    #[serde(default)]
    pub ty: Option<Type>,
    /// Optional initializer expression
    #[serde(default)]
    pub init: Option<Expression>,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// The function name
    pub id: Identifier,
    /// The parameters
    pub params: Vec<Parameter>,
    /// The function body
    pub body: Vec<Statement>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: Identifier,
    /// Declared type
    #[serde(default)]
    pub ty: Option<Type>,
    /// Default value
    #[serde(default)]
    pub init: Option<Expression>,
    /// `...rest`
    #[serde(default)]
    pub rest: bool,
    /// Accessibility modifier; present on constructor parameter properties
    #[serde(default)]
    pub accessibility: Option<Accessibility>,
    /// `readonly` modifier on a parameter property
    #[serde(default)]
    pub readonly: bool,
}

impl Parameter {
    /// True when this constructor parameter also declares a property.
    pub fn is_property(&self) -> bool {
        self.accessibility.is_some() || self.readonly
    }
}

/// Member accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accessibility {
    /// `public` (the default)
    #[default]
    Public,
    /// `protected`
    Protected,
    /// `private`
    Private,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    /// Class name
    pub id: Identifier,
    /// Name of the extended class
    #[serde(default)]
    pub super_class: Option<Identifier>,
    /// Members in source order
    pub members: Vec<ClassMember>,
    /// `abstract class`
    #[serde(default)]
    pub is_abstract: bool,
    /// Location
    #[serde(default)]
    pub span: Span,
}

impl ClassDeclaration {
    /// The constructor, if declared.
    pub fn constructor(&self) -> Option<&Constructor> {
        self.members.iter().find_map(|member| match member {
            ClassMember::Constructor(ctor) => Some(ctor),
            _ => None,
        })
    }

    /// Finds an instance method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDefinition> {
        self.members.iter().find_map(|member| match member {
            ClassMember::Method(method) if method.key.name == name => Some(method),
            _ => None,
        })
    }
}

/// A class member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassMember {
    /// `constructor(...) { ... }`
    Constructor(Constructor),
    /// A method
    Method(MethodDefinition),
    /// A property declaration
    Property(PropertyDefinition),
    /// `get name() { ... }`
    Getter(GetterDefinition),
    /// `set name(v) { ... }`
    Setter(SetterDefinition),
}

impl ClassMember {
    /// The member's location.
    pub fn span(&self) -> Span {
        match self {
            ClassMember::Constructor(m) => m.span,
            ClassMember::Method(m) => m.span,
            ClassMember::Property(m) => m.span,
            ClassMember::Getter(m) => m.span,
            ClassMember::Setter(m) => m.span,
        }
    }
}

/// A class constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constructor {
    /// Parameters, possibly parameter properties
    pub params: Vec<Parameter>,
    /// Body
    pub body: Vec<Statement>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDefinition {
    /// Method name
    pub key: Identifier,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Declared return type
    #[serde(default)]
    pub return_type: Option<Type>,
    /// Body
    pub body: Vec<Statement>,
    /// Accessibility
    #[serde(default)]
    pub accessibility: Accessibility,
    /// `static`
    #[serde(default)]
    pub is_static: bool,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A property declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name
    pub key: Identifier,
    /// Declared type
    #[serde(default)]
    pub ty: Option<Type>,
    /// Initializer
    #[serde(default)]
    pub value: Option<Expression>,
    /// Accessibility
    #[serde(default)]
    pub accessibility: Accessibility,
    /// `readonly`
    #[serde(default)]
    pub readonly: bool,
    /// `static`
    #[serde(default)]
    pub is_static: bool,
    /// `abstract`
    #[serde(default)]
    pub is_abstract: bool,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A getter accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetterDefinition {
    /// Property name
    pub key: Identifier,
    /// Declared type
    #[serde(default)]
    pub return_type: Option<Type>,
    /// Body
    pub body: Vec<Statement>,
    /// Accessibility
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A setter accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetterDefinition {
    /// Property name
    pub key: Identifier,
    /// The single value parameter
    pub param: Parameter,
    /// Body
    pub body: Vec<Statement>,
    /// Accessibility
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockStatement {
    /// The statements in the block
    pub body: Vec<Statement>,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: Box<Statement>,
    /// The optional else branch
    #[serde(default)]
    pub alternate: Option<Box<Statement>>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// The initializer
    #[serde(default)]
    pub init: Option<ForInit>,
    /// The condition
    #[serde(default)]
    pub test: Option<Expression>,
    /// The update expression
    #[serde(default)]
    pub update: Option<Expression>,
    /// The loop body
    pub body: Box<Statement>,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInit {
    /// Variable declaration
    Declaration(Box<VariableDeclaration>),
    /// Expression
    Expression(Expression),
}

/// A switch statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    /// The discriminant expression
    pub discriminant: Expression,
    /// The case clauses
    pub cases: Vec<SwitchCase>,
}

/// A switch case clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The test expression (None for default)
    #[serde(default)]
    pub test: Option<Expression>,
    /// The consequent statements
    pub consequent: Vec<Statement>,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The condition
    pub test: Expression,
}

/// A for-in statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForInStatement {
    /// The left-hand side
    pub left: ForInLeft,
    /// The object to iterate over
    pub right: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A for-of statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfStatement {
    /// The left-hand side
    pub left: ForInLeft,
    /// The iterable
    pub right: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// Left-hand side of for-in/for-of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInLeft {
    /// Variable declaration
    Declaration(Box<VariableDeclaration>),
    /// Expression (identifier or member)
    Expression(Expression),
}

/// A return statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    /// The return value
    #[serde(default)]
    pub argument: Option<Expression>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A throw statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    /// The thrown expression
    pub argument: Expression,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    /// The try block
    pub block: BlockStatement,
    /// The catch clause
    #[serde(default)]
    pub handler: Option<CatchClause>,
    /// The finally block
    #[serde(default)]
    pub finalizer: Option<BlockStatement>,
    /// Location
    #[serde(default)]
    pub span: Span,
}

/// A catch clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// The error parameter
    #[serde(default)]
    pub param: Option<Identifier>,
    /// The catch body
    pub body: BlockStatement,
}

/// A with statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithStatement {
    /// The object expression
    pub object: Expression,
    /// The body statement
    pub body: Box<Statement>,
}

/// A labeled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStatement {
    /// The label identifier
    pub label: Identifier,
    /// The labeled body
    pub body: Box<Statement>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(Identifier),
    /// this keyword
    This,
    /// super keyword (only as a callee or member object)
    Super,
    /// Array literal
    Array(ArrayExpression),
    /// Object literal
    Object(ObjectExpression),
    /// Binary expression
    Binary(BinaryExpression),
    /// Unary expression
    Unary(UnaryExpression),
    /// Assignment expression
    Assignment(AssignmentExpression),
    /// Call expression
    Call(CallExpression),
    /// Member access expression
    Member(MemberExpression),
    /// Conditional (ternary) expression
    Conditional(ConditionalExpression),
    /// Function expression
    Function(FunctionExpression),
    /// Arrow function expression
    Arrow(ArrowFunctionExpression),
    /// new expression
    New(NewExpression),
    /// Update expression (++/--)
    Update(UpdateExpression),
    /// Sequence expression (comma operator)
    Sequence(SequenceExpression),
    /// `expr as T`
    As(AsExpression),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null literal
    Null,
    /// undefined literal
    Undefined,
    /// BigInt literal (decimal digits)
    BigInt(String),
    /// Regular expression literal
    RegExp {
        /// Source pattern
        pattern: String,
        /// Flags
        flags: String,
    },
}

/// An array expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpression {
    /// The elements (None represents a hole)
    pub elements: Vec<Option<Expression>>,
}

/// An object expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExpression {
    /// The properties
    pub properties: Vec<Property>,
}

/// An object literal property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// The property key
    pub key: PropertyKey,
    /// The property value
    pub value: Expression,
}

/// A property key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyKey {
    /// Identifier key
    Identifier(Identifier),
    /// Computed key
    Computed(Box<Expression>),
    /// Literal key
    Literal(Literal),
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    // Logical
    LogicalAnd,
    LogicalOr,
    NullishCoalescing,
    // Bitwise
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    // Other
    In,
    InstanceOf,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// The left-hand side
    pub left: Box<Expression>,
    /// The right-hand side
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    ExponentAssign,
    LeftShiftAssign,
    RightShiftAssign,
    UnsignedRightShiftAssign,
    BitwiseAndAssign,
    BitwiseOrAssign,
    BitwiseXorAssign,
    LogicalAndAssign,
    LogicalOrAssign,
    NullishCoalescingAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        Some(match self {
            AssignmentOperator::Assign => return None,
            AssignmentOperator::AddAssign => BinaryOperator::Add,
            AssignmentOperator::SubtractAssign => BinaryOperator::Subtract,
            AssignmentOperator::MultiplyAssign => BinaryOperator::Multiply,
            AssignmentOperator::DivideAssign => BinaryOperator::Divide,
            AssignmentOperator::ModuloAssign => BinaryOperator::Modulo,
            AssignmentOperator::ExponentAssign => BinaryOperator::Exponent,
            AssignmentOperator::LeftShiftAssign => BinaryOperator::LeftShift,
            AssignmentOperator::RightShiftAssign => BinaryOperator::RightShift,
            AssignmentOperator::UnsignedRightShiftAssign => BinaryOperator::UnsignedRightShift,
            AssignmentOperator::BitwiseAndAssign => BinaryOperator::BitwiseAnd,
            AssignmentOperator::BitwiseOrAssign => BinaryOperator::BitwiseOr,
            AssignmentOperator::BitwiseXorAssign => BinaryOperator::BitwiseXor,
            AssignmentOperator::LogicalAndAssign => BinaryOperator::LogicalAnd,
            AssignmentOperator::LogicalOrAssign => BinaryOperator::LogicalOr,
            AssignmentOperator::NullishCoalescingAssign => BinaryOperator::NullishCoalescing,
        })
    }
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    /// The function being called
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// A member access expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

impl MemberExpression {
    /// The property name for non-computed access.
    pub fn property_name(&self) -> Option<&str> {
        match &self.property {
            MemberProperty::Identifier(id) => Some(&id.name),
            MemberProperty::Expression(_) => None,
        }
    }
}

/// Member property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    /// Identifier property
    Identifier(Identifier),
    /// Computed property expression
    Expression(Box<Expression>),
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    /// The condition
    pub test: Box<Expression>,
    /// The consequent (if true)
    pub consequent: Box<Expression>,
    /// The alternate (if false)
    pub alternate: Box<Expression>,
}

/// A function expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    /// Optional name
    #[serde(default)]
    pub id: Option<Identifier>,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Body
    pub body: Vec<Statement>,
}

/// An arrow function expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowFunctionExpression {
    /// Parameters
    pub params: Vec<Parameter>,
    /// Declared return type
    #[serde(default)]
    pub return_type: Option<Type>,
    /// Body (expression or block)
    pub body: ArrowBody,
}

/// Arrow function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrowBody {
    /// Expression body
    Expression(Box<Expression>),
    /// Block body
    Block(Vec<Statement>),
}

/// A new expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpression {
    /// The constructor
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// An update expression (++/--)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// The operand
    pub argument: Box<Expression>,
    /// Whether prefix (++x) or postfix (x++)
    pub prefix: bool,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// A sequence expression (comma operator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExpression {
    /// The expressions
    pub expressions: Vec<Expression>,
}

/// A type assertion, `expression as T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsExpression {
    /// The asserted expression
    pub expression: Box<Expression>,
    /// The asserted type
    pub ty: Type,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_loads_from_json() {
        let json = r#"{
            "body": [
                { "VariableDeclaration": {
                    "kind": "Let",
                    "declarations": [
                        { "id": { "name": "x" }, "ty": "Number", "init": { "Literal": { "Number": 1.0 } } }
                    ],
                    "span": { "line": 1, "column": 1 }
                } }
            ]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        match &program.body[0] {
            Statement::VariableDeclaration(decl) => {
                assert_eq!(decl.declarations[0].id.name, "x");
                assert_eq!(decl.declarations[0].ty, Some(Type::Number));
                assert_eq!(decl.span, Span::new(1, 1));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_parameter_property_detection() {
        let mut param = build::param("owner", Some(Type::String));
        assert!(!param.is_property());
        param.readonly = true;
        assert!(param.is_property());
    }
}
