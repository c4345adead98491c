//! Constructor to `deploy` rewriting for contract classes.

use super::{DEPLOY_METHOD, Transpiler};
use crate::ast::build::*;
use crate::ast::*;
use crate::compiler::syscalls::{GET_CONTEXT, STORAGE_GET, STORAGE_PUT};
use crate::diagnostics::DiagnosticCode;

/// An instance property that will become storage accessors.
struct StoredProperty {
    name: String,
    ty: Type,
    accessibility: Accessibility,
    with_setter: bool,
}

/// The property types storage can hold directly.
fn is_storable(ty: &Type) -> bool {
    ty.is_only_primitive() || ty.is_fixed() || ty.is_buffer()
}

/// `syscall('Neo.Storage.GetContext')`
fn storage_context() -> Expression {
    syscall(GET_CONTEXT, vec![])
}

/// `syscall('Neo.Storage.Put', context, 'name', value);`
fn storage_put(name: &str, value: Expression) -> Statement {
    expr_stmt(syscall(
        STORAGE_PUT,
        vec![storage_context(), string(name), value],
    ))
}

/// A constructor parameter as a plain method parameter.
fn plain_param(param: &Parameter) -> Parameter {
    Parameter {
        accessibility: None,
        readonly: false,
        ..param.clone()
    }
}

/// The arguments of a leading `super(...)` statement.
fn super_call_arguments(stmt: &Statement) -> Option<&[Expression]> {
    match stmt {
        Statement::Expression(ExpressionStatement {
            expression: Expression::Call(call),
            ..
        }) if matches!(call.callee.as_ref(), Expression::Super) => Some(&call.arguments),
        _ => None,
    }
}

impl Transpiler {
    pub(super) fn transpile_deploy(&mut self, decl: &ClassDeclaration) -> ClassDeclaration {
        let mut rewritten = decl.clone();

        if let Some(existing) = decl.method(DEPLOY_METHOD) {
            self.report(
                DiagnosticCode::ReservedMethod,
                "The deploy method is reserved in SmartContract instances.",
                existing.span,
            );
            rewritten
                .members
                .retain(|member| !matches!(member, ClassMember::Constructor(_)));
            return rewritten;
        }

        let base_deploy = self.base_deploy(decl);
        let ctor = decl.constructor();

        // Statements before the property initializers, and the rest.
        let mut head = Vec::new();
        let mut tail = Vec::new();
        let params: Vec<Parameter> = match ctor {
            None => {
                if let Some(base) = &base_deploy {
                    let arguments = base.params.iter().map(|p| ident(&p.name.name)).collect();
                    head.push(expr_stmt(super_call(DEPLOY_METHOD, arguments)));
                }
                base_deploy
                    .as_ref()
                    .map(|base| base.params.iter().map(plain_param).collect())
                    .unwrap_or_default()
            }
            Some(ctor) => {
                let mut statements = ctor.body.iter();
                if let Some(arguments) = ctor.body.first().and_then(super_call_arguments) {
                    statements.next();
                    if base_deploy.is_some() {
                        head.push(expr_stmt(super_call(DEPLOY_METHOD, arguments.to_vec())));
                    }
                }
                tail.extend(statements.cloned());
                ctor.params.iter().map(plain_param).collect()
            }
        };

        let mut stored = Vec::new();
        let mut converted = Vec::new();

        if let Some(ctor) = ctor {
            for param in ctor.params.iter().filter(|p| p.is_property()) {
                let name = &param.name.name;
                match &param.ty {
                    None => self.report(
                        DiagnosticCode::UnknownType,
                        "Could not determine type of property.",
                        ctor.span,
                    ),
                    Some(ty) if is_storable(ty) => {
                        head.push(expr_stmt(assign(member(this(), name), ident(name))));
                        stored.push(StoredProperty {
                            name: name.clone(),
                            ty: ty.clone(),
                            accessibility: param.accessibility.unwrap_or_default(),
                            with_setter: true,
                        });
                    }
                    Some(_) => self.report(
                        DiagnosticCode::UnsupportedProperty,
                        "Unsupported SmartContract property.",
                        ctor.span,
                    ),
                }
            }
        }

        for class_member in &decl.members {
            let ClassMember::Property(property) = class_member else {
                continue;
            };
            if property.is_static || property.is_abstract {
                continue;
            }
            let name = &property.key.name;
            let Some(ty) = &property.ty else {
                self.report(
                    DiagnosticCode::UnknownType,
                    "Could not determine type of property.",
                    property.span,
                );
                continue;
            };
            if !is_storable(ty) {
                self.report(
                    DiagnosticCode::UnsupportedProperty,
                    "Unsupported SmartContract property.",
                    property.span,
                );
                continue;
            }

            let read_only_init = property.readonly && property.value.is_some();
            if let Some(init) = &property.value {
                if read_only_init {
                    head.push(storage_put(name, init.clone()));
                } else {
                    head.push(expr_stmt(assign(member(this(), name), init.clone())));
                }
            }
            stored.push(StoredProperty {
                name: name.clone(),
                ty: ty.clone(),
                accessibility: property.accessibility,
                with_setter: !read_only_init,
            });
            converted.push(name.clone());
        }

        let mut body = head;
        body.extend(tail);
        body.push(ret(Some(boolean(true))));
        tracing::trace!(
            "deploy of '{}' takes {} parameters and {} statements",
            decl.id.name,
            params.len(),
            body.len()
        );

        rewritten.members.retain(|member| match member {
            ClassMember::Constructor(_) => false,
            ClassMember::Property(property) => !converted.contains(&property.key.name),
            _ => true,
        });
        for property in stored {
            rewritten.members.extend(accessors(property));
        }
        rewritten.members.push(ClassMember::Method(MethodDefinition {
            key: Identifier::new(DEPLOY_METHOD),
            params,
            return_type: Some(Type::Boolean),
            body,
            accessibility: Accessibility::Public,
            is_static: false,
            span: ctor.map(|ctor| ctor.span).unwrap_or(decl.span),
        }));
        rewritten
    }
}

/// Storage-backed accessors for a property.
fn accessors(property: StoredProperty) -> Vec<ClassMember> {
    let StoredProperty {
        name,
        ty,
        accessibility,
        with_setter,
    } = property;
    let read = syscall(STORAGE_GET, vec![storage_context(), string(&name)]);
    let mut members = vec![ClassMember::Getter(GetterDefinition {
        key: Identifier::new(&name),
        return_type: Some(ty.clone()),
        body: vec![ret(Some(cast(read, ty.clone())))],
        accessibility,
        span: Span::default(),
    })];
    if with_setter {
        members.push(ClassMember::Setter(SetterDefinition {
            key: Identifier::new(&name),
            param: param(&name, Some(ty)),
            body: vec![storage_put(&name, ident(&name))],
            accessibility,
            span: Span::default(),
        }));
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileOptions;

    fn transpile(body: Vec<Statement>) -> (Program, Transpiler) {
        let mut transpiler = Transpiler::new(&CompileOptions::default());
        let program = transpiler.transpile(&program(body));
        (program, transpiler)
    }

    fn class_named<'a>(program: &'a Program, name: &str) -> &'a ClassDeclaration {
        program
            .body
            .iter()
            .find_map(|stmt| match stmt {
                Statement::ClassDeclaration(decl) if decl.id.name == name => Some(decl),
                _ => None,
            })
            .expect("class should be present")
    }

    fn codes(transpiler: &Transpiler) -> Vec<DiagnosticCode> {
        transpiler.diagnostics().iter().map(|d| d.code).collect()
    }

    fn typed(name: &str, ty: Type) -> Parameter {
        param(name, Some(ty))
    }

    #[test]
    fn test_deploy_synthesized_from_base_constructor() {
        let base = class(
            "Base",
            Some("SmartContract"),
            vec![constructor(
                vec![typed("a", Type::Number), typed("b", Type::String)],
                vec![],
            )],
        );
        let derived = class("Derived", Some("Base"), vec![]);
        let (program, transpiler) = transpile(vec![base, derived]);
        assert!(codes(&transpiler).is_empty());

        let deploy = class_named(&program, "Derived")
            .method(DEPLOY_METHOD)
            .expect("deploy should be synthesized");
        let names: Vec<_> = deploy.params.iter().map(|p| p.name.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(deploy.return_type, Some(Type::Boolean));
        assert_eq!(
            deploy.body,
            vec![
                expr_stmt(super_call(DEPLOY_METHOD, vec![ident("a"), ident("b")])),
                ret(Some(boolean(true))),
            ]
        );
    }

    #[test]
    fn test_constructor_becomes_deploy() {
        let contract = class(
            "Token",
            Some("SmartContract"),
            vec![constructor(
                vec![typed("supply", Type::Number)],
                vec![
                    expr_stmt(call(Expression::Super, vec![])),
                    expr_stmt(syscall("Neo.Runtime.Log", vec![string("hi")])),
                ],
            )],
        );
        let (program, _) = transpile(vec![contract]);
        let token = class_named(&program, "Token");
        assert!(token.constructor().is_none());
        let deploy = token.method(DEPLOY_METHOD).expect("deploy");
        // The base is the ambient contract class, which has no deploy.
        assert_eq!(
            deploy.body,
            vec![
                expr_stmt(syscall("Neo.Runtime.Log", vec![string("hi")])),
                ret(Some(boolean(true))),
            ]
        );
    }

    #[test]
    fn test_super_call_rewritten_to_base_deploy() {
        let base = class(
            "Base",
            Some("SmartContract"),
            vec![constructor(vec![typed("a", Type::Number)], vec![])],
        );
        let derived = class(
            "Derived",
            Some("Base"),
            vec![constructor(
                vec![],
                vec![expr_stmt(call(Expression::Super, vec![num(7)]))],
            )],
        );
        let (program, _) = transpile(vec![derived, base]);
        let deploy = class_named(&program, "Derived").method(DEPLOY_METHOD).expect("deploy");
        assert_eq!(
            deploy.body[0],
            expr_stmt(super_call(DEPLOY_METHOD, vec![num(7)]))
        );
        assert!(class_named(&program, "Base").method(DEPLOY_METHOD).is_some());
    }

    #[test]
    fn test_existing_deploy_is_reserved() {
        let contract = class(
            "Bad",
            Some("SmartContract"),
            vec![method(DEPLOY_METHOD, vec![], None, vec![])],
        );
        let (_, transpiler) = transpile(vec![contract]);
        assert_eq!(codes(&transpiler), vec![DiagnosticCode::ReservedMethod]);
    }

    #[test]
    fn test_property_becomes_storage_accessors() {
        let contract = class(
            "Counter",
            Some("SmartContract"),
            vec![ClassMember::Property(property(
                "count",
                Some(Type::Number),
                Some(num(0)),
            ))],
        );
        let (program, transpiler) = transpile(vec![contract]);
        assert!(codes(&transpiler).is_empty());
        let counter = class_named(&program, "Counter");
        assert!(!counter
            .members
            .iter()
            .any(|m| matches!(m, ClassMember::Property(_))));
        assert!(counter
            .members
            .iter()
            .any(|m| matches!(m, ClassMember::Getter(g) if g.key.name == "count")));
        assert!(counter
            .members
            .iter()
            .any(|m| matches!(m, ClassMember::Setter(s) if s.key.name == "count")));
        let deploy = counter.method(DEPLOY_METHOD).expect("deploy");
        assert_eq!(deploy.body[0], expr_stmt(assign(member(this(), "count"), num(0))));
    }

    #[test]
    fn test_readonly_initialized_property_has_no_setter() {
        let mut owner = property("owner", Some(Type::String), Some(string("alice")));
        owner.readonly = true;
        let contract = class("Owned", Some("SmartContract"), vec![ClassMember::Property(owner)]);
        let (program, _) = transpile(vec![contract]);
        let owned = class_named(&program, "Owned");
        assert!(!owned.members.iter().any(|m| matches!(m, ClassMember::Setter(_))));
        let deploy = owned.method(DEPLOY_METHOD).expect("deploy");
        assert_eq!(deploy.body[0], storage_put("owner", string("alice")));
    }

    #[test]
    fn test_unsupported_property_keeps_field() {
        let contract = class(
            "Registry",
            Some("SmartContract"),
            vec![ClassMember::Property(property(
                "entries",
                Some(Type::Reference("MapStorage".into())),
                None,
            ))],
        );
        let (program, transpiler) = transpile(vec![contract]);
        assert_eq!(codes(&transpiler), vec![DiagnosticCode::UnsupportedProperty]);
        let registry = class_named(&program, "Registry");
        assert!(!registry
            .members
            .iter()
            .any(|m| matches!(m, ClassMember::Getter(_) | ClassMember::Setter(_))));
    }

    #[test]
    fn test_untyped_property_reported() {
        let contract = class(
            "Loose",
            Some("SmartContract"),
            vec![ClassMember::Property(property("value", None, None))],
        );
        let (_, transpiler) = transpile(vec![contract]);
        assert_eq!(codes(&transpiler), vec![DiagnosticCode::UnknownType]);
    }

    #[test]
    fn test_parameter_property_assigned_in_deploy() {
        let mut owner = typed("owner", Type::String);
        owner.accessibility = Some(Accessibility::Private);
        let contract = class(
            "Owned",
            Some("SmartContract"),
            vec![constructor(vec![owner], vec![])],
        );
        let (program, _) = transpile(vec![contract]);
        let owned = class_named(&program, "Owned");
        let deploy = owned.method(DEPLOY_METHOD).expect("deploy");
        assert!(deploy.params[0].accessibility.is_none());
        assert_eq!(
            deploy.body[0],
            expr_stmt(assign(member(this(), "owner"), ident("owner")))
        );
        assert!(owned.members.iter().any(|m| matches!(
            m,
            ClassMember::Getter(g) if g.accessibility == Accessibility::Private
        )));
    }

    #[test]
    fn test_static_property_and_plain_class_untouched() {
        let mut total = property("total", Some(Type::Number), None);
        total.is_static = true;
        let contract = class("Stats", Some("SmartContract"), vec![ClassMember::Property(total)]);
        let plain = class(
            "Point",
            None,
            vec![constructor(vec![], vec![])],
        );
        let (program, transpiler) = transpile(vec![contract, plain.clone()]);
        assert!(codes(&transpiler).is_empty());
        assert!(class_named(&program, "Stats")
            .members
            .iter()
            .any(|m| matches!(m, ClassMember::Property(_))));
        assert_eq!(program.body[1], plain);
    }
}
