//! W9003 Protected Member Access, W9034 Constructor Injection, W9035
//! Exception Hygiene.

use excelsior_ast::{NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::{dotted_chain, location};

const SELF_RECEIVERS: &[&str] = &["self", "cls", "super"];

pub struct ProtectedMemberAccess;

impl ProtectedMemberAccess {
    fn is_protected(&self, name: &str) -> bool {
        name.starts_with('_') && !name.starts_with("__") || (name.starts_with("__") && !name.ends_with("__"))
    }
}

impl Checkable for ProtectedMemberAccess {
    fn code(&self) -> &'static str {
        "W9003"
    }

    fn description(&self) -> &'static str {
        "access to a protected `_name` attribute from outside the defining scope"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Attribute]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let Some(name) = &node.payload.identifier else {
            return Vec::new();
        };
        if !self.is_protected(name) {
            return Vec::new();
        }
        let chain = dotted_chain(ctx.ast, id);
        let Some(receiver) = chain.first() else {
            return Vec::new();
        };
        if SELF_RECEIVERS.contains(&receiver.as_str()) {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("access to protected member `{name}` via `{receiver}` from outside its defining scope"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name.clone())]
    }
}

pub struct ConstructorInjection;

impl Checkable for ConstructorInjection {
    fn code(&self) -> &'static str {
        "W9034"
    }

    fn description(&self) -> &'static str {
        "`__init__` parameter typed to a concrete Infrastructure class instead of a Protocol"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        if node.payload.identifier.as_deref() != Some("__init__") {
            return Vec::new();
        }
        let Some(args) = ctx.ast.children(id).find(|n| n.kind == NodeKind::Arguments) else {
            return Vec::new();
        };
        ctx.ast
            .children(args.id)
            .filter_map(|param| {
                let annotation = param.payload.type_annotation.as_ref()?;
                if annotation.ends_with("Protocol") {
                    return None;
                }
                let layer = (ctx.resolve_layer)(annotation)?;
                if layer != "Infrastructure" {
                    return None;
                }
                let param_name = param.payload.identifier.clone().unwrap_or_default();
                Some(
                    Violation::new(
                        self.code(),
                        format!(
                            "parameter `{param_name}` is typed to concrete Infrastructure class \
                             `{annotation}`; depend on a Protocol instead"
                        ),
                        location(ctx.path, param),
                    )
                    .with_node(param.id)
                    .with_symbol(param_name),
                )
            })
            .collect()
    }
}

pub struct ExceptionHygiene;

impl Checkable for ExceptionHygiene {
    fn code(&self) -> &'static str {
        "W9035"
    }

    fn description(&self) -> &'static str {
        "bare exception handler"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::ExceptHandler]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        if node.payload.type_annotation.is_some() {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            "bare `except:` swallows every exception, including `KeyboardInterrupt`/`SystemExit`",
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::{parse, SourceFile};

    use crate::layer::INFRASTRUCTURE;
    use crate::type_oracle::TypeOracle;

    fn ctx<'a>(
        ast: &'a excelsior_ast::Ast,
        oracle: &'a TypeOracle<'a>,
        resolver: &'a dyn Fn(&str) -> Option<String>,
    ) -> RuleContext<'a> {
        RuleContext::new(ast, std::path::Path::new("t.py"), "t", None, oracle, resolver)
    }

    #[test]
    fn test_protected_member_access_fires_on_foreign_receiver() {
        let source = SourceFile::new("t.py", "order._internal_state\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let attr = ast.walk().find(|n| n.kind == NodeKind::Attribute).unwrap();
        assert_eq!(ProtectedMemberAccess.check(attr.id, &c).len(), 1);
    }

    #[test]
    fn test_protected_member_access_allows_self_receiver() {
        let source = SourceFile::new("t.py", "self._internal_state\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let attr = ast.walk().find(|n| n.kind == NodeKind::Attribute).unwrap();
        assert!(ProtectedMemberAccess.check(attr.id, &c).is_empty());
    }

    #[test]
    fn test_constructor_injection_fires_for_concrete_infrastructure_param() {
        let source = SourceFile::new("t.py", "class Checkout:\n    def __init__(self, gateway: StripeGateway):\n        pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |name: &str| -> Option<String> {
            if name == "StripeGateway" {
                Some(INFRASTRUCTURE.to_string())
            } else {
                None
            }
        };
        let c = ctx(&ast, &oracle, &resolver);
        let init = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("__init__"))
            .unwrap();
        assert_eq!(ConstructorInjection.check(init.id, &c).len(), 1);
    }

    #[test]
    fn test_constructor_injection_allows_protocol_param() {
        let source = SourceFile::new("t.py", "class Checkout:\n    def __init__(self, gateway: PaymentGatewayProtocol):\n        pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |name: &str| -> Option<String> {
            if name == "PaymentGatewayProtocol" {
                Some(INFRASTRUCTURE.to_string())
            } else {
                None
            }
        };
        let c = ctx(&ast, &oracle, &resolver);
        let init = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("__init__"))
            .unwrap();
        assert!(ConstructorInjection.check(init.id, &c).is_empty());
    }

    #[test]
    fn test_exception_hygiene_fires_on_bare_except() {
        let source = SourceFile::new("t.py", "try:\n    risky()\nexcept:\n    pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let handler = ast.walk().find(|n| n.kind == NodeKind::ExceptHandler).unwrap();
        assert_eq!(ExceptionHygiene.check(handler.id, &c).len(), 1);
    }

    #[test]
    fn test_exception_hygiene_allows_typed_except() {
        let source = SourceFile::new("t.py", "try:\n    risky()\nexcept ValueError:\n    pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let handler = ast.walk().find(|n| n.kind == NodeKind::ExceptHandler).unwrap();
        assert!(ExceptionHygiene.check(handler.id, &c).is_empty());
    }
}
