//! W9201 Contract Integrity, W9202 Concrete Method Stub, W9301 DI Violation,
//! W9601 Domain Immutability.

use serde_json::json;

use excelsior_ast::{Ast, Node, NodeId, NodeKind};

use crate::diagnostics::{Anchor, PlanKind, TransformationPlan, Violation};
use crate::registry::{Checkable, Fixable, RuleContext};
use crate::rules::support::location;

const FRAMEWORK_BASES: &[&str] = &["BaseModel", "Model", "Resource", "APIView", "Document"];
const DI_CONTAINER_RETURN_HINT: &[&str] = &["provide", "get_", "build_", "make_"];
const PROTOCOL_DIRECTORIES: &[&str] = &["services", "adapters", "gateways"];

/// 8-rule decision algorithm for whether an Infrastructure class requires a
/// Domain Protocol ancestor, in the order the catalog mandates.
pub struct ContractIntegrity {
    pub require_protocol: Vec<String>,
    pub internal_implementation: Vec<String>,
}

impl Default for ContractIntegrity {
    fn default() -> Self {
        Self {
            require_protocol: Vec::new(),
            internal_implementation: Vec::new(),
        }
    }
}

enum Verdict {
    Internal(u8),
    RequiresProtocol(u8),
    Undetermined,
}

impl ContractIntegrity {
    fn decide(&self, ast: &Ast, class: &Node, ctx: &RuleContext) -> Verdict {
        let name = class.payload.identifier.clone().unwrap_or_default();

        if self.internal_implementation.iter().any(|n| n == &name) {
            return Verdict::Internal(1);
        }
        if self.require_protocol.iter().any(|n| n == &name) {
            return Verdict::RequiresProtocol(1);
        }

        let bases = ast.class_bases(class.id);
        let is_dataclass = class
            .payload
            .decorator_names
            .iter()
            .any(|d| d == "dataclass" || d.ends_with(".dataclass"));
        let framework_base = bases
            .iter()
            .any(|b| b.payload.identifier.as_deref().map(|n| FRAMEWORK_BASES.contains(&n)).unwrap_or(false));
        if is_dataclass || framework_base {
            return Verdict::Internal(2);
        }

        let structural_base = bases
            .iter()
            .any(|b| matches!(b.payload.identifier.as_deref(), Some("TypedDict") | Some("NamedTuple")));
        if structural_base {
            return Verdict::Internal(3);
        }

        let internal_decorator = class.payload.decorator_names.iter().any(|d| d == "internal");
        if name.starts_with('_') || internal_decorator {
            return Verdict::Internal(4);
        }

        // Rule 5 (returned by a DI container method) and rule 6 (imported by
        // a Domain/UseCase module) require whole-project reach this engine's
        // single-file `Checkable` shape doesn't have; both are approximated
        // from this file alone and left `Undetermined` when no local
        // evidence applies, falling through to the directory default.
        if ctx
            .ast
            .walk()
            .any(|n| n.kind == NodeKind::FunctionDef && DI_CONTAINER_RETURN_HINT.iter().any(|h| {
                n.payload.identifier.as_deref().map(|fname| fname.starts_with(h)).unwrap_or(false)
            }) && n.payload.type_annotation.as_deref() == Some(name.as_str()))
        {
            return Verdict::RequiresProtocol(5);
        }

        let protocol_name = format!("{name}Protocol");
        if ast
            .walk()
            .any(|n| n.kind == NodeKind::ClassDef && n.payload.identifier.as_deref() == Some(protocol_name.as_str()))
        {
            return Verdict::RequiresProtocol(7);
        }

        let in_protocol_dir = ctx
            .path
            .components()
            .any(|c| PROTOCOL_DIRECTORIES.contains(&c.as_os_str().to_string_lossy().as_ref()));
        if in_protocol_dir {
            return Verdict::RequiresProtocol(8);
        }
        Verdict::Internal(8)
    }

    fn has_protocol_ancestor(&self, ast: &Ast, class: &Node) -> bool {
        ast.class_bases(class.id)
            .iter()
            .any(|b| b.payload.identifier.as_deref().map(|n| n.ends_with("Protocol")).unwrap_or(false))
    }
}

impl Checkable for ContractIntegrity {
    fn code(&self) -> &'static str {
        "W9201"
    }

    fn description(&self) -> &'static str {
        "Infrastructure class requires a Domain Protocol ancestor"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::ClassDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if ctx.layer.map(|l| l.as_str()) != Some("Infrastructure") {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let rule_fired = match self.decide(ctx.ast, node, ctx) {
            Verdict::Internal(_) | Verdict::Undetermined => return Vec::new(),
            Verdict::RequiresProtocol(rule) => rule,
        };
        if self.has_protocol_ancestor(ctx.ast, node) {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!(
                "`{name}` requires a Domain Protocol ancestor (rule {rule_fired}); add `require_protocol`/\
                 `internal_implementation` overrides if this is intentional"
            ),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct ConcreteMethodStub;

impl ConcreteMethodStub {
    fn is_stub_body(&self, ast: &Ast, fn_id: NodeId) -> bool {
        let body: Vec<&Node> = ast.children(fn_id).filter(|n| n.kind != NodeKind::Arguments).collect();
        body.len() == 1 && body[0].kind == NodeKind::Pass
    }

    fn is_generator(&self, ast: &Ast, fn_id: NodeId) -> bool {
        let mut stack = vec![fn_id];
        while let Some(cur) = stack.pop() {
            for child in ast.children(cur) {
                if matches!(child.kind, NodeKind::Yield | NodeKind::YieldFrom) {
                    return true;
                }
                if !matches!(child.kind, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef | NodeKind::Lambda) {
                    stack.push(child.id);
                }
            }
        }
        false
    }
}

impl Checkable for ConcreteMethodStub {
    fn code(&self) -> &'static str {
        "W9202"
    }

    fn description(&self) -> &'static str {
        "non-abstract, non-generator, non-Protocol method whose body is `pass`"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let is_method = node
            .parent
            .map(|p| ctx.ast.get(p).kind == NodeKind::ClassDef)
            .unwrap_or(false);
        if !is_method {
            return Vec::new();
        }
        let owning_class = node.parent.map(|p| ctx.ast.get(p));
        let in_protocol = owning_class
            .map(|c| {
                ctx.ast
                    .class_bases(c.id)
                    .iter()
                    .any(|b| b.payload.identifier.as_deref() == Some("Protocol"))
            })
            .unwrap_or(false);
        if in_protocol {
            return Vec::new();
        }
        let is_abstract = node
            .payload
            .decorator_names
            .iter()
            .any(|d| d == "abstractmethod" || d == "abc.abstractmethod");
        if is_abstract {
            return Vec::new();
        }
        if self.is_generator(ctx.ast, id) {
            return Vec::new();
        }
        if !self.is_stub_body(ctx.ast, id) {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("`{name}` is a concrete method with only a `pass` body"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct DiViolation;

impl Checkable for DiViolation {
    fn code(&self) -> &'static str {
        "W9301"
    }

    fn description(&self) -> &'static str {
        "direct instantiation of an Infrastructure class inside a UseCase"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Call]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if ctx.layer.map(|l| l.as_str()) != Some("UseCase") {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let Some(callee) = node.children.first() else {
            return Vec::new();
        };
        let callee_node = ctx.ast.get(*callee);
        let Some(name) = &callee_node.payload.identifier else {
            return Vec::new();
        };
        if !name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
            return Vec::new();
        }
        let Some(callee_layer) = (ctx.resolve_layer)(name) else {
            return Vec::new();
        };
        if callee_layer != "Infrastructure" {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("`{name}` (Infrastructure) is instantiated directly inside a UseCase; inject it instead"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name.clone())]
    }
}

pub struct DomainImmutability;

impl Checkable for DomainImmutability {
    fn code(&self) -> &'static str {
        "W9601"
    }

    fn description(&self) -> &'static str {
        "attribute assignment outside `__init__` inside a non-frozen Domain entity"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Assign]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if ctx.layer.map(|l| l.as_str()) != Some("Domain") {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let Some(target) = node.children.first() else {
            return Vec::new();
        };
        if ctx.ast.get(*target).kind != NodeKind::AssignAttr {
            return Vec::new();
        }
        let Some(method) = enclosing_function(ctx.ast, id) else {
            return Vec::new();
        };
        if method.payload.identifier.as_deref() == Some("__init__") {
            return Vec::new();
        }
        let Some(class) = method.parent.map(|p| ctx.ast.get(p)).filter(|c| c.kind == NodeKind::ClassDef) else {
            return Vec::new();
        };
        let is_frozen = class.payload.decorator_names.iter().any(|d| {
            d == "frozen" || d.contains("dataclass(frozen=True)") || d == "attr.frozen" || d == "attrs.frozen"
        });
        if is_frozen {
            return Vec::new();
        }
        let class_name = class.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("`{class_name}` mutates an attribute outside `__init__`; mark the entity frozen"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(class_name)
        .fixable()]
    }
}

impl Fixable for DomainImmutability {
    fn fix(&self, violation: &Violation, ctx: &RuleContext) -> Option<Vec<TransformationPlan>> {
        let assign_id = violation.node_ref?;
        let method = enclosing_function(ctx.ast, assign_id)?;
        let class_id = method.parent?;
        let class = ctx.ast.get(class_id);
        Some(vec![TransformationPlan {
            kind: PlanKind::AddFrozenDecorator,
            target_path: ctx.path.to_path_buf(),
            anchor: Anchor {
                node_kind: "ClassDef".to_string(),
                identifier: class.payload.identifier.clone(),
                line: class.span.start.line,
                column: class.span.start.column,
            },
            params: json!({ "decorator": "dataclass(frozen=True)" }),
        }])
    }
}

fn enclosing_function<'a>(ast: &'a Ast, id: NodeId) -> Option<&'a Node> {
    let mut cur = ast.get(id).parent;
    while let Some(p) = cur {
        let node = ast.get(p);
        if matches!(node.kind, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef) {
            return Some(node);
        }
        cur = node.parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::{parse, SourceFile};

    use crate::layer::{DOMAIN, INFRASTRUCTURE, USE_CASE};
    use crate::type_oracle::TypeOracle;

    fn ctx<'a>(
        ast: &'a excelsior_ast::Ast,
        path: &'a std::path::Path,
        layer: Option<&'a String>,
        oracle: &'a TypeOracle<'a>,
        resolver: &'a dyn Fn(&str) -> Option<String>,
    ) -> RuleContext<'a> {
        RuleContext::new(ast, path, "m", layer, oracle, resolver)
    }

    #[test]
    fn test_contract_integrity_fires_for_adapters_dir_without_protocol() {
        let source = SourceFile::new(
            "infrastructure/adapters/payment_gateway.py",
            "class StripeGateway:\n    pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = INFRASTRUCTURE.to_string();
        let path = std::path::Path::new("infrastructure/adapters/payment_gateway.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let class = ast.walk().find(|n| n.kind == NodeKind::ClassDef).unwrap();
        let violations = ContractIntegrity::default().check(class.id, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("rule 8"));
    }

    #[test]
    fn test_contract_integrity_allows_protocol_ancestor() {
        let source = SourceFile::new(
            "infrastructure/adapters/payment_gateway.py",
            "class StripeGateway(PaymentGatewayProtocol):\n    pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = INFRASTRUCTURE.to_string();
        let path = std::path::Path::new("infrastructure/adapters/payment_gateway.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let class = ast.walk().find(|n| n.kind == NodeKind::ClassDef).unwrap();
        assert!(ContractIntegrity::default().check(class.id, &c).is_empty());
    }

    #[test]
    fn test_dataclass_decorated_infrastructure_class_is_internal() {
        let source = SourceFile::new(
            "infrastructure/adapters/dto.py",
            "@dataclass\nclass RowDto:\n    pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = INFRASTRUCTURE.to_string();
        let path = std::path::Path::new("infrastructure/adapters/dto.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let class = ast.walk().find(|n| n.kind == NodeKind::ClassDef).unwrap();
        assert!(ContractIntegrity::default().check(class.id, &c).is_empty());
    }

    #[test]
    fn test_concrete_method_stub_fires_on_pass_only_body() {
        let source = SourceFile::new(
            "t.py",
            "class Repo:\n    def save(self, order):\n        pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, std::path::Path::new("t.py"), None, &oracle, &resolver);
        let method = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("save"))
            .unwrap();
        assert_eq!(ConcreteMethodStub.check(method.id, &c).len(), 1);
    }

    #[test]
    fn test_concrete_method_stub_allows_abstractmethod() {
        let source = SourceFile::new(
            "t.py",
            "class Repo:\n    @abstractmethod\n    def save(self, order):\n        pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, std::path::Path::new("t.py"), None, &oracle, &resolver);
        let method = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("save"))
            .unwrap();
        assert!(ConcreteMethodStub.check(method.id, &c).is_empty());
    }

    #[test]
    fn test_di_violation_fires_for_direct_infrastructure_instantiation() {
        let source = SourceFile::new(
            "use_cases/checkout.py",
            "class Checkout:\n    def __init__(self):\n        self.gw = StripeGateway()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |name: &str| -> Option<String> {
            if name == "StripeGateway" {
                Some(INFRASTRUCTURE.to_string())
            } else {
                None
            }
        };
        let layer = USE_CASE.to_string();
        let path = std::path::Path::new("use_cases/checkout.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let call = ast.walk().find(|n| n.kind == NodeKind::Call).unwrap();
        assert_eq!(DiViolation.check(call.id, &c).len(), 1);
    }

    #[test]
    fn test_domain_immutability_fires_outside_init() {
        let source = SourceFile::new(
            "domain/order.py",
            "class Order:\n    def cancel(self):\n        self.status = 'cancelled'\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = DOMAIN.to_string();
        let path = std::path::Path::new("domain/order.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let assign = ast.walk().find(|n| n.kind == NodeKind::Assign).unwrap();
        let violations = DomainImmutability.check(assign.id, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].fixable);
    }

    #[test]
    fn test_domain_immutability_allows_init_assignment() {
        let source = SourceFile::new(
            "domain/order.py",
            "class Order:\n    def __init__(self):\n        self.status = 'new'\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = DOMAIN.to_string();
        let path = std::path::Path::new("domain/order.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let assign = ast.walk().find(|n| n.kind == NodeKind::Assign).unwrap();
        assert!(DomainImmutability.check(assign.id, &c).is_empty());
    }
}
