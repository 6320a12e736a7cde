//! W9101 Fragile Test Mocks (stateful), W9102 Private Method Test.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use excelsior_ast::{NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::registry::{Checkable, RuleContext, ScopeToken, StatefulRule};
use crate::rules::support::{is_mock_constructor_call, is_test_function, leaf_name, location};

const MOCK_THRESHOLD: u32 = 4;

struct ScopeState {
    name: String,
    node: NodeId,
    mock_count: u32,
}

/// Counts mock-constructor calls per test function. The engine owns the
/// opaque `ScopeToken`; the counters behind it live in this rule's
/// `RefCell` since every `StatefulRule` method takes `&self`, not `&mut
/// self` — the engine is free to run rules concurrently across files.
pub struct FragileTestMocks {
    scopes: RefCell<HashMap<u32, ScopeState>>,
    next_token: Cell<u32>,
}

impl Default for FragileTestMocks {
    fn default() -> Self {
        Self {
            scopes: RefCell::new(HashMap::new()),
            next_token: Cell::new(0),
        }
    }
}

impl StatefulRule for FragileTestMocks {
    fn code(&self) -> &'static str {
        "W9101"
    }

    fn record_functiondef(&self, node: NodeId, ctx: &RuleContext) -> Option<ScopeToken> {
        let name = ctx.ast.get(node).payload.identifier.clone().unwrap_or_default();
        if !is_test_function(&name) {
            return None;
        }
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.scopes.borrow_mut().insert(
            token,
            ScopeState {
                name,
                node,
                mock_count: 0,
            },
        );
        Some(ScopeToken(token))
    }

    fn record_call(&self, _node: NodeId, _scope: ScopeToken, _ctx: &RuleContext) -> Vec<Violation> {
        Vec::new()
    }

    fn record_mock_only(&self, node: NodeId, scope: ScopeToken, ctx: &RuleContext) -> bool {
        let Some(name) = leaf_name(ctx.ast, node) else {
            return false;
        };
        if !is_mock_constructor_call(&name) {
            return false;
        }
        if let Some(state) = self.scopes.borrow_mut().get_mut(&scope.0) {
            state.mock_count += 1;
        }
        true
    }

    fn leave_functiondef(&self, scope: ScopeToken, ctx: &RuleContext) -> Vec<Violation> {
        let Some(state) = self.scopes.borrow_mut().remove(&scope.0) else {
            return Vec::new();
        };
        if state.mock_count <= MOCK_THRESHOLD {
            return Vec::new();
        }
        let node = ctx.ast.get(state.node);
        vec![Violation::new(
            self.code(),
            format!("`{}` instantiates {} mocks; the test is coupled to implementation detail", state.name, state.mock_count),
            location(ctx.path, node),
        )
        .with_node(state.node)
        .with_symbol(state.name)]
    }
}

pub struct PrivateMethodTest;

impl Checkable for PrivateMethodTest {
    fn code(&self) -> &'static str {
        "W9102"
    }

    fn description(&self) -> &'static str {
        "test calls a `_`-prefixed method directly"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Call]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let Some(enclosing) = enclosing_test_function(ctx, id) else {
            return Vec::new();
        };
        let node = ctx.ast.get(id);
        let Some(callee) = node.children.first() else {
            return Vec::new();
        };
        if ctx.ast.get(*callee).kind != NodeKind::Attribute {
            return Vec::new();
        }
        let Some(name) = leaf_name(ctx.ast, *callee) else {
            return Vec::new();
        };
        if !name.starts_with('_') || name.starts_with("__") && name.ends_with("__") {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("`{enclosing}` calls private method `{name}` directly; test through the public API"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

fn enclosing_test_function(ctx: &RuleContext, id: NodeId) -> Option<String> {
    let mut cur = ctx.ast.get(id).parent;
    while let Some(p) = cur {
        let node = ctx.ast.get(p);
        if matches!(node.kind, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef) {
            let name = node.payload.identifier.clone().unwrap_or_default();
            return is_test_function(&name).then_some(name);
        }
        cur = node.parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::{parse, SourceFile};

    use crate::type_oracle::TypeOracle;

    fn ctx<'a>(
        ast: &'a excelsior_ast::Ast,
        oracle: &'a TypeOracle<'a>,
        resolver: &'a dyn Fn(&str) -> Option<String>,
    ) -> RuleContext<'a> {
        RuleContext::new(ast, std::path::Path::new("t.py"), "t", None, oracle, resolver)
    }

    #[test]
    fn test_fragile_test_mocks_fires_past_threshold() {
        let source = SourceFile::new(
            "t.py",
            "def test_flow():\n    a = Mock()\n    b = MagicMock()\n    c = Mock()\n    d = patch('x')\n    e = Mock()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let def = ast.walk().find(|n| n.kind == NodeKind::FunctionDef).unwrap();

        let rule = FragileTestMocks::default();
        let scope = rule.record_functiondef(def.id, &c).expect("test scope opens");
        let calls: Vec<_> = ast.walk().filter(|n| n.kind == NodeKind::Call).map(|n| n.id).collect();
        for call in calls {
            rule.record_mock_only(call, scope, &c);
        }
        let violations = rule.leave_functiondef(scope, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains('5'));
    }

    #[test]
    fn test_fragile_test_mocks_allows_scope_at_threshold() {
        let source = SourceFile::new(
            "t.py",
            "def test_flow():\n    a = Mock()\n    b = Mock()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let def = ast.walk().find(|n| n.kind == NodeKind::FunctionDef).unwrap();

        let rule = FragileTestMocks::default();
        let scope = rule.record_functiondef(def.id, &c).unwrap();
        let calls: Vec<_> = ast.walk().filter(|n| n.kind == NodeKind::Call).map(|n| n.id).collect();
        for call in calls {
            rule.record_mock_only(call, scope, &c);
        }
        assert!(rule.leave_functiondef(scope, &c).is_empty());
    }

    #[test]
    fn test_private_method_test_fires_inside_test_function() {
        let source = SourceFile::new("t.py", "def test_foo():\n    service._internal_step()\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let call = ast.walk().find(|n| n.kind == NodeKind::Call).unwrap();
        assert_eq!(PrivateMethodTest.check(call.id, &c).len(), 1);
    }

    #[test]
    fn test_private_method_test_allows_public_call() {
        let source = SourceFile::new("t.py", "def test_foo():\n    service.run()\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let call = ast.walk().find(|n| n.kind == NodeKind::Call).unwrap();
        assert!(PrivateMethodTest.check(call.id, &c).is_empty());
    }
}
