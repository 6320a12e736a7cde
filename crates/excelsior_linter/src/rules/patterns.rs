//! W9041-W9045 Pattern Suggestions. Informational by default (see
//! DESIGN.md's Open Question decision on `pattern_suggestions_block`) — these
//! rules never gate the pipeline on their own; blocking is a catalog/config
//! concern, not something the rule decides.

use std::collections::{HashMap, HashSet};

use excelsior_ast::{Ast, Node, NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::{dotted_chain, leaf_name, location};

const BUILDER_PARAM_THRESHOLD: usize = 6;
const FACADE_DEPENDENCY_THRESHOLD: usize = 5;

pub struct BuilderSuggestion;

impl Checkable for BuilderSuggestion {
    fn code(&self) -> &'static str {
        "W9041"
    }

    fn description(&self) -> &'static str {
        "constructor with many parameters may read better as a Builder"
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
        let param_count = ctx
            .ast
            .children(args.id)
            .filter(|p| p.payload.identifier.as_deref() != Some("self"))
            .count();
        if param_count < BUILDER_PARAM_THRESHOLD {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("`__init__` takes {param_count} parameters; consider a Builder"),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

/// Shared scan over an `if`/`elif` chain's own single-statement links, the
/// way `DelegationAntiPattern` walks the same flattened representation.
fn chain_links<'a>(ast: &'a Ast, if_id: NodeId) -> Vec<&'a Node> {
    let mut links = vec![ast.get(if_id)];
    let mut cur = if_id;
    loop {
        let tail = ast.children(cur).last();
        match tail {
            Some(n) if n.kind == NodeKind::If => {
                links.push(n);
                cur = n.id;
            }
            _ => break,
        }
    }
    links
}

fn own_stmts<'a>(ast: &'a Ast, if_id: NodeId) -> Vec<&'a Node> {
    let children: Vec<&Node> = ast.children(if_id).collect();
    let mut body = children.into_iter().skip(1).collect::<Vec<_>>();
    if matches!(body.last(), Some(n) if n.kind == NodeKind::If) {
        body.pop();
    }
    body
}

pub struct FactorySuggestion;

impl Checkable for FactorySuggestion {
    fn code(&self) -> &'static str {
        "W9042"
    }

    fn description(&self) -> &'static str {
        "if/elif chain instantiating different classes may read better as a Factory"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::If]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        if node.parent.map(|p| ctx.ast.get(p).kind == NodeKind::If).unwrap_or(false) {
            return Vec::new();
        }
        let links = chain_links(ctx.ast, id);
        if links.len() < 2 {
            return Vec::new();
        }
        let mut classes = HashSet::new();
        for link in &links {
            let stmts = own_stmts(ctx.ast, link.id);
            let Some(call) = stmts.iter().find_map(|s| call_in_stmt(ctx.ast, s)) else {
                return Vec::new();
            };
            let Some(name) = leaf_name(ctx.ast, call) else {
                return Vec::new();
            };
            if !name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                return Vec::new();
            }
            classes.insert(name);
        }
        if classes.len() < 2 {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("branches instantiate {} different classes ({}); consider a Factory", classes.len(), classes.into_iter().collect::<Vec<_>>().join(", ")),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

fn call_in_stmt(ast: &Ast, stmt: &Node) -> Option<NodeId> {
    match stmt.kind {
        NodeKind::Return | NodeKind::Expr => stmt.children.first().copied().filter(|c| ast.get(*c).kind == NodeKind::Call),
        NodeKind::Assign => stmt.children.last().copied().filter(|c| ast.get(*c).kind == NodeKind::Call),
        _ => None,
    }
}

pub struct StrategySuggestion;

impl Checkable for StrategySuggestion {
    fn code(&self) -> &'static str {
        "W9043"
    }

    fn description(&self) -> &'static str {
        "if/elif chain selecting behavior on the same target may read better as a Strategy"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::If]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        if node.parent.map(|p| ctx.ast.get(p).kind == NodeKind::If).unwrap_or(false) {
            return Vec::new();
        }
        let links = chain_links(ctx.ast, id);
        if links.len() < 2 {
            return Vec::new();
        }
        let mut targets = HashSet::new();
        let mut callees = HashSet::new();
        for link in &links {
            let stmts = own_stmts(ctx.ast, link.id);
            let Some(assign) = stmts.iter().find(|s| s.kind == NodeKind::Assign) else {
                return Vec::new();
            };
            let Some(target_id) = assign.children.first() else {
                return Vec::new();
            };
            let Some(target_name) = leaf_name(ctx.ast, *target_id) else {
                return Vec::new();
            };
            targets.insert(target_name);
            let Some(value_id) = assign.children.last() else {
                return Vec::new();
            };
            let Some(callee_name) = leaf_name(ctx.ast, *value_id) else {
                return Vec::new();
            };
            callees.insert(callee_name);
        }
        if targets.len() != 1 || callees.len() < 2 {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            "branches assign different callables to the same target; consider a Strategy",
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct StateSuggestion;

impl Checkable for StateSuggestion {
    fn code(&self) -> &'static str {
        "W9044"
    }

    fn description(&self) -> &'static str {
        "repeated conditionals on the same attribute may read better as a State machine"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::ClassDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for descendant in descendants(ctx.ast, id) {
            if descendant.kind != NodeKind::Compare {
                continue;
            }
            for child in &descendant.children {
                if let Some(chain) = attribute_target(ctx.ast, *child) {
                    *counts.entry(chain).or_insert(0) += 1;
                }
            }
        }
        let repeated: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 3).collect();
        if repeated.is_empty() {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        repeated
            .into_iter()
            .map(|(attr, count)| {
                Violation::new(
                    self.code(),
                    format!("`{name}` branches on `{attr}` {count} times; consider a State machine"),
                    location(ctx.path, node),
                )
                .with_node(id)
                .with_symbol(attr)
            })
            .collect()
    }
}

/// Pre-order traversal of everything under (not including) `id`. `Ast` only
/// exposes a whole-tree `walk()`, so the rules in this module that need a
/// single subtree's descendants collect them directly via `children()`.
fn descendants<'a>(ast: &'a Ast, id: NodeId) -> Vec<&'a Node> {
    let mut stack: Vec<NodeId> = ast.get(id).children.clone();
    let mut order = Vec::new();
    while let Some(cur) = stack.pop() {
        let node = ast.get(cur);
        order.push(node);
        stack.extend(node.children.iter().rev().copied());
    }
    order
}

fn attribute_target(ast: &Ast, id: NodeId) -> Option<String> {
    if ast.get(id).kind != NodeKind::Attribute {
        return None;
    }
    let chain = dotted_chain(ast, id);
    if chain.first().map(|s| s.as_str()) != Some("self") {
        return None;
    }
    Some(chain.join("."))
}

pub struct FacadeSuggestion;

impl Checkable for FacadeSuggestion {
    fn code(&self) -> &'static str {
        "W9045"
    }

    fn description(&self) -> &'static str {
        "method orchestrating many dependencies may read better as a Facade"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let mut dependencies = HashSet::new();
        for descendant in descendants(ctx.ast, id) {
            if descendant.kind != NodeKind::Call {
                continue;
            }
            let Some(callee) = descendant.children.first() else {
                continue;
            };
            if ctx.ast.get(*callee).kind != NodeKind::Attribute {
                continue;
            }
            let chain = dotted_chain(ctx.ast, *callee);
            if chain.first().map(|s| s.as_str()) == Some("self") && chain.len() >= 2 {
                dependencies.insert(chain[1].clone());
            }
        }
        if dependencies.len() < FACADE_DEPENDENCY_THRESHOLD {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("`{name}` orchestrates {} dependencies; consider a Facade", dependencies.len()),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
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
    fn test_builder_suggestion_fires_at_six_params() {
        let source = SourceFile::new(
            "t.py",
            "class Order:\n    def __init__(self, a, b, c, d, e, f):\n        pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let init = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("__init__"))
            .unwrap();
        assert_eq!(BuilderSuggestion.check(init.id, &c).len(), 1);
    }

    #[test]
    fn test_factory_suggestion_fires_on_different_class_branches() {
        let source = SourceFile::new(
            "t.py",
            "if kind == 'a':\n    return Cash()\nelif kind == 'b':\n    return Card()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let top_if = ast
            .walk()
            .find(|n| n.kind == NodeKind::If && n.parent.map(|p| ast.get(p).kind != NodeKind::If).unwrap_or(true))
            .unwrap();
        assert_eq!(FactorySuggestion.check(top_if.id, &c).len(), 1);
    }

    #[test]
    fn test_state_suggestion_fires_on_repeated_attribute_branch() {
        let source = SourceFile::new(
            "t.py",
            "class Order:\n    def a(self):\n        if self.status == 'new':\n            pass\n    def b(self):\n        if self.status == 'paid':\n            pass\n    def c(self):\n        if self.status == 'shipped':\n            pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let class = ast.walk().find(|n| n.kind == NodeKind::ClassDef).unwrap();
        let violations = StateSuggestion.check(class.id, &c);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].symbol.as_deref(), Some("self.status"));
    }

    #[test]
    fn test_facade_suggestion_fires_on_five_dependencies() {
        let source = SourceFile::new(
            "t.py",
            "class Checkout:\n    def run(self):\n        self.a.x()\n        self.b.x()\n        self.c.x()\n        self.d.x()\n        self.e.x()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let method = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("run"))
            .unwrap();
        assert_eq!(FacadeSuggestion.check(method.id, &c).len(), 1);
    }
}
