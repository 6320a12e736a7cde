//! W9005 Delegation Anti-Pattern, W9010 God File, W9011 Deep Structure,
//! W9018 No Top-Level Functions, W9020 Global State, W9032 Method
//! Complexity, W9033 Interface Segregation.

use excelsior_ast::{Ast, Node, NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::location;

const ENTRY_MODULES: &[&str] = &["main.py", "__init__.py", "__main__.py", "setup.py", "manage.py"];

fn file_name(ctx: &RuleContext) -> String {
    ctx.path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_entry_module(ctx: &RuleContext) -> bool {
    ENTRY_MODULES.contains(&file_name(ctx).as_str())
}

pub struct DelegationAntiPattern;

impl DelegationAntiPattern {
    /// Direct body statements of this `if`/`elif` link: every child except
    /// the leading condition and (if present) a trailing nested `If` that
    /// represents the next `elif`/`else` link in the chain.
    fn own_body<'a>(&self, ast: &'a Ast, if_id: NodeId) -> Vec<&'a Node> {
        let children: Vec<&Node> = ast.children(if_id).collect();
        let mut body = children.into_iter().skip(1).collect::<Vec<_>>();
        if matches!(body.last(), Some(n) if n.kind == NodeKind::If) {
            body.pop();
        }
        body
    }

    fn is_return_call(&self, ast: &Ast, stmt: &Node) -> bool {
        stmt.kind == NodeKind::Return
            && stmt
                .children
                .first()
                .map(|c| ast.get(*c).kind == NodeKind::Call)
                .unwrap_or(false)
    }

    fn count_delegating_links(&self, ast: &Ast, if_id: NodeId) -> usize {
        let body = self.own_body(ast, if_id);
        let this_link = if body.len() == 1 && self.is_return_call(ast, body[0]) {
            1
        } else {
            0
        };
        let next = ast
            .children(if_id)
            .last()
            .filter(|n| n.kind == NodeKind::If)
            .map(|n| self.count_delegating_links(ast, n.id))
            .unwrap_or(0);
        this_link + next
    }
}

impl Checkable for DelegationAntiPattern {
    fn code(&self) -> &'static str {
        "W9005"
    }

    fn description(&self) -> &'static str {
        "if/elif chain whose branches only delegate via a call"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::If]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        if node.parent.map(|p| ctx.ast.get(p).kind == NodeKind::If).unwrap_or(false) {
            // only the head of the chain reports.
            return Vec::new();
        }
        let count = self.count_delegating_links(ctx.ast, id);
        if count < 2 {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("{count} if/elif branches only delegate via a call; consider a dispatch table"),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct GodFile;

impl GodFile {
    fn is_heavy(&self, ast: &Ast, class: &Node) -> bool {
        let is_protocol = ast
            .class_bases(class.id)
            .iter()
            .any(|b| b.payload.identifier.as_deref() == Some("Protocol"));
        let is_dataclass = class
            .payload
            .decorator_names
            .iter()
            .any(|d| d == "dataclass" || d.ends_with(".dataclass"));
        !is_protocol && !is_dataclass
    }
}

impl Checkable for GodFile {
    fn code(&self) -> &'static str {
        "W9010"
    }

    fn description(&self) -> &'static str {
        "more than one heavy class in a single module, or classes spanning layers"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Module]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if !matches!(ctx.layer.map(|l| l.as_str()), Some("UseCase") | Some("Infrastructure")) {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let heavy: Vec<&Node> = ctx
            .ast
            .children(id)
            .filter(|n| n.kind == NodeKind::ClassDef && self.is_heavy(ctx.ast, n))
            .collect();
        if heavy.len() <= 1 {
            return Vec::new();
        }
        let names: Vec<String> = heavy
            .iter()
            .filter_map(|c| c.payload.identifier.clone())
            .collect();
        vec![Violation::new(
            self.code(),
            format!("module defines {} heavy classes: {}", heavy.len(), names.join(", ")),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct DeepStructure;

impl Checkable for DeepStructure {
    fn code(&self) -> &'static str {
        "W9011"
    }

    fn description(&self) -> &'static str {
        "logic module placed directly at the project root"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Module]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if is_entry_module(ctx) {
            return Vec::new();
        }
        let at_root = ctx
            .path
            .parent()
            .map(|p| p.as_os_str().is_empty())
            .unwrap_or(true);
        if !at_root {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        vec![Violation::new(
            self.code(),
            format!("{} sits at the project root instead of a layer directory", ctx.dotted_module),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct NoTopLevelFunctions;

impl Checkable for NoTopLevelFunctions {
    fn code(&self) -> &'static str {
        "W9018"
    }

    fn description(&self) -> &'static str {
        "module-level function definition outside an allowlisted entry module"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if is_entry_module(ctx) {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let is_top_level = node
            .parent
            .map(|p| ctx.ast.get(p).kind == NodeKind::Module)
            .unwrap_or(false);
        if !is_top_level {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("`{name}` is a module-level function; wrap it in a class or use case"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct GlobalState;

impl Checkable for GlobalState {
    fn code(&self) -> &'static str {
        "W9020"
    }

    fn description(&self) -> &'static str {
        "use of a global declaration"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Global]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        vec![Violation::new(
            self.code(),
            format!("global declaration of {}", node.payload.names.join(", ")),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct MethodComplexity {
    pub threshold: u32,
}

impl Default for MethodComplexity {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

impl MethodComplexity {
    fn complexity(&self, ast: &Ast, id: NodeId) -> u32 {
        let mut total = 1;
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            for child in ast.children(cur) {
                match child.kind {
                    NodeKind::If
                    | NodeKind::For
                    | NodeKind::While
                    | NodeKind::ExceptHandler
                    | NodeKind::BoolOp
                    | NodeKind::Comprehension => total += 1,
                    NodeKind::FunctionDef | NodeKind::AsyncFunctionDef | NodeKind::Lambda | NodeKind::ClassDef => {
                        continue;
                    }
                    _ => {}
                }
                stack.push(child.id);
            }
        }
        total
    }
}

impl Checkable for MethodComplexity {
    fn code(&self) -> &'static str {
        "W9032"
    }

    fn description(&self) -> &'static str {
        "cyclomatic complexity exceeds threshold"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let complexity = self.complexity(ctx.ast, id);
        if complexity <= self.threshold {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("`{name}` has cyclomatic complexity {complexity} (threshold {})", self.threshold),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct InterfaceSegregation {
    pub limit: usize,
}

impl Default for InterfaceSegregation {
    fn default() -> Self {
        Self { limit: 7 }
    }
}

impl Checkable for InterfaceSegregation {
    fn code(&self) -> &'static str {
        "W9033"
    }

    fn description(&self) -> &'static str {
        "Protocol defines more methods than the segregation limit"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::ClassDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let is_protocol = ctx
            .ast
            .class_bases(id)
            .iter()
            .any(|b| b.payload.identifier.as_deref() == Some("Protocol"));
        if !is_protocol {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let method_count = ctx
            .ast
            .children(id)
            .filter(|n| matches!(n.kind, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef))
            .count();
        if method_count <= self.limit {
            return Vec::new();
        }
        let name = node.payload.identifier.clone().unwrap_or_default();
        vec![Violation::new(
            self.code(),
            format!("Protocol `{name}` defines {method_count} methods (limit {})", self.limit),
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

    use crate::layer::USE_CASE;
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
    fn test_delegation_anti_pattern_fires_on_three_branch_chain() {
        let source = SourceFile::new(
            "t.py",
            "if kind == 'a':\n    return make_a()\nelif kind == 'b':\n    return make_b()\nelif kind == 'c':\n    return make_c()\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let path = std::path::Path::new("t.py");
        let c = ctx(&ast, path, None, &oracle, &resolver);
        let top_if = ast
            .walk()
            .find(|n| n.kind == NodeKind::If && n.parent.map(|p| ast.get(p).kind != NodeKind::If).unwrap_or(true))
            .unwrap();
        let violations = DelegationAntiPattern.check(top_if.id, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains('3'));
    }

    #[test]
    fn test_god_file_fires_on_two_heavy_classes_in_use_case() {
        let source = SourceFile::new(
            "use_cases/order.py",
            "class OrderProcessor:\n    pass\nclass InventoryAdjuster:\n    pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let layer = USE_CASE.to_string();
        let path = std::path::Path::new("use_cases/order.py");
        let c = ctx(&ast, path, Some(&layer), &oracle, &resolver);
        let violations = GodFile.check(ast.root().id, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("OrderProcessor"));
        assert!(violations[0].message.contains("InventoryAdjuster"));
    }

    #[test]
    fn test_deep_structure_fires_for_root_level_module() {
        let source = SourceFile::new("orchestrator.py", "pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let path = std::path::Path::new("orchestrator.py");
        let c = ctx(&ast, path, None, &oracle, &resolver);
        assert_eq!(DeepStructure.check(ast.root().id, &c).len(), 1);
    }

    #[test]
    fn test_method_complexity_counts_branches_but_not_nested_functions() {
        let source = SourceFile::new(
            "t.py",
            "def f():\n    if a:\n        pass\n    if b:\n        def g():\n            if c:\n                pass\n        pass\n",
        );
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let path = std::path::Path::new("t.py");
        let c = ctx(&ast, path, None, &oracle, &resolver);
        let outer = ast
            .walk()
            .find(|n| n.kind == NodeKind::FunctionDef && n.payload.identifier.as_deref() == Some("f"))
            .unwrap();
        let rule = MethodComplexity { threshold: 2 };
        let violations = rule.check(outer.id, &c);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains('3'));
    }
}
