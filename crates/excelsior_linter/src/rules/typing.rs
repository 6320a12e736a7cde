//! W9015 Missing Type Hint (fixable when inferable), W9016 Banned Any,
//! W9019 Uninferable Dependency.

use serde_json::json;

use excelsior_ast::{NodeId, NodeKind};

use crate::diagnostics::{Anchor, PlanKind, TransformationPlan, Violation};
use crate::registry::{Checkable, Fixable, RuleContext};
use crate::rules::support::location;

const IMPLICIT_SELF: &[&str] = &["self", "cls"];
const UNINFERABLE: &str = "Inference failed: type could not be determined from context or stubs.";

pub struct MissingTypeHint;

impl MissingTypeHint {
    /// Walks the function body for a `Return` with an inferable value, the
    /// way the oracle's annotation source would if one existed.
    fn infer_return(&self, fn_id: NodeId, ctx: &RuleContext) -> Option<String> {
        ctx.ast
            .children(fn_id)
            .find(|n| n.kind == NodeKind::Return)
            .and_then(|ret| ret.children.first().copied())
            .and_then(|value| ctx.oracle.resolve(value))
    }
}

impl Checkable for MissingTypeHint {
    fn code(&self) -> &'static str {
        "W9015"
    }

    fn description(&self) -> &'static str {
        "parameter or return without a type annotation"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let fn_name = node.payload.identifier.clone().unwrap_or_default();
        let mut violations = Vec::new();

        if let Some(args) = ctx.ast.children(id).find(|n| n.kind == NodeKind::Arguments) {
            for param in ctx.ast.children(args.id) {
                let param_name = param.payload.identifier.clone().unwrap_or_default();
                if IMPLICIT_SELF.contains(&param_name.as_str()) {
                    continue;
                }
                if param.payload.type_annotation.is_some() {
                    continue;
                }
                let inferred = ctx.oracle.resolve(param.id);
                let violation = Violation::new(
                    self.code(),
                    format!("parameter `{param_name}` of `{fn_name}` has no type annotation"),
                    location(ctx.path, param),
                )
                .with_node(param.id)
                .with_symbol(format!("{fn_name}.{param_name}"));
                violations.push(match inferred {
                    Some(_) => violation.fixable(),
                    None => violation.with_fix_failure(UNINFERABLE),
                });
            }
        }

        if node.payload.type_annotation.is_none() {
            let inferred = self.infer_return(id, ctx);
            let violation = Violation::new(
                self.code(),
                format!("`{fn_name}` has no return type annotation"),
                location(ctx.path, node),
            )
            .with_node(id)
            .with_symbol(fn_name);
            violations.push(match inferred {
                Some(_) => violation.fixable(),
                None => violation.with_fix_failure(UNINFERABLE),
            });
        }
        violations
    }
}

impl Fixable for MissingTypeHint {
    fn fix(&self, violation: &Violation, ctx: &RuleContext) -> Option<Vec<TransformationPlan>> {
        let node_id = violation.node_ref?;
        let node = ctx.ast.get(node_id);
        let anchor = Anchor {
            node_kind: format!("{:?}", node.kind),
            identifier: node.payload.identifier.clone(),
            line: node.span.start.line,
            column: node.span.start.column,
        };
        if node.kind == NodeKind::AssignName {
            let qname = ctx.oracle.resolve(node_id)?;
            return Some(vec![TransformationPlan {
                kind: PlanKind::AddParameterType,
                target_path: ctx.path.to_path_buf(),
                anchor,
                params: json!({ "annotation": qname }),
            }]);
        }
        let qname = self.infer_return(node_id, ctx)?;
        Some(vec![TransformationPlan {
            kind: PlanKind::AddReturnType,
            target_path: ctx.path.to_path_buf(),
            anchor,
            params: json!({ "annotation": qname }),
        }])
    }
}

pub struct BannedAny;

impl Checkable for BannedAny {
    fn code(&self) -> &'static str {
        "W9016"
    }

    fn description(&self) -> &'static str {
        "type hint resolves to Any"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::AssignName, NodeKind::AnnAssign, NodeKind::FunctionDef, NodeKind::AsyncFunctionDef]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let Some(annotation) = &node.payload.type_annotation else {
            return Vec::new();
        };
        if !is_any_annotation(annotation) {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            format!("type hint `{annotation}` resolves to Any"),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

fn is_any_annotation(annotation: &str) -> bool {
    annotation
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .any(|token| token == "Any" || token.ends_with(".Any"))
}

pub struct UninferableDependency;

impl Checkable for UninferableDependency {
    fn code(&self) -> &'static str {
        "W9019"
    }

    fn description(&self) -> &'static str {
        "imported module has no stub and no inference result"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::ImportFrom, NodeKind::Import]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let targets: Vec<String> = match node.kind {
            NodeKind::ImportFrom => node.payload.identifier.iter().cloned().collect(),
            NodeKind::Import => node
                .payload
                .names
                .iter()
                .map(|n| n.split(" as ").next().unwrap_or(n).to_string())
                .collect(),
            _ => Vec::new(),
        };
        targets
            .into_iter()
            .filter(|t| !ctx.oracle.is_stdlib_qname(t) && (ctx.resolve_layer)(t).is_none())
            .map(|t| {
                Violation::new(
                    self.code(),
                    format!("`{t}` has no stub and no inference result"),
                    location(ctx.path, node),
                )
                .with_node(id)
                .with_symbol(t)
            })
            .collect()
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
    fn test_missing_return_annotation_is_fixable_when_inferable() {
        let source = SourceFile::new("t.py", "def greet(name: str):\n    return \"hi\"\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let def = ast.walk().find(|n| n.kind == NodeKind::FunctionDef).unwrap();
        let violations = MissingTypeHint.check(def.id, &c);
        let return_violation = violations.iter().find(|v| v.symbol.as_deref() == Some("greet")).unwrap();
        assert!(return_violation.fixable);
    }

    #[test]
    fn test_missing_return_annotation_uninferable_sets_failure_reason() {
        let source = SourceFile::new("t.py", "def dyn():\n    return process(get_data())\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let def = ast.walk().find(|n| n.kind == NodeKind::FunctionDef).unwrap();
        let violations = MissingTypeHint.check(def.id, &c);
        let return_violation = violations.iter().find(|v| v.symbol.as_deref() == Some("dyn")).unwrap();
        assert!(!return_violation.fixable);
        assert!(return_violation.fix_failure_reason.is_some());
    }

    /// The gateway reads `plan.params["annotation"]` — this key must be
    /// what `fix()` actually emits, for both the return-type and
    /// parameter-type plan kinds, or `apply_fixes` silently inserts `""`.
    #[test]
    fn test_fix_emits_annotation_key_the_gateway_reads() {
        let source = SourceFile::new("t.py", "def greet(name: str):\n    return \"hi\"\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let def = ast.walk().find(|n| n.kind == NodeKind::FunctionDef).unwrap();
        let violations = MissingTypeHint.check(def.id, &c);
        let return_violation = violations.iter().find(|v| v.symbol.as_deref() == Some("greet")).unwrap();

        let plans = MissingTypeHint.fix(return_violation, &c).unwrap();
        assert_eq!(plans[0].kind, PlanKind::AddReturnType);
        assert_eq!(plans[0].params["annotation"].as_str(), Some("builtins.str"));
    }

    #[test]
    fn test_banned_any_detects_typing_any() {
        let source = SourceFile::new("t.py", "def f(x: Any):\n    pass\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let param = ast
            .walk()
            .find(|n| n.kind == NodeKind::AssignName && n.payload.identifier.as_deref() == Some("x"))
            .unwrap();
        assert_eq!(BannedAny.check(param.id, &c).len(), 1);
    }

    #[test]
    fn test_uninferable_dependency_fires_for_unknown_third_party_module() {
        let source = SourceFile::new("t.py", "import weirdlib\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let import = ast.walk().find(|n| n.kind == NodeKind::Import).unwrap();
        assert_eq!(UninferableDependency.check(import.id, &c).len(), 1);
    }

    #[test]
    fn test_stdlib_import_is_not_uninferable() {
        let source = SourceFile::new("t.py", "import os\n");
        let ast = parse(&source).unwrap();
        let oracle = TypeOracle::new(&ast);
        let resolver = |_: &str| -> Option<String> { None };
        let c = ctx(&ast, &oracle, &resolver);
        let import = ast.walk().find(|n| n.kind == NodeKind::Import).unwrap();
        assert!(UninferableDependency.check(import.id, &c).is_empty());
    }
}
