//! One-AST-walk-per-file driver: dispatches every `Checkable` rule to the
//! node kinds it subscribes to, threads `StatefulRule` scope tokens through
//! nested function definitions, and runs the text rules once per file.
//! Grounded on the teacher's `check_path`/`ast_entrypoint_map` in
//! `fortitude_linter::lib`, collapsed from three node-kind maps (path/text/
//! ast) down to one dispatch table plus a separate text-rule pass.

use std::collections::HashMap;
use std::path::Path;

use excelsior_ast::{Ast, NodeId, NodeKind, SourceFile};

use crate::diagnostics::Violation;
use crate::layer::Layer;
use crate::registry::{Checkable, RuleContext, ScopeToken, StatefulRule, TextRule};
use crate::rules::scatter::ArchitecturalEntropy;
use crate::type_oracle::TypeOracle;

/// Node-kind -> indices into `checkable` this file's walk should dispatch
/// to, built once per run and reused across every file (the teacher's
/// `ast_entrypoint_map` does the same to avoid a linear scan per node).
pub struct EntrypointMap {
    table: HashMap<NodeKind, Vec<usize>>,
}

/// Per-scope state: which of `stateful`'s rules opened a scope here, paired
/// positionally (`None` where a rule declined to track this function) so
/// `leave_functiondef` is only ever called for the rule that opened it.
type ScopeEntry = (NodeId, Vec<Option<ScopeToken>>);

impl EntrypointMap {
    pub fn build(checkable: &[Box<dyn Checkable>]) -> Self {
        let mut table: HashMap<NodeKind, Vec<usize>> = HashMap::new();
        for (idx, rule) in checkable.iter().enumerate() {
            for kind in rule.entrypoints() {
                table.entry(*kind).or_default().push(idx);
            }
        }
        Self { table }
    }

    fn rules_for(&self, kind: NodeKind) -> &[usize] {
        self.table.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Runs every checkable/stateful/text rule over one parsed file and returns
/// the raw (undeduplicated, unsorted) violations. Dedup/sort is the audit
/// pipeline's job (spec §5), not the engine's.
#[allow(clippy::too_many_arguments)]
pub fn check_file(
    checkable: &[Box<dyn Checkable>],
    entrypoints: &EntrypointMap,
    stateful: &[Box<dyn StatefulRule>],
    text: &[Box<dyn TextRule>],
    scatter: &ArchitecturalEntropy,
    ast: &Ast,
    source: &SourceFile,
    path: &Path,
    dotted_module: &str,
    layer: Option<&Layer>,
    resolve_layer: &dyn Fn(&str) -> Option<Layer>,
) -> Vec<Violation> {
    let oracle = TypeOracle::new(ast);
    let ctx = RuleContext::new(ast, path, dotted_module, layer, &oracle, resolve_layer);

    let mut violations = Vec::new();
    let mut open_scopes: Vec<ScopeEntry> = Vec::new();

    for node in ast.walk() {
        if matches!(node.kind, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef) {
            let tokens: Vec<Option<ScopeToken>> = stateful
                .iter()
                .map(|rule| rule.record_functiondef(node.id, &ctx))
                .collect();
            open_scopes.push((node.id, tokens));
        }

        for &idx in entrypoints.rules_for(node.kind) {
            violations.extend(checkable[idx].check(node.id, &ctx));
        }

        if node.kind == NodeKind::Const {
            violations.extend(scatter.check(node.id, &ctx));
        }

        if node.kind == NodeKind::Call {
            if let Some((_, tokens)) = open_scopes.last() {
                for (rule, token) in stateful.iter().zip(tokens.iter()) {
                    let Some(token) = token else { continue };
                    violations.extend(rule.record_call(node.id, *token, &ctx));
                    rule.record_mock_only(node.id, *token, &ctx);
                }
            }
        }

        while let Some((scope_node, _)) = open_scopes.last() {
            if node.id == *scope_node || is_descendant(ast, *scope_node, node.id) {
                break;
            }
            let (_, tokens) = open_scopes.pop().unwrap();
            for (rule, token) in stateful.iter().zip(tokens.into_iter()) {
                let Some(token) = token else { continue };
                violations.extend(rule.leave_functiondef(token, &ctx));
            }
        }
    }

    while let Some((_, tokens)) = open_scopes.pop() {
        for (rule, token) in stateful.iter().zip(tokens.into_iter()) {
            let Some(token) = token else { continue };
            violations.extend(rule.leave_functiondef(token, &ctx));
        }
    }

    for rule in text {
        violations.extend(rule.check(path, source));
    }

    violations
}

/// True when `id` sits anywhere under `ancestor` in the parent chain,
/// walked from `id` upward — the pre-order walk gives no direct "entering
/// a new sibling subtree" signal, so scope-closing relies on this instead.
fn is_descendant(ast: &Ast, ancestor: NodeId, id: NodeId) -> bool {
    let mut current = ast.get(id).parent;
    while let Some(p) = current {
        if p == ancestor {
            return true;
        }
        current = ast.get(p).parent;
    }
    false
}
