//! W9030 Architectural Entropy (Scatter).
//!
//! Unlike every other rule in the catalog, scatter detection cannot be
//! decided from a single file: the same identifier literal repeated across
//! files is exactly the thing it flags. Per the scheduling model, each
//! worker collects literals from its own files during the normal per-file
//! walk (`check` always returns empty — there is nothing to say yet), and
//! a single-threaded reduction step after all files are collected turns
//! the merged table into violations. `reduce` is not part of `Checkable`;
//! the audit/fix pipelines call it once, after every file's AST has been
//! walked.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use excelsior_ast::{NodeId, NodeKind};

use crate::diagnostics::{SourceLocation, Violation};
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::location;

const SCATTER_THRESHOLD: usize = 2;

struct Occurrence {
    path: PathBuf,
    loc: SourceLocation,
}

/// Collects string literals seen in "definition context" across every file
/// passed through `check`, then reduces the merged table to violations.
pub struct ArchitecturalEntropy {
    seen: RefCell<HashMap<String, Vec<Occurrence>>>,
}

impl Default for ArchitecturalEntropy {
    fn default() -> Self {
        Self {
            seen: RefCell::new(HashMap::new()),
        }
    }
}

impl ArchitecturalEntropy {
    /// True when `id` (a `Const` string literal) sits in definition
    /// context: sole/first element of a `List`/`Set`/`Dict` literal, or the
    /// right-hand side of an `Assign` to an uppercase (constant-convention)
    /// target.
    fn in_definition_context(&self, ast: &excelsior_ast::Ast, id: NodeId) -> bool {
        let Some(parent) = ast.get(id).parent else {
            return false;
        };
        let parent_node = ast.get(parent);
        match parent_node.kind {
            NodeKind::List | NodeKind::Set | NodeKind::Dict => parent_node
                .children
                .first()
                .copied()
                .is_some_and(|first| first == id),
            NodeKind::Assign => {
                let is_value = parent_node.children.last().copied() == Some(id);
                if !is_value {
                    return false;
                }
                parent_node.children[..parent_node.children.len().saturating_sub(1)]
                    .iter()
                    .any(|target| {
                        ast.get(*target)
                            .payload
                            .identifier
                            .as_deref()
                            .is_some_and(|name| !name.is_empty() && name == name.to_uppercase())
                    })
            }
            _ => false,
        }
    }

    /// After every file has been walked through `check`, emit one
    /// violation per distinct literal seen in at least `SCATTER_THRESHOLD`
    /// files. Call this exactly once per audit/fix run, single-threaded.
    pub fn reduce(&self) -> Vec<Violation> {
        self.seen
            .borrow()
            .iter()
            .filter(|(_, occurrences)| {
                let distinct_files: std::collections::HashSet<&Path> =
                    occurrences.iter().map(|o| o.path.as_path()).collect();
                distinct_files.len() >= SCATTER_THRESHOLD
            })
            .map(|(literal, occurrences)| {
                let files: Vec<String> = {
                    let mut paths: Vec<String> = occurrences
                        .iter()
                        .map(|o| o.path.display().to_string())
                        .collect();
                    paths.sort();
                    paths.dedup();
                    paths
                };
                Violation::new(
                    self.code(),
                    format!(
                        "identifier literal `{literal}` is defined independently in {} files: {}",
                        files.len(),
                        files.join(", ")
                    ),
                    occurrences[0].loc.clone(),
                )
                .with_symbol(literal.clone())
            })
            .collect()
    }

    pub fn code(&self) -> &'static str {
        "W9030"
    }
}

impl Checkable for ArchitecturalEntropy {
    fn code(&self) -> &'static str {
        "W9030"
    }

    fn description(&self) -> &'static str {
        "identifier literal redefined independently across files (collected; see `reduce`)"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Const]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let node = ctx.ast.get(id);
        let Some(excelsior_ast::Literal::Str(text)) = &node.payload.literal else {
            return Vec::new();
        };
        if text.is_empty() || !self.in_definition_context(ctx.ast, id) {
            return Vec::new();
        }
        self.seen
            .borrow_mut()
            .entry(text.clone())
            .or_default()
            .push(Occurrence {
                path: ctx.path.to_path_buf(),
                loc: location(ctx.path, node),
            });
        Vec::new()
    }
}
