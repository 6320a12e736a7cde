//! W9001 Illegal Dependency, W9017 Layer Integrity.

use excelsior_ast::{NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::layer::layer_rank;
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::location;

pub struct IllegalDependency;

impl Checkable for IllegalDependency {
    fn code(&self) -> &'static str {
        "W9001"
    }

    fn description(&self) -> &'static str {
        "inner layers must not import outer layers"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Import, NodeKind::ImportFrom]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        let Some(own_layer) = ctx.layer else {
            return Vec::new();
        };
        let Some(own_rank) = layer_rank(own_layer) else {
            return Vec::new();
        };
        let node = ctx.ast.get(id);
        let targets: Vec<String> = match node.kind {
            NodeKind::ImportFrom => node
                .payload
                .identifier
                .iter()
                .cloned()
                .collect(),
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
            .filter_map(|target| {
                let imported_layer = (ctx.resolve_layer)(&target)?;
                let imported_rank = layer_rank(&imported_layer)?;
                if imported_rank > own_rank {
                    Some(
                        Violation::new(
                            self.code(),
                            format!(
                                "{} ({own_layer}) must not import {target} ({imported_layer})",
                                ctx.dotted_module
                            ),
                            location(ctx.path, node),
                        )
                        .with_node(id)
                        .with_symbol(target),
                    )
                } else {
                    None
                }
            })
            .collect()
    }
}

pub struct LayerIntegrity;

impl Checkable for LayerIntegrity {
    fn code(&self) -> &'static str {
        "W9017"
    }

    fn description(&self) -> &'static str {
        "file under src/ has no resolved layer"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Module]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if ctx.layer.is_some() {
            return Vec::new();
        }
        let under_src = ctx
            .path
            .components()
            .any(|c| c.as_os_str() == "src");
        if !under_src {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        vec![Violation::new(
            self.code(),
            format!("{} has no resolved layer", ctx.dotted_module),
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}
