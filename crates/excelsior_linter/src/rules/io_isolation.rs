//! W9004 Forbidden I/O in Silent Layer, W9012 Defensive None Check, W9013
//! Illegal I/O in Silent Core, W9014 UI Concern in Domain.

use excelsior_ast::{Literal, NodeId, NodeKind};

use crate::diagnostics::Violation;
use crate::registry::{Checkable, RuleContext};
use crate::rules::support::{leaf_name, location, BANNED_IO_RECEIVERS, BANNED_PRINT_LIKE};

const SILENT_LAYERS: &[&str] = &["Domain", "UseCase"];

fn silent(ctx: &RuleContext) -> bool {
    ctx.layer
        .map(|l| SILENT_LAYERS.contains(&l.as_str()))
        .unwrap_or(false)
}

pub struct ForbiddenIoInSilentLayer;

impl Checkable for ForbiddenIoInSilentLayer {
    fn code(&self) -> &'static str {
        "W9004"
    }

    fn description(&self) -> &'static str {
        "call to a banned I/O receiver inside a silent layer"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Call]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if !silent(ctx) {
            return Vec::new();
        }
        let Some(name) = leaf_name(ctx.ast, id) else {
            return Vec::new();
        };
        if !BANNED_IO_RECEIVERS.contains(&name.as_str()) {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        vec![Violation::new(
            self.code(),
            format!("call to `{name}` performs I/O directly inside a silent layer"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct DefensiveNoneCheck;

impl Checkable for DefensiveNoneCheck {
    fn code(&self) -> &'static str {
        "W9012"
    }

    fn description(&self) -> &'static str {
        "`is None` / `is not None` check inside a silent layer"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Compare]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if !silent(ctx) {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        if node.payload.operator.as_deref() != Some("is") && node.payload.operator.as_deref() != Some("is not") {
            return Vec::new();
        }
        let compares_to_none = node.children.iter().any(|c| {
            matches!(
                &ctx.ast.get(*c).payload.literal,
                Some(Literal::None)
            )
        });
        if !compares_to_none {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            "defensive None check inside a silent layer; trust the contract instead",
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}

pub struct IllegalIoInSilentCore;

impl Checkable for IllegalIoInSilentCore {
    fn code(&self) -> &'static str {
        "W9013"
    }

    fn description(&self) -> &'static str {
        "print/logging call in Domain or UseCase"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Call]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if !silent(ctx) {
            return Vec::new();
        }
        let Some(name) = leaf_name(ctx.ast, id) else {
            return Vec::new();
        };
        if !BANNED_PRINT_LIKE.contains(&name.as_str()) && name != "debug" && name != "info" {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        vec![Violation::new(
            self.code(),
            format!("`{name}` performs direct output from a silent layer"),
            location(ctx.path, node),
        )
        .with_node(id)
        .with_symbol(name)]
    }
}

pub struct UiConcernInDomain;

impl Checkable for UiConcernInDomain {
    fn code(&self) -> &'static str {
        "W9014"
    }

    fn description(&self) -> &'static str {
        "ANSI escapes or terminal formatting literal inside Domain"
    }

    fn entrypoints(&self) -> &'static [NodeKind] {
        &[NodeKind::Const]
    }

    fn check(&self, id: NodeId, ctx: &RuleContext) -> Vec<Violation> {
        if !ctx.layer.map(|l| l == "Domain").unwrap_or(false) {
            return Vec::new();
        }
        let node = ctx.ast.get(id);
        let Some(Literal::Str(s)) = &node.payload.literal else {
            return Vec::new();
        };
        // Source text is stored unescaped, so an ANSI CSI sequence shows up
        // as the literal `\x1b[` / `\033[` characters a reader would type.
        if !(s.contains("\\x1b[") || s.contains("\\033[")) {
            return Vec::new();
        }
        vec![Violation::new(
            self.code(),
            "string literal contains an ANSI escape sequence inside Domain",
            location(ctx.path, node),
        )
        .with_node(id)]
    }
}
