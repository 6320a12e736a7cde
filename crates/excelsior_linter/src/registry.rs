//! The rule catalog as data, plus the three shapes a rule can implement
//! (`Checkable`, `StatefulRule`, `Fixable`). Grounded on the teacher's
//! `PathRule`/`TextRule`/`AstRule` split in `fortitude_linter::lib`, but
//! collapsed to one `Checkable` trait since every rule here operates on the
//! same AST model rather than three different analysis substrates.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use excelsior_ast::{Ast, NodeId, NodeKind};

use crate::diagnostics::{TransformationPlan, Violation};
use crate::layer::Layer;
use crate::type_oracle::TypeOracle;

/// Static metadata for one rule code, loaded from the catalog file. No code
/// may carry this information anywhere else — see DESIGN.md's single
/// source of truth note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub code: String,
    pub symbol: String,
    pub display_name: String,
    pub message_template: String,
    pub fixable: bool,
    pub comment_only: bool,
    pub manual_instructions: Option<String>,
    pub proactive_guidance: Option<String>,
    pub severity: Option<String>,
}

/// Everything a rule's `check`/`fix` gets handed for one file. Borrowed for
/// the duration of one AST walk; rules never own any of it (Design Note
/// "Global state").
pub struct RuleContext<'a> {
    pub ast: &'a Ast,
    pub path: &'a Path,
    pub dotted_module: &'a str,
    pub layer: Option<&'a Layer>,
    pub oracle: &'a TypeOracle<'a>,
    /// Resolves an arbitrary dotted module name (e.g. an import target) to
    /// its layer, the same way `layer` was resolved for this file itself.
    /// Kept as a closure rather than handing rules the whole `LayerResolver`
    /// so the Rule Engine stays decoupled from layer-resolution internals.
    pub resolve_layer: &'a dyn Fn(&str) -> Option<Layer>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        ast: &'a Ast,
        path: &'a Path,
        dotted_module: &'a str,
        layer: Option<&'a Layer>,
        oracle: &'a TypeOracle<'a>,
        resolve_layer: &'a dyn Fn(&str) -> Option<Layer>,
    ) -> Self {
        Self {
            ast,
            path,
            dotted_module,
            layer,
            oracle,
            resolve_layer,
        }
    }
}

/// A stateless checker: invoked once per node of a kind it subscribes to,
/// with no memory of prior nodes. Most of the catalog is this shape.
pub trait Checkable {
    fn code(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Node kinds the engine should dispatch this rule on.
    fn entrypoints(&self) -> &'static [NodeKind];
    fn check(&self, node: NodeId, ctx: &RuleContext) -> Vec<Violation>;
}

/// Opaque handle a `StatefulRule` receives back from `record_functiondef`
/// and must pass, unmodified, to the matching `leave_functiondef` call. The
/// engine is free to use it as an index into its own scope-counter table;
/// rules never interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeToken(pub u32);

/// A rule whose verdict depends on everything seen since entering a scope
/// (mock counts, nested conditionals on the same attribute, ...). Per
/// Design Note "Stateful rules", the rule itself is stateless code; the
/// engine driver owns the counters and passes them back in.
pub trait StatefulRule {
    fn code(&self) -> &'static str;

    /// Called when the driver enters a function/async-function scope.
    /// Returning `None` means this rule doesn't track this scope.
    fn record_functiondef(&self, node: NodeId, ctx: &RuleContext) -> Option<ScopeToken>;

    /// Called for every `Call` node inside a tracked scope.
    fn record_call(&self, node: NodeId, scope: ScopeToken, ctx: &RuleContext) -> Vec<Violation>;

    /// Called for nodes this rule wants to see purely to update its
    /// counters without emitting anything yet (e.g. counting mock
    /// constructions before the function body is fully walked).
    fn record_mock_only(&self, node: NodeId, scope: ScopeToken, ctx: &RuleContext) -> bool;

    /// Called when the driver leaves the scope that `scope` was opened
    /// for; final verdict violations (if any) are emitted here.
    fn leave_functiondef(&self, scope: ScopeToken, ctx: &RuleContext) -> Vec<Violation>;
}

/// A rule that scans raw source text rather than the AST — the one
/// deliberate exception to the "rules never parse, they query" rule,
/// grounded on the teacher's own `TextRule` trait (kept there for the same
/// reason: some directives, like an `allow`/disable comment, are a textual
/// convention the grammar doesn't model as a node).
pub trait TextRule {
    fn code(&self) -> &'static str;
    fn check(&self, path: &Path, source: &excelsior_ast::SourceFile) -> Vec<Violation>;
}

/// Mixin implemented by rules the catalog marks `fixable`. Returning `None`
/// is a legitimate outcome — the caller is expected to also set
/// `fix_failure_reason` on the violation when inference or an unsafe
/// fix precondition blocks a concrete edit.
pub trait Fixable {
    fn fix(&self, violation: &Violation, ctx: &RuleContext) -> Option<Vec<TransformationPlan>>;
}

/// Catalog-backed, immutable after load (Design Note "Global state").
/// Keyed by code; `IndexMap` to keep catalog declaration order for
/// deterministic iteration (handover grouping, `--linter` listings).
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    definitions: IndexMap<String, RuleDefinition>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate rule code `{0}` in catalog")]
    DuplicateCode(String),
    #[error("duplicate rule symbol `{0}` in catalog")]
    DuplicateSymbol(String),
    #[error("failed to parse rule catalog: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RuleRegistry {
    pub fn from_definitions(defs: Vec<RuleDefinition>) -> Result<Self, RegistryError> {
        let mut definitions = IndexMap::new();
        let mut seen_symbols = std::collections::HashSet::new();
        for def in defs {
            if definitions.contains_key(&def.code) {
                return Err(RegistryError::DuplicateCode(def.code));
            }
            if !seen_symbols.insert(def.symbol.clone()) {
                return Err(RegistryError::DuplicateSymbol(def.symbol));
            }
            definitions.insert(def.code.clone(), def);
        }
        Ok(Self { definitions })
    }

    /// Parses a catalog file shaped `[excelsior.W9010]` per-table, the way
    /// `excelsior_workspace::catalog` loads and merges it; kept here too so
    /// the registry can be built directly in tests without the workspace
    /// crate's merge logic.
    pub fn from_toml_str(raw: &str) -> Result<Self, RegistryError> {
        #[derive(Deserialize)]
        struct RawEntry {
            symbol: String,
            display_name: String,
            message_template: String,
            #[serde(default)]
            fixable: bool,
            #[serde(default)]
            comment_only: bool,
            manual_instructions: Option<String>,
            proactive_guidance: Option<String>,
            severity: Option<String>,
        }
        let parsed: IndexMap<String, IndexMap<String, RawEntry>> = toml::from_str(raw)?;
        let defs = parsed
            .into_iter()
            .flat_map(|(_tool, codes)| codes.into_iter())
            .map(|(code, raw)| RuleDefinition {
                code,
                symbol: raw.symbol,
                display_name: raw.display_name,
                message_template: raw.message_template,
                fixable: raw.fixable,
                comment_only: raw.comment_only,
                manual_instructions: raw.manual_instructions,
                proactive_guidance: raw.proactive_guidance,
                severity: raw.severity,
            })
            .collect();
        Self::from_definitions(defs)
    }

    pub fn get(&self, code: &str) -> Option<&RuleDefinition> {
        self.definitions.get(code)
    }

    pub fn is_fixable(&self, code: &str) -> bool {
        self.definitions.get(code).map(|d| d.fixable).unwrap_or(false)
    }

    pub fn is_comment_only(&self, code: &str) -> bool {
        self.definitions
            .get(code)
            .map(|d| d.comment_only)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
        [excelsior.W9010]
        symbol = "god-file"
        display_name = "God File"
        message_template = "Module {module} defines {count} heavy classes"
        fixable = false
        comment_only = false

        [excelsior.W9015]
        symbol = "missing-type-hint"
        display_name = "Missing Type Hint"
        message_template = "{symbol} is missing a type hint"
        fixable = true
        comment_only = false
        "#
    }

    #[test]
    fn test_loads_catalog_and_looks_up_by_code() {
        let registry = RuleRegistry::from_toml_str(sample_toml()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_fixable("W9015"));
        assert!(!registry.is_fixable("W9010"));
    }

    #[test]
    fn test_duplicate_code_is_rejected() {
        let defs = vec![
            RuleDefinition {
                code: "W9010".to_string(),
                symbol: "a".to_string(),
                display_name: "A".to_string(),
                message_template: "a".to_string(),
                fixable: false,
                comment_only: false,
                manual_instructions: None,
                proactive_guidance: None,
                severity: None,
            },
            RuleDefinition {
                code: "W9010".to_string(),
                symbol: "b".to_string(),
                display_name: "B".to_string(),
                message_template: "b".to_string(),
                fixable: false,
                comment_only: false,
                manual_instructions: None,
                proactive_guidance: None,
                severity: None,
            },
        ];
        assert!(matches!(
            RuleRegistry::from_definitions(defs),
            Err(RegistryError::DuplicateCode(_))
        ));
    }

    #[test]
    fn test_unknown_code_lookup_returns_none() {
        let registry = RuleRegistry::from_toml_str(sample_toml()).unwrap();
        assert!(registry.get("W9999").is_none());
    }
}
