//! The value types that cross every boundary in this crate: a `Violation`
//! a rule emits, and a `TransformationPlan` a fixable rule proposes. Both
//! are immutable once built, the way the teacher's `Diagnostic`/`Fix` pair
//! is immutable once a rule returns it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use excelsior_ast::{Location, NodeId};

/// Stable identity of a rule, e.g. `W9001`. Carried as a string rather than
/// an enum because the catalog — not the binary — is the single source of
/// truth for which codes exist (see `excelsior_workspace::catalog`).
pub type RuleCode = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, at: Location) -> Self {
        Self {
            path: path.into(),
            line: at.line,
            column: at.column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// A single rule finding. Keyed for dedup by `(code, path, line, symbol)`
/// per spec — callers deduplicate with [`Violation::dedup_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub code: RuleCode,
    pub message: String,
    pub location: SourceLocation,
    #[serde(skip)]
    pub node_ref: Option<NodeId>,
    pub fixable: bool,
    pub fix_failure_reason: Option<String>,
    pub is_comment_only: bool,
    /// Symbol (function/class/variable name) the violation concerns, when
    /// one exists — part of the dedup key alongside code/path/line.
    pub symbol: Option<String>,
}

impl Violation {
    pub fn new(code: impl Into<String>, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location,
            node_ref: None,
            fixable: false,
            fix_failure_reason: None,
            is_comment_only: false,
            symbol: None,
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node_ref = Some(node);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    pub fn comment_only(mut self) -> Self {
        self.is_comment_only = true;
        self
    }

    pub fn with_fix_failure(mut self, reason: impl Into<String>) -> Self {
        self.fixable = false;
        self.fix_failure_reason = Some(reason.into());
        self
    }

    pub fn dedup_key(&self) -> (String, PathBuf, usize, String) {
        (
            self.code.clone(),
            self.location.path.clone(),
            self.location.line,
            self.symbol.clone().unwrap_or_default(),
        )
    }

    /// Total order by `(path, line, column, code)`, per spec §5 ordering
    /// guarantees.
    pub fn sort_key(&self) -> (&Path, usize, usize, &str) {
        (
            &self.location.path,
            self.location.line,
            self.location.column,
            self.code.as_str(),
        )
    }
}

/// The only thing a rule's `Fixable::fix` may hand the gateway: a
/// declarative edit, never a raw parser/rewriter handle (spec §4.6,
/// Design Note "Fix-plan duality").
#[derive(Debug, Clone, Serialize)]
pub struct TransformationPlan {
    pub kind: PlanKind,
    pub target_path: PathBuf,
    pub anchor: Anchor,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anchor {
    pub node_kind: String,
    pub identifier: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PlanKind {
    AddReturnType,
    AddParameterType,
    AddFrozenDecorator,
    AddImport,
    AddGovernanceComment,
    AddPyTypedMarker,
    AddInitFile,
    AddNoneReturnAnnotation,
    StripDuplicateAnnotation,
    ApplyNamedTransformer,
}

/// A concrete source-level rewrite, the unit the CST Gateway actually
/// applies. Mirrors the teacher's `ruff_diagnostics::Edit` insertion/
/// deletion/replacement shape but keyed on byte offsets into this crate's
/// own source text rather than a `ruff_text_size::TextRange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub content: Option<String>,
}

impl Edit {
    pub fn insertion(content: impl Into<String>, at: usize) -> Self {
        Self {
            start: at,
            end: at,
            content: Some(content.into()),
        }
    }

    pub fn deletion(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            content: None,
        }
    }

    pub fn replacement(content: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            content: Some(content.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::Location;

    fn loc() -> SourceLocation {
        SourceLocation::new("a/b.py", Location::new(3, 1))
    }

    #[test]
    fn test_dedup_key_distinguishes_symbol() {
        let a = Violation::new("W9010", "msg", loc()).with_symbol("Order");
        let b = Violation::new("W9010", "msg", loc()).with_symbol("Invoice");
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_fixable_then_fix_failure_clears_fixable() {
        let v = Violation::new("W9015", "msg", loc())
            .fixable()
            .with_fix_failure("Inference failed");
        assert!(!v.fixable);
        assert_eq!(v.fix_failure_reason.as_deref(), Some("Inference failed"));
    }

    #[test]
    fn test_sort_key_orders_by_path_then_line_then_column_then_code() {
        let mut violations = vec![
            Violation::new("W9002", "b", SourceLocation::new("a.py", Location::new(1, 5))),
            Violation::new("W9001", "a", SourceLocation::new("a.py", Location::new(1, 5))),
            Violation::new("W9001", "a", SourceLocation::new("a.py", Location::new(2, 1))),
        ];
        violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        assert_eq!(violations[0].code, "W9001");
        assert_eq!(violations[0].location.line, 1);
        assert_eq!(violations[1].code, "W9002");
    }

    #[test]
    fn test_plan_kind_display_is_snake_case() {
        assert_eq!(PlanKind::AddReturnType.to_string(), "add_return_type");
    }
}
