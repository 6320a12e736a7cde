//! Handover Artifact: a serializable summary of an `AuditResult` enriched
//! with fixable flags, manual instructions, and per-rule occurrence lists,
//! per spec §4.7. Downstream tooling (the `blueprint`/`verify` CLI
//! subcommands) consumes this instead of re-walking `Violation`s itself.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditResult, Pass, PassOutcome};
use crate::diagnostics::{SourceLocation, Violation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub code: String,
    pub fixable: bool,
    pub message: String,
    pub occurrences: Vec<SourceLocation>,
    pub manual_instructions: Option<String>,
    pub proactive_guidance: Option<String>,
    pub fix_failure_reasons: Vec<String>,
    pub comment_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverArtifact {
    pub timestamp: String,
    pub blocked_by: Option<Pass>,
    pub groups: Vec<RuleGroup>,
}

/// Groups every violation across every ran pass by rule code, folding in
/// the catalog's `manual_instructions`/`proactive_guidance` via `lookup`
/// (typically `RuleRegistry::get`).
pub fn build_handover(
    result: &AuditResult,
    lookup: &dyn Fn(&str) -> Option<(Option<String>, Option<String>)>,
) -> HandoverArtifact {
    let mut all: Vec<&Violation> = Vec::new();
    for (_, outcome) in &result.per_pass {
        if let PassOutcome::Ran(violations) = outcome {
            all.extend(violations.iter());
        }
    }

    let mut codes: Vec<&str> = all.iter().map(|v| v.code.as_str()).collect();
    codes.sort_unstable();
    codes.dedup();

    let groups = codes
        .into_iter()
        .map(|code| {
            let matching: Vec<&&Violation> = all.iter().filter(|v| v.code == code).collect();
            let (manual_instructions, proactive_guidance) =
                lookup(code).unwrap_or((None, None));
            RuleGroup {
                code: code.to_string(),
                fixable: matching.iter().any(|v| v.fixable),
                message: matching
                    .first()
                    .map(|v| v.message.clone())
                    .unwrap_or_default(),
                occurrences: matching.iter().map(|v| v.location.clone()).collect(),
                manual_instructions,
                proactive_guidance,
                fix_failure_reasons: matching
                    .iter()
                    .filter_map(|v| v.fix_failure_reason.clone())
                    .collect(),
                comment_only: matching.iter().all(|v| v.is_comment_only),
            }
        })
        .collect();

    HandoverArtifact {
        timestamp: result.timestamp.clone(),
        blocked_by: result.blocked_by,
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::Location;

    use crate::audit::Pass;

    #[test]
    fn test_groups_by_code_and_collects_occurrences() {
        let a = Violation::new("W9001", "illegal import", SourceLocation::new("a.py", Location::new(1, 1)));
        let b = Violation::new("W9001", "illegal import", SourceLocation::new("b.py", Location::new(2, 1)));
        let result = AuditResult {
            per_pass: vec![(Pass::Excelsior, PassOutcome::Ran(vec![a, b]))],
            blocked_by: Some(Pass::Excelsior),
            timestamp: "t0".to_string(),
        };
        let handover = build_handover(&result, &|_| None);
        assert_eq!(handover.groups.len(), 1);
        assert_eq!(handover.groups[0].occurrences.len(), 2);
    }

    #[test]
    fn test_fix_failure_reasons_are_collected() {
        let v = Violation::new("W9015", "missing hint", SourceLocation::new("a.py", Location::new(1, 1)))
            .with_fix_failure("Inference failed");
        let result = AuditResult {
            per_pass: vec![(Pass::Excelsior, PassOutcome::Ran(vec![v]))],
            blocked_by: Some(Pass::Excelsior),
            timestamp: "t0".to_string(),
        };
        let handover = build_handover(&result, &|_| None);
        assert_eq!(handover.groups[0].fix_failure_reasons, vec!["Inference failed".to_string()]);
        assert!(!handover.groups[0].fixable);
    }
}
