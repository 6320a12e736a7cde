//! Gated Sequential Audit Pipeline — five fixed-order passes, the first
//! with findings blocks everything after it. Grounded on the teacher's
//! `FixMode`/pass-sequencing in `fortitude_linter::lib::check_file`, but
//! generalized from "apply this crate's own rules" to "call out to
//! whichever external tool owns this pass, except pass 4 which is us".

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Violation;

/// One of the five fixed passes, in pipeline order. `Display`/`EnumString`
/// give `AuditResult::blocked_by` a stable wire name matching the spec's
/// `{import_linter, ruff_import_typing, mypy, excelsior, ruff_code_quality,
/// none}` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pass {
    ImportLinter,
    RuffImportTyping,
    Mypy,
    Excelsior,
    RuffCodeQuality,
}

impl Pass {
    pub const ORDER: [Pass; 5] = [
        Pass::ImportLinter,
        Pass::RuffImportTyping,
        Pass::Mypy,
        Pass::Excelsior,
        Pass::RuffCodeQuality,
    ];
}

/// `gather_results`/`apply_fixes` for one external tool. Swapping a tool
/// (ruff for a different linter, mypy for pyright) means a new adapter,
/// never a change to the pipeline — spec §4.4's `LinterAdapter` port.
pub trait LinterAdapter {
    fn gather_results(&self, path: &std::path::Path) -> anyhow::Result<Vec<Violation>>;
    fn apply_fixes(&self, path: &std::path::Path) -> anyhow::Result<bool>;
    fn get_fixable_rules(&self) -> Vec<String>;
    fn supports_autofix(&self) -> bool;
    fn get_manual_fix_instructions(&self, code: &str) -> Option<String>;
}

/// A pass either ran and reported a list of violations, was skipped
/// because its backing tool is disabled, or errored (counts as a blocker,
/// not a silent skip — spec §5 "Cancellation & timeouts").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PassOutcome {
    Ran(Vec<Violation>),
    Skipped { reason: String },
    Errored { reason: String },
}

impl PassOutcome {
    fn is_clean(&self) -> bool {
        matches!(self, PassOutcome::Ran(v) if v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub per_pass: Vec<(Pass, PassOutcome)>,
    pub blocked_by: Option<Pass>,
    pub timestamp: String,
}

impl AuditResult {
    pub fn violations_for(&self, pass: Pass) -> &[Violation] {
        self.per_pass
            .iter()
            .find(|(p, _)| *p == pass)
            .and_then(|(_, outcome)| match outcome {
                PassOutcome::Ran(v) => Some(v.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

/// Which of the five passes the caller has enabled, and the timeout each
/// external-tool invocation gets before its pass is reported errored.
pub struct AuditConfig {
    pub enabled: [bool; 5],
    pub external_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: [true; 5],
            external_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs the five passes in order, stopping at the first with findings.
/// `excelsior_pass` produces this crate's own W9xxx violations (already
/// collected by `engine::check_file` across every file); the other four
/// passes are delegated to `adapters`, keyed the same order as `Pass::ORDER`
/// minus `Excelsior`.
pub fn run_audit(
    config: &AuditConfig,
    paths: &[PathBuf],
    adapters: &[(Pass, &dyn LinterAdapter)],
    excelsior_violations: Vec<Violation>,
    timestamp: impl Into<String>,
) -> AuditResult {
    let mut per_pass = Vec::new();
    let mut blocked_by = None;

    for (idx, pass) in Pass::ORDER.iter().enumerate() {
        if !config.enabled[idx] {
            per_pass.push((
                *pass,
                PassOutcome::Skipped {
                    reason: "pass disabled by configuration".to_string(),
                },
            ));
            continue;
        }

        if blocked_by.is_some() {
            per_pass.push((
                *pass,
                PassOutcome::Skipped {
                    reason: format!("Pass skipped: Audit blocked by {}", blocked_by.unwrap()),
                },
            ));
            continue;
        }

        let outcome = if *pass == Pass::Excelsior {
            PassOutcome::Ran(excelsior_violations.clone())
        } else {
            gather_pass(*pass, paths, adapters)
        };

        if !outcome.is_clean() {
            blocked_by = Some(*pass);
        }
        per_pass.push((*pass, outcome));
    }

    AuditResult {
        per_pass,
        blocked_by,
        timestamp: timestamp.into(),
    }
}

fn gather_pass(pass: Pass, paths: &[PathBuf], adapters: &[(Pass, &dyn LinterAdapter)]) -> PassOutcome {
    let Some((_, adapter)) = adapters.iter().find(|(p, _)| *p == pass) else {
        return PassOutcome::Skipped {
            reason: "no adapter registered for this pass".to_string(),
        };
    };

    let mut violations = Vec::new();
    for path in paths {
        match adapter.gather_results(path) {
            Ok(found) => violations.extend(found),
            Err(err) => {
                return PassOutcome::Errored {
                    reason: err.to_string(),
                }
            }
        }
    }
    violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    PassOutcome::Ran(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_ast::Location;

    use crate::diagnostics::SourceLocation;

    struct CleanAdapter;
    impl LinterAdapter for CleanAdapter {
        fn gather_results(&self, _path: &std::path::Path) -> anyhow::Result<Vec<Violation>> {
            Ok(Vec::new())
        }
        fn apply_fixes(&self, _path: &std::path::Path) -> anyhow::Result<bool> {
            Ok(true)
        }
        fn get_fixable_rules(&self) -> Vec<String> {
            Vec::new()
        }
        fn supports_autofix(&self) -> bool {
            false
        }
        fn get_manual_fix_instructions(&self, _code: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_clean_run_has_no_blocker() {
        let adapters: Vec<(Pass, &dyn LinterAdapter)> = vec![
            (Pass::ImportLinter, &CleanAdapter),
            (Pass::RuffImportTyping, &CleanAdapter),
            (Pass::Mypy, &CleanAdapter),
            (Pass::RuffCodeQuality, &CleanAdapter),
        ];
        let result = run_audit(&AuditConfig::default(), &[], &adapters, Vec::new(), "t0");
        assert_eq!(result.blocked_by, None);
    }

    #[test]
    fn test_architectural_finding_blocks_remaining_passes() {
        let adapters: Vec<(Pass, &dyn LinterAdapter)> = vec![
            (Pass::ImportLinter, &CleanAdapter),
            (Pass::RuffImportTyping, &CleanAdapter),
            (Pass::Mypy, &CleanAdapter),
            (Pass::RuffCodeQuality, &CleanAdapter),
        ];
        let violation = Violation::new(
            "W9001",
            "illegal import",
            SourceLocation::new("a.py", Location::new(1, 1)),
        );
        let result = run_audit(&AuditConfig::default(), &[], &adapters, vec![violation], "t0");
        assert_eq!(result.blocked_by, Some(Pass::Excelsior));
        let quality_outcome = &result.per_pass.last().unwrap().1;
        assert!(matches!(quality_outcome, PassOutcome::Skipped { .. }));
    }

    #[test]
    fn test_disabled_pass_is_skipped_not_blocking() {
        let mut config = AuditConfig::default();
        config.enabled[0] = false;
        let adapters: Vec<(Pass, &dyn LinterAdapter)> = vec![
            (Pass::RuffImportTyping, &CleanAdapter),
            (Pass::Mypy, &CleanAdapter),
            (Pass::RuffCodeQuality, &CleanAdapter),
        ];
        let result = run_audit(&config, &[], &adapters, Vec::new(), "t0");
        assert_eq!(result.blocked_by, None);
        assert!(matches!(result.per_pass[0].1, PassOutcome::Skipped { .. }));
    }
}
