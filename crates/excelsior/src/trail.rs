//! Persisted `.excelsior/` artifacts: `check/last_audit.json`,
//! `check/ai_handover.json`, and their `health/` mirror (spec.md §6's
//! "Persisted artifacts"). Grounded on the teacher's `show_settings`-style
//! "materialize current state to disk" commands, generalized from "show" to
//! "write a trail a later `verify` run can diff against".

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use excelsior_linter::{AuditResult, HandoverArtifact};

#[derive(Debug, Serialize)]
struct AuditTrail<'a> {
    version: u32,
    timestamp: &'a str,
    blocked_by: &'a Option<excelsior_linter::Pass>,
    summary: Vec<PassSummary>,
    result: &'a AuditResult,
}

#[derive(Debug, Serialize)]
struct PassSummary {
    pass: String,
    violation_count: usize,
}

fn summarize(result: &AuditResult) -> Vec<PassSummary> {
    result
        .per_pass
        .iter()
        .map(|(pass, outcome)| PassSummary {
            pass: pass.to_string(),
            violation_count: match outcome {
                excelsior_linter::PassOutcome::Ran(v) => v.len(),
                _ => 0,
            },
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

/// Writes `check/last_audit.json` and `check/ai_handover.json` under
/// `root/.excelsior/`. Mirrors the same two files under `health/` unless
/// `skip_health` (the `--no-health` flag) is set.
pub fn write_audit_trail(
    root: &Path,
    result: &AuditResult,
    handover: &HandoverArtifact,
    skip_health: bool,
) -> Result<()> {
    let trail = AuditTrail {
        version: 1,
        timestamp: &result.timestamp,
        blocked_by: &result.blocked_by,
        summary: summarize(result),
        result,
    };

    let base = root.join(".excelsior");
    write_json(&base.join("check").join("last_audit.json"), &trail)?;
    write_json(&base.join("check").join("ai_handover.json"), handover)?;

    if !skip_health {
        write_json(&base.join("health").join("last_audit.json"), &trail)?;
        write_json(&base.join("health").join("ai_handover.json"), handover)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use excelsior_linter::{Pass, PassOutcome};

    #[test]
    fn test_writes_check_and_health_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        let result = AuditResult {
            per_pass: vec![(Pass::Excelsior, PassOutcome::Ran(Vec::new()))],
            blocked_by: None,
            timestamp: "t0".to_string(),
        };
        let handover = excelsior_linter::build_handover(&result, &|_| None);
        write_audit_trail(dir.path(), &result, &handover, false).unwrap();

        assert!(dir.path().join(".excelsior/check/last_audit.json").is_file());
        assert!(dir.path().join(".excelsior/health/last_audit.json").is_file());
    }

    #[test]
    fn test_no_health_skips_health_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let result = AuditResult {
            per_pass: vec![(Pass::Excelsior, PassOutcome::Ran(Vec::new()))],
            blocked_by: None,
            timestamp: "t0".to_string(),
        };
        let handover = excelsior_linter::build_handover(&result, &|_| None);
        write_audit_trail(dir.path(), &result, &handover, true).unwrap();

        assert!(dir.path().join(".excelsior/check/last_audit.json").is_file());
        assert!(!dir.path().join(".excelsior/health").exists());
    }
}
