//! `excelsior verify`: re-runs the audit and fails if the gate regressed
//! against a baseline — a CI-friendly wrapper around `check` that exists
//! so a pipeline step can fail the build without parsing `check`'s text
//! output. Grounded on the teacher's `--check`-mode diffing for `fix`,
//! generalized from "did fix change anything" to "did the gate get worse".

use std::path::Path;

use anyhow::{Context, Result};
use excelsior_linter::{AuditResult, Pass};

use crate::cli::{CheckCommand, LinterSelector, VerifyCommand};

#[derive(Debug)]
pub struct VerifyReport {
    pub current: AuditResult,
    pub baseline_blocked_by: Option<Pass>,
    pub regressed: bool,
}

fn load_baseline(path: &Path) -> Result<AuditResult> {
    let body = std::fs::read_to_string(path).with_context(|| format!("failed to read baseline {}", path.display()))?;
    #[derive(serde::Deserialize)]
    struct Trail {
        result: AuditResult,
    }
    let trail: Trail = serde_json::from_str(&body).with_context(|| format!("failed to parse baseline {}", path.display()))?;
    Ok(trail.result)
}

/// `pass_rank` ranks the five passes by pipeline order; a baseline blocked
/// later in the pipeline (or not at all) and a current run blocked earlier
/// (or newly blocked) counts as a regression.
fn pass_rank(pass: Option<Pass>) -> usize {
    match pass {
        None => Pass::ORDER.len(),
        Some(p) => Pass::ORDER.iter().position(|x| *x == p).unwrap_or(0),
    }
}

pub fn run(
    cmd: &VerifyCommand,
    root: &Path,
    config: &excelsior_workspace::Configuration,
    timestamp: String,
) -> Result<VerifyReport> {
    let baseline_path = cmd
        .baseline
        .clone()
        .unwrap_or_else(|| root.join(".excelsior").join("check").join("last_audit.json"));
    let baseline = load_baseline(&baseline_path).ok();

    let check_cmd = CheckCommand {
        path: root.to_path_buf(),
        linter: LinterSelector::All,
        no_health: true,
    };
    let current = crate::check::run(&check_cmd, root, config, timestamp)?;

    let baseline_blocked_by = baseline.as_ref().and_then(|b| b.blocked_by);
    let regressed = pass_rank(current.blocked_by) < pass_rank(baseline_blocked_by);

    Ok(VerifyReport {
        current,
        baseline_blocked_by,
        regressed,
    })
}

